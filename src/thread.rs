use std::collections::HashSet;

use crate::farcaster::{CastGroup, CastId, Hash};
use crate::format::BlockRenderer;

pub const INDENT_PER_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: CastId,
    pub depth: usize,
    pub text: String,
    pub height: usize,
}

// Missing replies are pruned; a reply pointing back at an emitted cast is dropped.
pub fn flatten(group: &CastGroup, root: Option<Hash>, renderer: &dyn BlockRenderer) -> Vec<Block> {
    match root {
        Some(root) => flatten_thread(group, root, renderer),
        None => flatten_list(group, renderer),
    }
}

fn flatten_thread(group: &CastGroup, root: Hash, renderer: &dyn BlockRenderer) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut visited: HashSet<Hash> = HashSet::new();
    // Explicit stack keeps deep threads off the call stack.
    let mut stack: Vec<(Hash, usize)> = vec![(root, 0)];

    while let Some((hash, depth)) = stack.pop() {
        let Some(node) = group.get(&hash) else {
            continue;
        };
        if !visited.insert(hash) {
            tracing::debug!(hash = %hash, "dropping reply cycle while flattening");
            continue;
        }

        let rendered = renderer.render_block(
            &node.cast,
            &group.fnames,
            depth * INDENT_PER_DEPTH,
            depth == 0,
        );
        blocks.push(Block {
            id: node.cast.id,
            depth,
            text: rendered.text,
            height: rendered.height,
        });

        for reply in node.replies.iter().rev() {
            stack.push((*reply, depth + 1));
        }
    }

    blocks
}

fn flatten_list(group: &CastGroup, renderer: &dyn BlockRenderer) -> Vec<Block> {
    group
        .ordered
        .iter()
        .filter_map(|hash| group.get(hash))
        .map(|node| {
            let rendered = renderer.render_block(&node.cast, &group.fnames, 0, true);
            Block {
                id: node.cast.id,
                depth: 0,
                text: rendered.text,
                height: rendered.height,
            }
        })
        .collect()
}
