use std::collections::HashMap;

use crate::farcaster::{Cast, CastId, Embed, Parent};
use crate::format::{cast_ref, fname_for};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    Author(u64),
    Cast(CastId),
    Link(String),
}

impl FocusTarget {
    pub fn collect(cast: &Cast) -> Vec<FocusTarget> {
        let mut targets: Vec<FocusTarget> = Vec::new();
        let mut add = |target: FocusTarget| {
            if !targets.contains(&target) {
                targets.push(target);
            }
        };

        for fid in &cast.mentions {
            add(FocusTarget::Author(*fid));
        }
        for embed in &cast.embeds {
            if let Embed::Cast(id) = embed {
                add(FocusTarget::Cast(*id));
            }
        }
        if let Some(Parent::Cast(id)) = &cast.parent {
            add(FocusTarget::Cast(*id));
        }
        for embed in &cast.embeds {
            if let Embed::Url(url) = embed {
                add(FocusTarget::Link(url.clone()));
            }
        }
        if let Some(Parent::Url(url)) = &cast.parent {
            add(FocusTarget::Link(url.clone()));
        }

        targets
    }

    pub fn label(&self, fnames: &HashMap<u64, String>) -> String {
        match self {
            FocusTarget::Author(fid) => format!("@{}", fname_for(fnames, *fid)),
            FocusTarget::Cast(id) => cast_ref(fnames, id),
            FocusTarget::Link(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Unfocused,
    Focused {
        block: usize,
        targets: Vec<FocusTarget>,
        selected: usize,
    },
}

impl Focus {
    pub fn focus(block: usize, cast: &Cast) -> Self {
        Focus::Focused {
            block,
            targets: FocusTarget::collect(cast),
            selected: 0,
        }
    }

    pub fn is_focused(&self) -> bool {
        matches!(self, Focus::Focused { .. })
    }

    pub fn target(&self) -> Option<&FocusTarget> {
        match self {
            Focus::Focused {
                targets, selected, ..
            } => targets.get(*selected),
            Focus::Unfocused => None,
        }
    }

    pub fn targets(&self) -> &[FocusTarget] {
        match self {
            Focus::Focused { targets, .. } => targets,
            Focus::Unfocused => &[],
        }
    }

    pub fn cycle(&mut self, delta: isize) -> bool {
        let Focus::Focused {
            targets, selected, ..
        } = self
        else {
            return false;
        };
        if targets.len() < 2 {
            return false;
        }
        let len = targets.len() as isize;
        *selected = (*selected as isize + delta).rem_euclid(len) as usize;
        true
    }

    pub fn clear(&mut self) {
        *self = Focus::Unfocused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farcaster::{Hash, HASH_LEN};

    fn id(seed: u8) -> CastId {
        CastId::new(seed as u64, Hash::new([seed; HASH_LEN]))
    }

    fn cast_with(embeds: Vec<Embed>, mentions: Vec<u64>, parent: Option<Parent>) -> Cast {
        Cast {
            id: id(1),
            timestamp: 0,
            text: String::new(),
            mentions_positions: vec![0; mentions.len()],
            mentions,
            embeds,
            parent,
        }
    }

    #[test]
    fn targets_follow_priority_order() {
        let cast = cast_with(
            vec![
                Embed::Url("https://a.example".into()),
                Embed::Cast(id(4)),
                Embed::Url("https://a.example".into()),
            ],
            vec![7, 7],
            Some(Parent::Cast(id(2))),
        );
        assert_eq!(
            FocusTarget::collect(&cast),
            vec![
                FocusTarget::Author(7),
                FocusTarget::Cast(id(4)),
                FocusTarget::Cast(id(2)),
                FocusTarget::Link("https://a.example".into()),
            ]
        );
    }

    #[test]
    fn cast_without_references_has_no_target() {
        let focus = Focus::focus(3, &cast_with(vec![], vec![], None));
        assert!(focus.is_focused());
        assert_eq!(focus.target(), None);
    }

    #[test]
    fn cycling_wraps_both_ways() {
        let cast = cast_with(
            vec![Embed::Url("https://x".into())],
            vec![9],
            Some(Parent::Url("https://chan".into())),
        );
        let mut focus = Focus::focus(0, &cast);
        assert_eq!(focus.target(), Some(&FocusTarget::Author(9)));
        assert!(focus.cycle(-1));
        assert_eq!(focus.target(), Some(&FocusTarget::Link("https://chan".into())));
        focus.cycle(1);
        focus.cycle(1);
        assert_eq!(focus.target(), Some(&FocusTarget::Link("https://x".into())));
        focus.clear();
        assert!(!focus.cycle(1));
        assert!(focus.targets().is_empty());
    }
}
