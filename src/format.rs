use std::collections::HashMap;

use chrono::DateTime;
use textwrap::{wrap, Options as WrapOptions};

use crate::farcaster::{Cast, CastId, Embed, Parent, FARCASTER_EPOCH};

pub const DEFAULT_WRAP_WIDTH: usize = 79;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub text: String,
    pub height: usize,
}

impl RenderedBlock {
    pub fn from_lines(lines: Vec<String>) -> Self {
        let height = lines.len();
        Self {
            text: lines.join("\n"),
            height,
        }
    }
}

pub trait BlockRenderer {
    fn render_block(
        &self,
        cast: &Cast,
        fnames: &HashMap<u64, String>,
        indent: usize,
        show_reply_context: bool,
    ) -> RenderedBlock;
}

#[derive(Debug, Clone)]
pub struct CastFormatter {
    wrap_width: usize,
}

impl Default for CastFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_WIDTH)
    }
}

impl CastFormatter {
    pub fn new(wrap_width: usize) -> Self {
        Self {
            wrap_width: wrap_width.max(10),
        }
    }
}

impl BlockRenderer for CastFormatter {
    fn render_block(
        &self,
        cast: &Cast,
        fnames: &HashMap<u64, String>,
        indent: usize,
        show_reply_context: bool,
    ) -> RenderedBlock {
        let mut content: Vec<String> = Vec::new();

        let body = substitute_mentions(cast, fnames);
        let options = WrapOptions::new(self.wrap_width).break_words(true);
        content.extend(wrap(&body, options).into_iter().map(|line| line.into_owned()));

        if show_reply_context {
            match &cast.parent {
                Some(Parent::Cast(parent)) => {
                    content.push(String::new());
                    content.push(format!("↳ In reply to {}", cast_ref(fnames, parent)));
                }
                Some(Parent::Url(url)) => {
                    content.push(String::new());
                    content.push(format!("↳ In reply to {url}"));
                }
                None => {}
            }
        }

        content.push(format!(" {}", timestamp_label(cast.timestamp)));
        content.push(cast_ref(fnames, &cast.id));

        if !cast.embeds.is_empty() {
            content.push("----".to_string());
        }
        for (index, embed) in cast.embeds.iter().enumerate() {
            let number = index + 1;
            let label = match embed {
                Embed::Cast(id) => cast_ref(fnames, id),
                Embed::Url(url) => url.clone(),
            };
            content.push(format!("[{number}] {label}"));
        }

        let padding = " ".repeat(indent);
        let mut lines = Vec::with_capacity(content.len() + 1);
        for (n, line) in content.iter().enumerate() {
            let frame = if n == 0 { "┌─ " } else { "│ " };
            lines.push(format!("{padding}{frame}{line}").trim_end().to_string());
        }
        lines.push(format!("{padding}└───"));

        RenderedBlock::from_lines(lines)
    }
}

pub fn fname_for(fnames: &HashMap<u64, String>, fid: u64) -> String {
    match fnames.get(&fid) {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => fid.to_string(),
    }
}

pub fn cast_ref(fnames: &HashMap<u64, String>, id: &CastId) -> String {
    format!("@{}/{}", fname_for(fnames, id.fid), id.hash)
}

pub fn timestamp_label(timestamp: u32) -> String {
    let secs = FARCASTER_EPOCH + i64::from(timestamp);
    match DateTime::from_timestamp(secs, 0) {
        Some(moment) => format!("[{}]", moment.format("%Y-%m-%d %H:%M")),
        None => "[unknown time]".to_string(),
    }
}

fn substitute_mentions(cast: &Cast, fnames: &HashMap<u64, String>) -> String {
    let text = cast.text.as_str();
    let mut out = String::with_capacity(text.len() + cast.mentions.len() * 8);
    let mut ptr = 0usize;
    for (fid, position) in cast.mentions.iter().zip(cast.mentions_positions.iter()) {
        let position = *position as usize;
        let Some(segment) = text.get(ptr..position) else {
            continue;
        };
        out.push_str(segment);
        out.push('@');
        out.push_str(&fname_for(fnames, *fid));
        ptr = position;
    }
    out.push_str(text.get(ptr..).unwrap_or_default());
    out
}
