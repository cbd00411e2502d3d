//! Header chunking of the enhanced Markdown.
//!
//! A single pass over the lines: an H1–H3 header closes the current chunk
//! and opens a new one labelled with the header title; every other line is
//! appended to the open chunk. Lines keep their terminators, so the kept
//! chunks concatenate back to the source text minus the dropped ones.
//! There is no upper size bound: a long section stays one chunk.

use crate::config::ChunkConfig;
use crate::output::{Chunk, ChunkMetadata};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,3})\s+(.*)").unwrap());

/// If `line` (without terminator) is an H1–H3 header, return its title.
pub fn header_title(line: &str) -> Option<&str> {
    RE_HEADER
        .captures(line)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
}

/// Split `text` into header-delimited chunks tagged with `source_name`.
pub fn chunk_markdown(text: &str, source_name: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut chapter = config.default_chapter.clone();
    let mut content = String::new();

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if let Some(title) = header_title(bare) {
            if trimmed_len(&content) > config.min_chunk_chars {
                chunks.push(make_chunk(content, source_name, chapter));
            }
            chapter = title.to_string();
            content = String::from(line);
        } else {
            content.push_str(line);
        }
    }

    if trimmed_len(&content) > config.min_final_chunk_chars {
        chunks.push(make_chunk(content, source_name, chapter));
    }

    chunks
}

fn trimmed_len(s: &str) -> usize {
    s.trim().chars().count()
}

fn make_chunk(content: String, source_name: &str, chapter: String) -> Chunk {
    Chunk {
        content,
        metadata: ChunkMetadata {
            source_name: source_name.to_string(),
            chapter_label: chapter,
        },
        embedding: None,
    }
}
