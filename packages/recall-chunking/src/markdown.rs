use std::sync::LazyLock;

use regex::Regex;

use crate::{Chunk, ChunkingConfig};

static OPEN_LINK_TARGET: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[([^\]\[]*)\]\(\S*$").expect("valid regex"));
static OPEN_LINK_TEXT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[[^\]]*$").expect("valid regex"));

/// Markdown-aware variant of [`crate::split_text`].
///
/// Edges that fall inside a word are moved to the nearest whitespace and dangling markdown
/// constructs are removed from the chunk tail. Chunks left empty are dropped and the remaining ones
/// are renumbered. Offsets still describe the span the chunk was cut from.
pub fn split_markdown(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let (body, chunks) = crate::split_with_body(text, cfg);
	let mut repaired = Vec::with_capacity(chunks.len());

	for chunk in chunks {
		let text = repair_chunk(&body, &chunk);

		if text.is_empty() {
			tracing::debug!(
				start_offset = chunk.start_offset,
				end_offset = chunk.end_offset,
				"Dropping chunk emptied by markdown repair."
			);

			continue;
		}

		repaired.push(Chunk { chunk_index: repaired.len(), text, ..chunk });
	}

	repaired
}

/// Removes unterminated links, emphasis runs and code fences from the end of `text`.
///
/// Cutting one construct can expose another, so the passes repeat until nothing changes.
pub fn strip_dangling_markdown(text: &str) -> String {
	let mut out = text.trim_end().to_string();

	loop {
		let next = strip_once(&out);

		if next == out {
			return out;
		}

		out = next;
	}
}

fn strip_once(text: &str) -> String {
	let mut out = OPEN_LINK_TARGET.replace(text, "$1").into_owned();

	out = OPEN_LINK_TEXT.replace(&out, "").into_owned();

	if let Some(cut) = unmatched_emphasis(&out) {
		out.truncate(cut);
	}
	if let Some(cut) = unmatched_fence(&out) {
		out.truncate(cut);
	}

	out.trim_end().to_string()
}

fn repair_chunk(body: &str, chunk: &Chunk) -> String {
	let mut text = chunk.text.as_str();

	if splits_word(body, chunk.start_offset)
		&& let Some(pos) = text.find(char::is_whitespace)
	{
		text = text[pos..].trim_start();
	}
	if splits_word(body, chunk.end_offset)
		&& let Some(pos) = text.rfind(char::is_whitespace)
	{
		text = text[..pos].trim_end();
	}

	strip_dangling_markdown(text)
}

fn splits_word(body: &str, offset: usize) -> bool {
	let before = body[..offset].chars().next_back();
	let after = body[offset..].chars().next();

	matches!((before, after), (Some(a), Some(b)) if a.is_alphanumeric() && b.is_alphanumeric())
}

/// Byte position of the last emphasis run when the runs do not pair up.
///
/// A run with whitespace on both sides is a list bullet or an operator, not emphasis, unless it is
/// the very end of the text.
fn unmatched_emphasis(text: &str) -> Option<usize> {
	let bytes = text.as_bytes();
	let mut runs = Vec::new();
	let mut idx = 0;

	while idx < bytes.len() {
		if bytes[idx] != b'*' {
			idx += 1;

			continue;
		}

		let start = idx;

		while idx < bytes.len() && bytes[idx] == b'*' {
			idx += 1;
		}

		let spaced_before = start == 0 || bytes[start - 1].is_ascii_whitespace();
		let spaced_after = idx < bytes.len() && bytes[idx].is_ascii_whitespace();

		if !(spaced_before && spaced_after) {
			runs.push(start);
		}
	}

	if runs.len() % 2 == 1 { runs.last().copied() } else { None }
}

fn unmatched_fence(text: &str) -> Option<usize> {
	let fences: Vec<usize> = text.match_indices("```").map(|(idx, _)| idx).collect();

	if fences.len() % 2 == 1 { fences.last().copied() } else { None }
}
