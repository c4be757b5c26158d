mod markdown;

pub use markdown::{split_markdown, strip_dangling_markdown};

use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;

static PARAGRAPH_BREAK: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SENTENCE_END: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[.!?]\s+[A-Z]").expect("valid regex"));
static HEADING: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?m)^#+[ \t]").expect("valid regex"));
static LIST_ITEM: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]").expect("valid regex"));
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```").expect("valid regex"));

/// Size limits for [`split_text`], measured in bytes of the normalized body.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_chars: usize,
	pub min_chars: usize,
	pub overlap_chars: usize,
}
impl Default for ChunkingConfig {
	fn default() -> Self {
		Self { max_chars: 1_000, min_chars: 100, overlap_chars: 100 }
	}
}

/// A contiguous span of a document.
///
/// For documents longer than `max_chars` the offsets index the whitespace-normalized body, not the
/// raw input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
	pub chunk_index: usize,
	pub start_offset: usize,
	pub end_offset: usize,
	pub text: String,
}

pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	split_with_body(text, cfg).1
}

/// Splits `text` and also returns the body the chunk offsets refer to.
pub(crate) fn split_with_body<'a>(
	text: &'a str,
	cfg: &ChunkingConfig,
) -> (Cow<'a, str>, Vec<Chunk>) {
	if text.trim().is_empty() {
		return (Cow::Borrowed(text), Vec::new());
	}
	if text.len() <= cfg.max_chars {
		let chunk = Chunk {
			chunk_index: 0,
			start_offset: 0,
			end_offset: text.len(),
			text: text.to_string(),
		};

		return (Cow::Borrowed(text), vec![chunk]);
	}

	let normalized = Normalized::new(text);
	let boundaries = find_boundaries(text, &normalized.offsets, normalized.body.len());
	let chunks = split_normalized(&normalized.body, &boundaries, cfg);

	(Cow::Owned(normalized.body), chunks)
}

fn split_normalized(body: &str, boundaries: &[usize], cfg: &ChunkingConfig) -> Vec<Chunk> {
	let len = body.len();
	let max = cfg.max_chars.max(1);
	let mut chunks = Vec::new();
	let mut start = 0_usize;
	let mut prev_end = 0_usize;

	while start < len {
		let limit = start.saturating_add(max);
		let hi = boundaries.partition_point(|&b| b <= limit);
		let end = match boundaries[..hi].last() {
			Some(&b) if b > start && b > prev_end => b,
			_ => hard_cut(body, start, limit),
		};
		let piece = body[start..end].trim();

		if !piece.is_empty() && (piece.len() >= cfg.min_chars || end == len) {
			chunks.push(Chunk {
				chunk_index: chunks.len(),
				start_offset: start,
				end_offset: end,
				text: piece.to_string(),
			});
		}
		if end >= len {
			break;
		}

		prev_end = end;

		let mut target = end.saturating_sub(cfg.overlap_chars);

		if target <= start {
			target = end;
		}

		let idx = boundaries.partition_point(|&b| b < target);
		let mut next = match boundaries.get(idx) {
			Some(&b) if b <= end => b,
			_ => floor_char_boundary(body, target),
		};

		if next <= start {
			next = end;
		}

		start = next;
	}

	chunks
}

fn hard_cut(body: &str, start: usize, limit: usize) -> usize {
	let len = body.len();

	if limit >= len {
		return len;
	}

	let end = floor_char_boundary(body, limit);

	if end > start {
		tracing::debug!(start, end, "No boundary within chunk window; cutting at size limit.");

		return end;
	}

	ceil_char_boundary(body, start + 1)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
	if idx >= text.len() {
		return text.len();
	}

	while !text.is_char_boundary(idx) {
		idx -= 1;
	}

	idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
	if idx >= text.len() {
		return text.len();
	}

	while !text.is_char_boundary(idx) {
		idx += 1;
	}

	idx
}

/// Whitespace-collapsed copy of a document plus a byte map from the raw text into it.
struct Normalized {
	body: String,
	// offsets[i] is the normalized position of raw byte i; one extra slot for the end.
	offsets: Vec<usize>,
}
impl Normalized {
	fn new(text: &str) -> Self {
		let mut body = String::with_capacity(text.len());
		let mut offsets = vec![0; text.len() + 1];
		let mut pending_space = false;

		for (idx, ch) in text.char_indices() {
			if ch.is_whitespace() {
				offsets[idx..idx + ch.len_utf8()].fill(body.len());

				pending_space = !body.is_empty();

				continue;
			}
			if pending_space {
				body.push(' ');

				pending_space = false;
			}

			offsets[idx..idx + ch.len_utf8()].fill(body.len());
			body.push(ch);
		}

		offsets[text.len()] = body.len();

		Self { body, offsets }
	}
}

/// Structural split points, detected on the raw text and mapped into normalized coordinates.
fn find_boundaries(text: &str, offsets: &[usize], body_len: usize) -> Vec<usize> {
	let mut raw = Vec::new();

	raw.extend(PARAGRAPH_BREAK.find_iter(text).map(|m| m.end()));
	// Split after the punctuation mark.
	raw.extend(SENTENCE_END.find_iter(text).map(|m| m.start() + 1));
	raw.extend(HEADING.find_iter(text).map(|m| m.start()));
	raw.extend(LIST_ITEM.find_iter(text).map(|m| m.start()));
	raw.extend(CODE_FENCE.find_iter(text).map(|m| m.start()));

	let mut boundaries: Vec<usize> = raw.into_iter().map(|idx| offsets[idx]).collect();

	boundaries.push(0);
	boundaries.push(body_len);
	boundaries.sort_unstable();
	boundaries.dedup();

	boundaries
}
