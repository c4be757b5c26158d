//! Markdown views of search and backlink results for the calling agent.

use recall_storage::models::{MemoryRecord, ScoredMemory};

use crate::{BacklinkResult, SearchRequest, backlinks};

const SEARCH_SNIPPET_CHARS: usize = 300;

pub fn render_search_results(req: &SearchRequest, results: &[ScoredMemory]) -> String {
	let filters = describe_filters(req);

	if results.is_empty() {
		return format!("No memories found for semantic search: '{}'{filters}", req.query);
	}

	let mut md = format!("# Semantic search results for '{}'{filters}\n\n", req.query);

	for (idx, result) in results.iter().enumerate() {
		write_heading(&mut md, idx, &result.record);

		md.push_str(&format!(
			"**Snippet:**\n{}\n\n**Similarity:** {:.3}\n\n",
			backlinks::snippet(&result.record.body, SEARCH_SNIPPET_CHARS),
			result.similarity
		));

		write_footer(&mut md, &result.record);
	}

	md
}

pub fn render_backlinks(name: &str, query: &str, results: &[BacklinkResult]) -> String {
	if results.is_empty() {
		return format!("No backlinks found for '{name}'");
	}

	let query = query.trim();
	let mut md = if query.is_empty() {
		format!("# Related memories for '{name}'\n\n")
	} else {
		format!("# Related memories for '{name}' (query: {query})\n\n")
	};

	for (idx, result) in results.iter().enumerate() {
		write_heading(&mut md, idx, &result.record);

		md.push_str(&format!(
			"**Snippet:**\n{}\n\n**Link Type:** {} | **Relevance:** {:.3}\n\n",
			result.snippet,
			result.link_type.as_str(),
			result.relevance_score
		));

		write_footer(&mut md, &result.record);
	}

	md
}

fn write_heading(md: &mut String, idx: usize, record: &MemoryRecord) {
	md.push_str(&format!("## {}. {}\n", idx + 1, record.name));

	if !record.title.is_empty() && record.title != record.name {
		md.push_str(&format!("**Title:** {}\n\n", record.title));
	}
}

fn write_footer(md: &mut String, record: &MemoryRecord) {
	if !record.description.is_empty() {
		md.push_str(&format!("**Description:** {}\n\n", record.description));
	}

	md.push_str("---\n\n");
}

fn describe_filters(req: &SearchRequest) -> String {
	if req.tag_filters.is_empty() {
		return String::new();
	}

	let tags = req
		.tag_filters
		.iter()
		.map(|filter| match filter.value.as_deref() {
			Some(value) if filter.check_value && !value.is_empty() => {
				format!("{}:{value}", filter.key)
			},
			_ => filter.key.clone(),
		})
		.collect::<Vec<_>>();
	let connector = if req.require_all { "all of" } else { "any of" };

	format!(" with {connector} tags [{}]", tags.join(", "))
}
