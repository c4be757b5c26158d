//! Explicit link extraction from memory content.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;

static WIKI_LINK: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[\[([^\]\[]+)\]\]").expect("valid regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
	Wiki,
	Markdown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
	pub text: String,
	/// Memory name the link points at, normalized with a `.md` suffix.
	pub target: String,
	pub kind: LinkKind,
}

/// Wiki links `[[target]]` and markdown links to `.md` files, in order of appearance per kind.
///
/// Wiki links are matched on the raw text. Markdown links come from the parsed document, so link
/// syntax inside code spans and code blocks is not a link.
pub fn extract_links(content: &str) -> Vec<Link> {
	let mut links = Vec::new();

	for caps in WIKI_LINK.captures_iter(content) {
		let inner = &caps[1];
		// `[[target|alias]]` and `[[target#section]]`.
		let target = inner.split(['|', '#']).next().unwrap_or(inner).trim();

		if target.is_empty() {
			continue;
		}

		links.push(Link {
			text: inner.to_string(),
			target: with_md_suffix(normalize_target(target)),
			kind: LinkKind::Wiki,
		});
	}

	links.extend(markdown_links(content));

	links
}

fn markdown_links(content: &str) -> Vec<Link> {
	let mut links = Vec::new();
	// Destination and text of the link being read.
	let mut open: Option<(String, String)> = None;

	for event in Parser::new(content) {
		match event {
			Event::Start(Tag::Link { dest_url, .. }) => {
				open = Some((dest_url.into_string(), String::new()));
			},
			Event::Text(text) | Event::Code(text) => {
				if let Some((_, link_text)) = open.as_mut() {
					link_text.push_str(&text);
				}
			},
			Event::End(TagEnd::Link) => {
				let Some((destination, text)) = open.take() else {
					continue;
				};
				let destination = destination.split('#').next().unwrap_or_default();

				if !destination.ends_with(".md") || destination.contains("://") {
					continue;
				}

				links.push(Link {
					text,
					target: normalize_target(destination).to_string(),
					kind: LinkKind::Markdown,
				});
			},
			_ => {},
		}
	}

	links
}

/// Whether `link` points at the memory called `name`, with or without its `.md` suffix.
pub fn links_to(link: &Link, name: &str) -> bool {
	let name = normalize_target(name.trim());

	!name.is_empty() && link.target == with_md_suffix(name)
}

fn normalize_target(target: &str) -> &str {
	let mut target = target.trim();

	while let Some(rest) = target.strip_prefix("./") {
		target = rest;
	}

	target
}

fn with_md_suffix(target: &str) -> String {
	if target.ends_with(".md") { target.to_string() } else { format!("{target}.md") }
}
