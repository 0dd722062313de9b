//! Pull the on-screen target out of a spoken or typed command.

use std::sync::LazyLock;

use regex::Regex;

const VERBS: [&str; 5] = ["play", "open", "click", "watch", "search"];

static VERB_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	VERBS
		.iter()
		.filter_map(|verb| Regex::new(&format!(r"\b{verb}\b")).ok().map(|re| (*verb, re)))
		.collect()
});

static FILLER_RE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"\b(?:on you ?tube|the|video)\b").ok());

/// Title a command refers to, lowercased unless it was quoted.
///
/// Quoted text wins, double quotes before single. Otherwise the text after
/// the first verb (in `play, open, click, watch, search` order) that leaves
/// something non-numeric, with filler words removed. Empty when nothing
/// qualifies.
pub fn extract_title(command: &str) -> String {
	for quote in ['"', '\''] {
		let mut parts = command.split(quote);
		if let (Some(_), Some(inner), Some(_)) = (parts.next(), parts.next(), parts.next()) {
			return inner.trim().to_string();
		}
	}

	let lower = command.trim().to_lowercase();
	for (verb, re) in VERB_RES.iter() {
		let Some(hit) = re.find(&lower) else {
			continue;
		};
		let after = &lower[hit.end()..];
		let stripped = match FILLER_RE.as_ref() {
			Some(filler) => filler.replace_all(after, " ").into_owned(),
			None => after.to_string(),
		};
		let title = stripped
			.split_whitespace()
			.collect::<Vec<_>>()
			.join(" ")
			.trim_matches([' ', ':', ',', '-'])
			.to_string();
		if !title.is_empty() && !title.chars().filter(|c| *c != ' ').all(|c| c.is_ascii_digit()) {
			tracing::debug!(verb = *verb, title = %title, "title extracted");
			return title;
		}
	}
	String::new()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quoted_text_wins() {
		assert_eq!(extract_title(r#"play "Never Gonna Give You Up" on youtube"#), "Never Gonna Give You Up");
		assert_eq!(extract_title("open 'Downloads' please"), "Downloads");
	}

	#[test]
	fn text_after_verb_without_fillers() {
		assert_eq!(extract_title("Play the spiderman trailer video on YouTube"), "spiderman trailer");
		assert_eq!(extract_title("please click: history"), "history");
		assert_eq!(extract_title("search - lofi beats"), "lofi beats");
	}

	#[test]
	fn fillers_only_match_whole_words() {
		assert_eq!(extract_title("watch theater tour"), "theater tour");
	}

	#[test]
	fn numbers_alone_are_rejected() {
		assert_eq!(extract_title("play 2 3"), "");
		assert_eq!(extract_title("play 2 and open settings"), "2 and open settings");
	}

	#[test]
	fn verbs_inside_words_do_not_count() {
		assert_eq!(extract_title("display brightness"), "");
	}

	#[test]
	fn nothing_to_extract() {
		assert_eq!(extract_title(""), "");
		assert_eq!(extract_title("what time is it"), "");
		assert_eq!(extract_title("play the video"), "");
	}
}
