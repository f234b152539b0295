//! Text command language.
//!
//! A message is, in priority order: a link to save, a `/rm` removal list, or one
//! of the fixed slash commands. Anything else is unrecognized.

use std::{collections::BTreeSet, sync::OnceLock};

use regex::Regex;
use url::Url;

use crate::{errors::Error, Result};

pub const RND_CMD: &str = "/rnd";
pub const HELP_CMD: &str = "/help";
pub const START_CMD: &str = "/start";
pub const LIST_CMD: &str = "/list";
pub const REMOVE_CMD: &str = "/rm";

pub const MSG_HELP: &str = "I can save and keep your pages. Also I can offer you something to read from your list.

In order to save a page, just send me the link.

/list shows every saved page with its number.
/rm 1 3 removes pages by their numbers from /list.
/rnd sends you a random page.
Caution! After that the page will be removed from the list.";

pub const MSG_UNKNOWN: &str = "Unknown command 🤔";
pub const MSG_NO_SAVED_PAGES: &str = "No saved pages 🥸";
pub const MSG_SAVED: &str = "Saved! 🥳";
pub const MSG_ALREADY_EXISTS: &str = "You already have this page in your list 🤓";
pub const MSG_REMOVED: &str = "Pages removed 🫡";

/// Greeting sent on `/start`: a short hello followed by the help text.
pub fn hello_message() -> String {
    format!("Hi! I'm LinkBot 👋\n\n{MSG_HELP}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Save(String),
    /// 1-based positions as shown by `/list`, deduplicated and ascending.
    RemoveIndices(BTreeSet<usize>),
    List,
    Random,
    Help,
    Start,
    /// Bare `/rm` with nothing to remove.
    NoOp,
    Unrecognized(String),
}

fn remove_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/rm(?:\s+[0-9]+)+$").expect("valid regex"))
}

/// Classify one message. Surrounding whitespace is ignored.
///
/// Fails with `Error::Parse` only when a `/rm` index is too large to represent.
pub fn classify(text: &str) -> Result<Command> {
    let text = text.trim();

    if is_url(text) {
        return Ok(Command::Save(text.to_string()));
    }

    if remove_pattern().is_match(text) {
        return parse_removal_list(text).map(Command::RemoveIndices);
    }

    Ok(match text {
        RND_CMD => Command::Random,
        HELP_CMD => Command::Help,
        START_CMD => Command::Start,
        LIST_CMD => Command::List,
        REMOVE_CMD => Command::NoOp,
        other => Command::Unrecognized(other.to_string()),
    })
}

fn is_url(text: &str) -> bool {
    Url::parse(text).is_ok_and(|u| u.host().is_some())
}

fn parse_removal_list(text: &str) -> Result<BTreeSet<usize>> {
    text[REMOVE_CMD.len()..]
        .split_whitespace()
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|e| Error::Parse(format!("bad /rm index {raw:?}: {e}")))
        })
        .collect()
}

/// Render pages as `1. <url>` lines.
pub fn render_list<'a>(urls: impl IntoIterator<Item = &'a str>) -> String {
    urls.into_iter()
        .enumerate()
        .map(|(i, url)| format!("{}. {url}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(v: &[usize]) -> Command {
        Command::RemoveIndices(v.iter().copied().collect())
    }

    #[test]
    fn urls_are_saved() {
        assert_eq!(
            classify("https://example.com/a").unwrap(),
            Command::Save("https://example.com/a".to_string())
        );
        assert_eq!(
            classify("  http://example.com  ").unwrap(),
            Command::Save("http://example.com".to_string())
        );
    }

    #[test]
    fn hostless_text_is_not_a_url() {
        assert_eq!(
            classify("example.com").unwrap(),
            Command::Unrecognized("example.com".to_string())
        );
        assert_eq!(
            classify("mailto:someone@example.com").unwrap(),
            Command::Unrecognized("mailto:someone@example.com".to_string())
        );
    }

    #[test]
    fn remove_grammar() {
        assert_eq!(classify("/rm 1").unwrap(), indices(&[1]));
        assert_eq!(classify("/rm 3 1 2").unwrap(), indices(&[1, 2, 3]));
        assert_eq!(classify("/rm  12\t4").unwrap(), indices(&[4, 12]));
        assert_eq!(classify("/rm 2 2").unwrap(), indices(&[2]));
        assert_eq!(classify("/rm").unwrap(), Command::NoOp);
        assert_eq!(classify("/rm   ").unwrap(), Command::NoOp);
    }

    #[test]
    fn malformed_remove_is_unrecognized() {
        for text in ["/rm x", "/rm 1 x", "/rm1", "/rm -1", "say /rm 1"] {
            assert_eq!(
                classify(text).unwrap(),
                Command::Unrecognized(text.to_string()),
                "{text}"
            );
        }
    }

    #[test]
    fn oversized_index_is_a_parse_error() {
        let err = classify("/rm 999999999999999999999999999").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn fixed_vocabulary() {
        assert_eq!(classify("/rnd").unwrap(), Command::Random);
        assert_eq!(classify("/help").unwrap(), Command::Help);
        assert_eq!(classify("/start").unwrap(), Command::Start);
        assert_eq!(classify("/list").unwrap(), Command::List);
        assert_eq!(
            classify("/LIST").unwrap(),
            Command::Unrecognized("/LIST".to_string())
        );
        assert_eq!(
            classify("hello").unwrap(),
            Command::Unrecognized("hello".to_string())
        );
    }

    #[test]
    fn list_rendering() {
        assert_eq!(render_list(["https://a"]), "1. https://a");
        assert_eq!(
            render_list(["https://a", "https://b", "https://c"]),
            "1. https://a\n2. https://b\n3. https://c"
        );
    }

    #[test]
    fn hello_contains_help() {
        assert!(hello_message().starts_with("Hi!"));
        assert!(hello_message().ends_with(MSG_HELP));
    }
}
