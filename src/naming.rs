//! Usable file and folder names
//!
//! A display name goes through the same steps everywhere: trim and collapse whitespace,
//! optionally replace emoji, (cards only) truncate, then sanitise for the filesystem. The
//! full name is still written inside the Markdown files.

use crate::config::ExportConfig;
use crate::emoji;

/// Characters invalid in a file name on at least one major platform
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Used when nothing printable is left of a name
const EMPTY_NAME: &str = "_";

/// Trim and collapse runs of whitespace to a single space
pub fn collapse_whitespace(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(name: &str, max_chars: usize) -> &str {
    match name.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &name[..byte_index],
        None => name,
    }
}

/// Make a name safe to use as a single path component
///
/// Splits on invalid characters, drops the empty pieces, joins the rest with `_` and strips
/// trailing dots and whitespace (which Windows silently removes).
pub fn sanitise_for_path(name: &str) -> String {
    let joined = name
        .split(|c: char| INVALID_PATH_CHARS.contains(&c) || c.is_control())
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let trimmed = joined.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn usable_name(name: &str, max_chars: Option<usize>, config: &ExportConfig) -> String {
    let mut name = collapse_whitespace(name);
    if config.remove_emoji {
        name = collapse_whitespace(&emoji::replace_emoji(&name, emoji::DEFAULT_REPLACEMENT));
    }
    if let Some(max_chars) = max_chars {
        name = truncate_chars(&name, max_chars).to_string();
    }
    sanitise_for_path(&name)
}

/// Folder and JSON file name for a board
pub fn usable_board_name(name: &str, config: &ExportConfig) -> String {
    usable_name(name, None, config)
}

/// Folder name for a list (lists are never truncated)
pub fn usable_list_name(name: &str, config: &ExportConfig) -> String {
    usable_name(name, None, config)
}

/// File name stem for a card, truncated to the configured title length
pub fn usable_card_name(name: &str, config: &ExportConfig) -> String {
    usable_name(name, Some(config.max_card_filename_title_length), config)
}

/// Final entry name: `"<index> <name>"` when numbering, otherwise `"<name> <suffix>"`
///
/// The suffix is only used without numbering, where it is the only thing keeping
/// duplicate names apart.
pub fn entry_name(usable_name: &str, index: usize, suffix: &str, numbering: bool) -> String {
    if numbering {
        format!("{index} {usable_name}")
    } else if suffix.is_empty() {
        usable_name.to_string()
    } else {
        format!("{usable_name} {suffix}")
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, remove_emoji: bool) -> ExportConfig {
        ExportConfig {
            max_card_filename_title_length: max,
            remove_emoji,
            ..Default::default()
        }
    }

    #[test]
    fn card_name_is_trimmed_and_spaces_collapsed() {
        assert_eq!(usable_card_name(" card  title ", &config(40, false)), "card title");
    }

    #[test]
    fn list_name_is_trimmed_and_spaces_collapsed() {
        assert_eq!(usable_list_name(" list  title ", &config(40, false)), "list title");
    }

    #[test]
    fn board_name_is_trimmed_and_spaces_collapsed() {
        assert_eq!(
            usable_board_name(" board  title ", &config(40, false)),
            "board title"
        );
    }

    #[test]
    fn card_names_are_truncated_by_characters() {
        assert_eq!(usable_card_name("Card 1", &config(2, false)), "Ca");
        assert_eq!(usable_card_name("héllo wörld", &config(5, false)), "héllo");
    }

    #[test]
    fn truncation_does_not_leave_trailing_space() {
        assert_eq!(usable_card_name("Card 1", &config(5, false)), "Card");
    }

    #[test]
    fn list_names_are_never_truncated() {
        assert_eq!(usable_list_name("List 1", &config(2, false)), "List 1");
    }

    #[test]
    fn emoji_replaced_only_when_enabled() {
        assert_eq!(usable_card_name("Card 💪", &config(40, true)), "Card _");
        assert_eq!(usable_card_name("Card 💪", &config(40, false)), "Card 💪");
    }

    #[test]
    fn invalid_characters_are_joined_with_underscore() {
        assert_eq!(sanitise_for_path("a/b\\c"), "a_b_c");
        assert_eq!(sanitise_for_path("what? really*"), "what_ really");
        assert_eq!(sanitise_for_path("<<tag>>"), "tag");
        assert_eq!(sanitise_for_path("line\nbreak"), "line_break");
    }

    #[test]
    fn trailing_dots_are_removed() {
        assert_eq!(sanitise_for_path("etc..."), "etc");
        assert_eq!(sanitise_for_path("v1.2"), "v1.2");
    }

    #[test]
    fn name_with_nothing_usable_falls_back() {
        assert_eq!(sanitise_for_path("???"), "_");
        assert_eq!(sanitise_for_path(""), "_");
    }

    #[test]
    fn entry_name_numbering_and_suffixes() {
        assert_eq!(entry_name("Card", 3, "2", true), "3 Card");
        assert_eq!(entry_name("Card", 3, "2", false), "Card 2");
        assert_eq!(entry_name("Card", 3, "", false), "Card");
    }
}
