//! Core types for t2md
//!
//! The board entities mirror the board backup document (`/b/<shortLink>.json`). Only the
//! fields the exporter uses are modelled; everything else in the payload is ignored. Fields
//! marked `#[serde(skip)]` are filled in while a board is exported.

use crate::error::{Error, Result};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Position decoded from the `"bottom"` token
///
/// One step below `f64::MAX` rather than the maximum itself, so ties with it still sort.
pub const BOTTOM_POSITION: f64 = f64::from_bits(f64::MAX.to_bits() - 1);

/// Action type of a card comment
pub const COMMENT_ACTION_TYPE: &str = "commentCard";

/// A board as listed by `/members/me/boards`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    /// Board identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Short link code used in board and backup URLs
    #[serde(default)]
    pub short_link: String,
}

impl BoardSummary {
    /// Ensure name and short link are present
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.short_link.is_empty() {
            return Err(Error::invalid_board(
                display_or(&self.short_link, &self.id),
                "board listing is missing a name or short link",
            ));
        }
        Ok(())
    }
}

/// Identity of the board a card belongs to
///
/// Shared by every card of a board so the link pass can apply board exclusions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardRef {
    /// Board display name
    pub name: String,
    /// Board short link code
    pub short_link: String,
}

/// A full board backup
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Board identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Short link code
    #[serde(default)]
    pub short_link: String,
    /// Lists in source order
    #[serde(default)]
    pub lists: Vec<List>,
    /// Cards in source order
    #[serde(default)]
    pub cards: Vec<Card>,
    /// Checklists of every card on the board
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    /// Recent actions (truncated by the backup; full comment history is fetched separately)
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Board {
    /// Parse and validate a raw backup document
    pub fn from_backup(raw: &[u8]) -> Result<Self> {
        let board: Board = serde_json::from_slice(raw)?;
        board.validate()?;
        Ok(board)
    }

    /// Check every required field of the board and the entities it contains
    pub fn validate(&self) -> Result<()> {
        let label = display_or(&self.name, &self.short_link);
        if self.name.is_empty() || self.short_link.is_empty() {
            return Err(Error::invalid_board(label, "board is missing a name or short link"));
        }
        for list in &self.lists {
            if list.id.is_empty() || list.name.is_empty() {
                return Err(Error::invalid_board(label, "a list is missing its id or name"));
            }
        }
        for card in &self.cards {
            if card.id.is_empty() || card.name.is_empty() || card.id_list.is_empty() {
                return Err(Error::invalid_board(
                    label,
                    format!("card {:?} is missing its id, name or list", card.id),
                ));
            }
            for attachment in &card.attachments {
                if attachment.id.is_empty() || attachment.url.is_empty() {
                    return Err(Error::invalid_board(
                        label,
                        format!("an attachment on card {:?} is missing its id or url", card.id),
                    ));
                }
            }
        }
        for checklist in &self.checklists {
            if checklist.id.is_empty() || checklist.id_card.is_empty() {
                return Err(Error::invalid_board(
                    label,
                    "a checklist is missing its id or card",
                ));
            }
            if checklist.check_items.iter().any(|item| item.id.is_empty()) {
                return Err(Error::invalid_board(
                    label,
                    format!("a check item in checklist {:?} has no id", checklist.id),
                ));
            }
        }
        Ok(())
    }

    /// Shared identity handed to each card
    pub fn board_ref(&self) -> Arc<BoardRef> {
        Arc::new(BoardRef {
            name: self.name.clone(),
            short_link: self.short_link.clone(),
        })
    }
}

/// A list (column) on a board
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// List identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Position on the board
    #[serde(default, deserialize_with = "position")]
    pub pos: f64,
    /// Archived
    #[serde(default)]
    pub closed: bool,

    /// Folder created for the list's open cards
    #[serde(skip)]
    pub folder: Option<PathBuf>,
    /// Folder created for the list's archived cards
    #[serde(skip)]
    pub archive_folder: Option<PathBuf>,
    /// Index the next open card in this list receives
    #[serde(skip)]
    pub next_open_index: usize,
    /// Index the next archived card in this list receives
    #[serde(skip)]
    pub next_archived_index: usize,
}

impl List {
    /// Take the next card index for the given archived state
    ///
    /// Called once per card in position order, before any card work is dispatched.
    pub fn take_card_index(&mut self, archived: bool) -> usize {
        let counter = if archived {
            &mut self.next_archived_index
        } else {
            &mut self.next_open_index
        };
        let index = *counter;
        *counter += 1;
        index
    }
}

/// A card on a board
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Owning list
    #[serde(default)]
    pub id_list: String,
    /// Description (Markdown)
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    /// Position within the list
    #[serde(default, deserialize_with = "position")]
    pub pos: f64,
    /// Archived
    #[serde(default)]
    pub closed: bool,
    /// Short code other cards use to link here (`/c/<shortLink>`)
    #[serde(default)]
    pub short_link: String,
    /// Checklists on this card
    #[serde(default)]
    pub id_checklists: Vec<String>,
    /// Attachments on this card
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Board this card was exported from
    #[serde(skip)]
    pub board: Option<Arc<BoardRef>>,
    /// Index within its list and archived state
    #[serde(skip)]
    pub index: usize,
    /// Disambiguation suffix (empty when the name is unique)
    #[serde(skip)]
    pub duplicate_suffix: String,
    /// Files written for this card
    #[serde(skip)]
    pub paths: CardPaths,
}

/// Output files written for a card
///
/// In single-file mode every populated field points at the same file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardPaths {
    /// Description file (always written)
    pub description: Option<PathBuf>,
    /// Checklists file, if the card has checklists
    pub checklists: Option<PathBuf>,
    /// Comments file, if the card has comments
    pub comments: Option<PathBuf>,
    /// Attachment table, if the card has uploaded attachments
    pub attachments: Option<PathBuf>,
}

impl CardPaths {
    /// Every populated path, once each
    pub fn distinct(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for path in [
            &self.description,
            &self.checklists,
            &self.comments,
            &self.attachments,
        ]
        .into_iter()
        .flatten()
        {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }
}

/// A checklist; belongs to a card but is stored at board level
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    /// Checklist identifier
    #[serde(default)]
    pub id: String,
    /// Owning card
    #[serde(default)]
    pub id_card: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Position within the card
    #[serde(default, deserialize_with = "position")]
    pub pos: f64,
    /// Items in the checklist
    #[serde(default)]
    pub check_items: Vec<CheckItem>,
}

/// One checklist entry
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckItem {
    /// Item identifier
    #[serde(default)]
    pub id: String,
    /// Owning checklist
    #[serde(default)]
    pub id_checklist: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Position within the checklist
    #[serde(default, deserialize_with = "position")]
    pub pos: f64,
    /// Completion state
    #[serde(default)]
    pub state: CheckState,
}

/// Completion state of a check item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    /// Ticked
    Complete,
    /// Anything else
    #[default]
    Incomplete,
}

impl<'de> Deserialize<'de> for CheckState {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let state = Option::<String>::deserialize(deserializer)?;
        Ok(match state.as_deref() {
            Some("complete") => CheckState::Complete,
            _ => CheckState::Incomplete,
        })
    }
}

/// A board action; only comments are used
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Action {
    /// Action identifier
    #[serde(default)]
    pub id: String,
    /// Action type, `commentCard` for comments
    #[serde(rename = "type", default)]
    pub action_type: String,
    /// ISO-8601 timestamp; sorts correctly as a string
    #[serde(default)]
    pub date: String,
    /// Payload
    #[serde(default)]
    pub data: ActionData,
}

impl Action {
    /// Whether this action is a card comment
    pub fn is_comment(&self) -> bool {
        self.action_type == COMMENT_ACTION_TYPE
    }

    /// Card the action refers to
    pub fn card_id(&self) -> Option<&str> {
        self.data
            .card
            .as_ref()
            .map(|card| card.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Payload of an action
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionData {
    /// Comment text
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    /// Card the action happened on
    #[serde(default)]
    pub card: Option<ActionCard>,
}

/// The subset of a card embedded in an action
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionCard {
    /// Card identifier
    #[serde(default)]
    pub id: String,
}

/// A card attachment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment identifier; names the downloaded file
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Original file name; supplies the extension
    #[serde(default, deserialize_with = "lenient_string")]
    pub file_name: String,
    /// Source URL
    #[serde(default)]
    pub url: String,
    /// Uploaded file (true) or pasted link (false); only uploads are downloaded
    #[serde(default)]
    pub is_upload: bool,

    /// Relative link to the downloaded copy, spaces encoded; set once the download succeeds
    #[serde(skip)]
    pub local_path: Option<String>,
}

/// Event emitted during an export run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Work on a board started
    BoardStarted {
        /// Board name
        board: String,
    },

    /// A board's Markdown tree was written
    BoardFinished {
        /// Board name
        board: String,
        /// Number of cards exported
        cards: usize,
    },

    /// A board failed; its siblings keep running
    BoardFailed {
        /// Board name
        board: String,
        /// Error message
        error: String,
    },

    /// An attachment couldn't be downloaded and was listed as failed
    AttachmentFailed {
        /// Board name
        board: String,
        /// Card name
        card: String,
        /// Attachment file name
        attachment: String,
        /// Source URL
        url: String,
        /// Error message
        error: String,
    },

    /// Card references in a file were turned into local links
    LinksRewritten {
        /// File that changed
        path: PathBuf,
        /// Number of links replaced
        links: usize,
    },

    /// The run finished
    ExportComplete {
        /// Boards exported
        boards: usize,
        /// Cards exported
        cards: usize,
    },
}

/// Summary returned by a successful run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Root of the export tree
    pub root: PathBuf,
    /// Boards exported
    pub boards: usize,
    /// Cards exported
    pub cards: usize,
    /// Attachments that failed and were tolerated
    pub failed_attachments: usize,
    /// Files changed by the link pass
    pub files_relinked: usize,
}

fn display_or<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

/// Decode a position from a number, a numeric string, `"top"` or `"bottom"`
fn position<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct PositionVisitor;

    impl Visitor<'_> for PositionVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, a numeric string, \"top\" or \"bottom\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<f64, E> {
            match v.trim() {
                "top" => Ok(0.0),
                "bottom" => Ok(BOTTOM_POSITION),
                other => other
                    .parse::<f64>()
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<f64, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(PositionVisitor)
}

/// Decode free text that may arrive as a bool, number or null
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientStringVisitor;

    impl Visitor<'_> for LenientStringVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, bool, number or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientStringVisitor)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_accepts_numbers() {
        let card: Card = serde_json::from_str(r#"{"pos": 16384}"#).unwrap();
        assert_eq!(card.pos, 16384.0);

        let card: Card = serde_json::from_str(r#"{"pos": 123.45}"#).unwrap();
        assert_eq!(card.pos, 123.45);
    }

    #[test]
    fn position_accepts_numeric_strings() {
        let card: Card = serde_json::from_str(r#"{"pos": "123.45"}"#).unwrap();
        assert_eq!(card.pos, 123.45);
    }

    #[test]
    fn position_sentinels() {
        let card: Card = serde_json::from_str(r#"{"pos": "top"}"#).unwrap();
        assert_eq!(card.pos, 0.0);

        let card: Card = serde_json::from_str(r#"{"pos": "bottom"}"#).unwrap();
        assert_eq!(card.pos, BOTTOM_POSITION);
        assert!(card.pos < f64::MAX);
        assert!(card.pos.is_finite());
    }

    #[test]
    fn position_rejects_other_strings() {
        let result = serde_json::from_str::<Card>(r#"{"pos": "middle"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_position_defaults_to_zero() {
        let list: List = serde_json::from_str(r#"{"id": "l1", "name": "Todo"}"#).unwrap();
        assert_eq!(list.pos, 0.0);
        assert!(!list.closed);
    }

    #[test]
    fn lenient_strings_accept_scalars() {
        let card: Card =
            serde_json::from_str(r#"{"name": true, "desc": 42, "id": "c1"}"#).unwrap();
        assert_eq!(card.name, "true");
        assert_eq!(card.desc, "42");

        let card: Card = serde_json::from_str(r#"{"name": false, "desc": null}"#).unwrap();
        assert_eq!(card.name, "false");
        assert_eq!(card.desc, "");

        let card: Card = serde_json::from_str(r#"{"name": 1.5}"#).unwrap();
        assert_eq!(card.name, "1.5");
    }

    #[test]
    fn check_state_decodes_complete_and_anything_else() {
        let item: CheckItem = serde_json::from_str(r#"{"state": "complete"}"#).unwrap();
        assert_eq!(item.state, CheckState::Complete);

        let item: CheckItem = serde_json::from_str(r#"{"state": "incomplete"}"#).unwrap();
        assert_eq!(item.state, CheckState::Incomplete);

        let item: CheckItem = serde_json::from_str(r#"{"state": "not complete"}"#).unwrap();
        assert_eq!(item.state, CheckState::Incomplete);
    }

    #[test]
    fn board_parses_camel_case_payload() {
        let json = r#"{
            "id": "b1",
            "name": "Work",
            "shortLink": "AbC123",
            "unknownField": {"ignored": true},
            "lists": [{"id": "l1", "name": "Todo", "pos": 1, "closed": false}],
            "cards": [{
                "id": "c1", "name": "Card", "idList": "l1", "shortLink": "cD45",
                "idChecklists": ["k1"],
                "attachments": [{"id": "a1", "name": "x.png", "fileName": "x.png",
                                 "url": "https://example.com/x.png", "isUpload": true}]
            }],
            "checklists": [{"id": "k1", "idCard": "c1", "name": "Steps",
                            "checkItems": [{"id": "i1", "idChecklist": "k1", "name": "one",
                                            "state": "complete", "pos": "bottom"}]}],
            "actions": [{"id": "x1", "type": "commentCard", "date": "2023-01-01T00:00:00.000Z",
                         "data": {"text": "hello", "card": {"id": "c1", "name": "Card"}}}]
        }"#;

        let board: Board = serde_json::from_str(json).unwrap();
        board.validate().unwrap();
        assert_eq!(board.short_link, "AbC123");
        assert_eq!(board.cards[0].id_list, "l1");
        assert_eq!(board.cards[0].short_link, "cD45");
        assert!(board.cards[0].attachments[0].is_upload);
        assert_eq!(board.checklists[0].check_items[0].state, CheckState::Complete);
        assert!(board.actions[0].is_comment());
        assert_eq!(board.actions[0].card_id(), Some("c1"));
    }

    #[test]
    fn board_without_short_link_is_invalid() {
        let board: Board = serde_json::from_str(r#"{"name": "Work"}"#).unwrap();
        assert!(matches!(
            board.validate(),
            Err(Error::InvalidBoard { .. })
        ));
    }

    #[test]
    fn card_without_list_is_invalid() {
        let board: Board = serde_json::from_str(
            r#"{"name": "Work", "shortLink": "s", "cards": [{"id": "c1", "name": "Card"}]}"#,
        )
        .unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("c1"), "{err}");
    }

    #[test]
    fn empty_board_is_valid() {
        let board: Board =
            serde_json::from_str(r#"{"name": "Empty", "shortLink": "e1"}"#).unwrap();
        board.validate().unwrap();
        assert!(board.lists.is_empty());
        assert!(board.cards.is_empty());
    }

    #[test]
    fn board_summary_requires_name_and_short_link() {
        let summary: BoardSummary =
            serde_json::from_str(r#"{"id": "b1", "name": "Work", "shortLink": "s1"}"#).unwrap();
        summary.validate().unwrap();

        let summary: BoardSummary = serde_json::from_str(r#"{"id": "b1", "name": "Work"}"#).unwrap();
        assert!(summary.validate().is_err());
    }

    #[test]
    fn card_indices_count_per_archived_state() {
        let mut list = List::default();
        assert_eq!(list.take_card_index(false), 0);
        assert_eq!(list.take_card_index(true), 0);
        assert_eq!(list.take_card_index(false), 1);
        assert_eq!(list.take_card_index(true), 1);
        assert_eq!(list.take_card_index(false), 2);
    }

    #[test]
    fn distinct_paths_collapse_single_file_mode() {
        let file = PathBuf::from("/out/0 Card.md");
        let paths = CardPaths {
            description: Some(file.clone()),
            checklists: Some(file.clone()),
            comments: None,
            attachments: Some(file.clone()),
        };
        assert_eq!(paths.distinct(), vec![file]);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::BoardFinished {
            board: "Work".into(),
            cards: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "board_finished");
        assert_eq!(json["cards"], 3);
    }

    #[test]
    fn backup_parse_rejects_malformed_and_incomplete_boards() {
        let result = Board::from_backup(b"{not json");
        assert!(matches!(result, Err(Error::Serialization(_))), "{result:?}");

        let result = Board::from_backup(br#"{"name": "Work"}"#);
        assert!(matches!(result, Err(Error::InvalidBoard { .. })), "{result:?}");

        let board =
            Board::from_backup(br#"{"id": "b1", "name": "Work", "shortLink": "w1"}"#).unwrap();
        assert_eq!(board.short_link, "w1");
        assert!(board.lists.is_empty());
    }
}
