//! Markdown rendering for card sections

use crate::types::{Action, Attachment, Card, CheckState, Checklist};
use crate::utils::RelativeLink;

/// Table cell written for an attachment that couldn't be downloaded
pub const FAILED_DOWNLOAD_CELL: &str = "**failed to download**";

/// One row of a card's attachment table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentRow {
    /// Downloaded; links to the local copy
    Downloaded {
        /// Attachment identifier
        id: String,
        /// Original file name
        file_name: String,
        /// Link from the card folder to the downloaded file
        link: RelativeLink,
    },
    /// Download failed and was tolerated
    Failed {
        /// Attachment identifier
        id: String,
        /// Original file name
        file_name: String,
    },
}

impl AttachmentRow {
    /// The row as a Markdown table line
    pub fn to_markdown(&self) -> String {
        match self {
            AttachmentRow::Downloaded {
                id,
                file_name,
                link,
            } => format!("{id} | {file_name} | [{}]({})", link.path, link.encoded),
            AttachmentRow::Failed { id, file_name } => {
                format!("{id} | {file_name} | {FAILED_DOWNLOAD_CELL}")
            }
        }
    }
}

/// Title, a greppable link back to the card, a rule, then the description body
pub fn description(card: &Card, site_base_url: &str) -> String {
    format!(
        "# {}\n\nOriginal URL: {}/c/{}\n\n---\n\n{}",
        card.name,
        site_base_url.trim_end_matches('/'),
        card.short_link,
        card.desc
    )
}

/// Checklists in position order, or `None` if the card has none
pub fn checklists(card_name: &str, checklists: &[Checklist]) -> Option<String> {
    if checklists.is_empty() {
        return None;
    }

    let mut ordered: Vec<&Checklist> = checklists.iter().collect();
    ordered.sort_by(|a, b| a.pos.total_cmp(&b.pos));

    let mut text = format!("# {card_name} - Checklists\n\n");
    for checklist in ordered {
        text.push_str(&format!("## {}\n\n", checklist.name));

        let mut items: Vec<_> = checklist.check_items.iter().collect();
        items.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        for item in items {
            let mark = match item.state {
                CheckState::Complete => 'x',
                CheckState::Incomplete => ' ',
            };
            text.push_str(&format!("- [{mark}] {}\n", item.name));
        }
        text.push('\n');
    }
    Some(text)
}

/// Comments oldest first, separated by rules, or `None` if there are none
pub fn comments(card_name: &str, comments: &[Action]) -> Option<String> {
    if comments.is_empty() {
        return None;
    }

    // ISO-8601 timestamps sort correctly as strings
    let mut ordered: Vec<&Action> = comments.iter().collect();
    ordered.sort_by(|a, b| a.date.cmp(&b.date));

    let mut text = format!("# {card_name} - Comments\n\n");
    for comment in ordered {
        text.push_str("---\n\n");
        text.push_str(&comment.data.text);
        text.push_str("\n\n");
    }
    Some(text)
}

/// The attachment table
pub fn attachments_table(card_name: &str, rows: &[AttachmentRow]) -> String {
    let lines: Vec<String> = rows.iter().map(AttachmentRow::to_markdown).collect();
    format!(
        "# {card_name} - Attachments\n\n\
         id | original fileName | relative downloaded path\n\
         ---|---|---\n\
         {}",
        lines.join("\n")
    )
}

/// Point attachment URLs at their downloaded copies
///
/// Attachments that weren't downloaded keep their remote URL.
pub fn rewrite_attachment_urls(text: &str, attachments: &[Attachment]) -> String {
    let mut text = text.to_string();
    for attachment in attachments {
        if let Some(local) = &attachment.local_path
            && !attachment.url.is_empty()
        {
            text = text.replace(&attachment.url, local);
        }
    }
    text
}
