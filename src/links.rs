//! Cross-card link rewriting (phase 2)
//!
//! Once every board has been written, each exported file is scanned for card URLs
//! (`<site>/c/<shortLink>[/<slug>][/]`) and those pointing at exported cards are replaced
//! with relative Markdown links to the target card's description file.
//!
//! # Grammar
//!
//! ```text
//! reference := site "/c/" id [ "/" [ slug [ "/" ] ] ]
//! id        := [A-Za-z0-9]+
//! slug      := [A-Za-z0-9%_-]+
//! ```
//!
//! Trailing punctuation such as `.` or `)` is never part of a match.

use crate::config::{BoardSelection, ExportConfig};
use crate::error::{Error, Result};
use crate::types::{Board, Card, Event};
use crate::utils::relative_link;
use futures::stream::{self, StreamExt};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Build the card reference pattern for a site root such as `https://trello.com`
pub fn card_reference_regex(site_base_url: &str) -> Result<Regex> {
    let site = regex::escape(site_base_url.trim_end_matches('/'));
    Regex::new(&format!(
        r"{site}/c/(?P<id>[A-Za-z0-9]+)(?:/(?:[A-Za-z0-9%_-]+/?)?)?"
    ))
    .map_err(|e| Error::config(format!("invalid site URL for links: {e}"), "api.site_base_url"))
}

/// Every card reference in `text`, in order of appearance
pub fn find_card_references<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    pattern.find_iter(text).map(|m| m.as_str()).collect()
}

/// Where a card's description ended up, and what links to it look like
#[derive(Clone, Debug)]
struct LinkTarget {
    title: String,
    description: PathBuf,
    board_name: String,
    board_short_link: String,
}

/// Rewrites card URLs across the whole export
pub struct LinkResolver {
    pattern: Regex,
    targets: HashMap<String, LinkTarget>,
    selection: BoardSelection,
    forward_slashes: bool,
}

impl LinkResolver {
    /// Index every exported card by short link
    pub fn new(
        boards: &[Board],
        site_base_url: &str,
        selection: &BoardSelection,
        export: &ExportConfig,
    ) -> Result<Self> {
        let mut targets = HashMap::new();
        for card in boards.iter().flat_map(|board| &board.cards) {
            let (Some(description), Some(board)) = (&card.paths.description, &card.board) else {
                continue;
            };
            if card.short_link.is_empty() {
                continue;
            }
            targets.insert(
                card.short_link.clone(),
                LinkTarget {
                    title: card.name.clone(),
                    description: description.clone(),
                    board_name: board.name.clone(),
                    board_short_link: board.short_link.clone(),
                },
            );
        }

        Ok(Self {
            pattern: card_reference_regex(site_base_url)?,
            targets,
            selection: selection.clone(),
            forward_slashes: export.always_use_forward_slashes,
        })
    }

    /// Number of cards links can point at
    pub fn indexed_cards(&self) -> usize {
        self.targets.len()
    }

    /// Rewrite references in one text; returns the new text and how many links changed
    ///
    /// `own_short_link` is never rewritten, so a card's "original URL" line survives.
    pub fn rewrite_text(&self, text: &str, from_dir: &Path, own_short_link: &str) -> (String, usize) {
        let mut replaced = 0;
        let rewritten = self.pattern.replace_all(text, |caps: &Captures<'_>| {
            let original = caps[0].to_string();
            let id = &caps["id"];
            if id == own_short_link {
                return original;
            }
            let Some(target) = self.targets.get(id) else {
                return original;
            };
            if self
                .selection
                .is_link_excluded(&target.board_name, &target.board_short_link)
            {
                return original;
            }

            replaced += 1;
            let link = relative_link(from_dir, &target.description, self.forward_slashes);
            format!("[{}]({})", escape_link_label(&target.title), link.encoded)
        });
        (rewritten.into_owned(), replaced)
    }

    /// Rewrite one file in place; returns the number of links replaced
    ///
    /// The file is only written when something changed.
    pub async fn rewrite_file(&self, path: &Path, own_short_link: &str) -> Result<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        let from_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let (rewritten, replaced) = self.rewrite_text(&text, from_dir, own_short_link);

        if replaced > 0 && rewritten != text {
            tokio::fs::write(path, rewritten).await?;
            debug!(path = %path.display(), links = replaced, "rewrote card links");
            Ok(replaced)
        } else {
            Ok(0)
        }
    }

    /// Rewrite every file of one card
    pub async fn rewrite_card(&self, card: &Card) -> Result<Vec<(PathBuf, usize)>> {
        let mut changed = Vec::new();
        for path in card.paths.distinct() {
            let links = self.rewrite_file(&path, &card.short_link).await?;
            if links > 0 {
                changed.push((path, links));
            }
        }
        Ok(changed)
    }

    /// Rewrite all files of all boards, `concurrency` cards at a time
    ///
    /// Returns the number of files that changed.
    pub async fn rewrite_all(
        self: Arc<Self>,
        boards: &[Board],
        concurrency: usize,
        events: &broadcast::Sender<Event>,
    ) -> Result<usize> {
        info!(cards = self.targets.len(), "rewriting card links");

        let cards: Vec<Card> = boards
            .iter()
            .flat_map(|board| board.cards.iter().cloned())
            .collect();

        let results: Vec<Result<Vec<(PathBuf, usize)>>> = stream::iter(cards)
            .map(|card| {
                let resolver = Arc::clone(&self);
                tokio::spawn(async move { resolver.rewrite_card(&card).await })
            })
            .buffer_unordered(concurrency.max(1))
            .map(|joined| joined.map_err(Error::from).and_then(|result| result))
            .collect()
            .await;

        let mut files = 0;
        for result in results {
            for (path, links) in result? {
                files += 1;
                events.send(Event::LinksRewritten { path, links }).ok();
            }
        }
        Ok(files)
    }
}

/// Escape characters that would end a Markdown link label early
fn escape_link_label(title: &str) -> String {
    title.replace('[', "\\[").replace(']', "\\]")
}
