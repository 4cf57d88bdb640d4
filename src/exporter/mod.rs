//! Export orchestration split into focused submodules.
//!
//! A run has two phases:
//! - phase 1: every selected board is exported concurrently ([`board`]), and inside each
//!   board every card is exported concurrently ([`card`], [`attachments`])
//! - phase 2: once all boards are on disk, card URLs are rewritten into relative links
//!   ([`crate::links`])
//!
//! Phase 2 needs the final path of every card, so it only starts after every board has
//! finished. If any board failed, phase 2 is skipped and the run fails.

mod attachments;
mod board;
mod card;
pub mod markdown;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::client::TrelloClient;
use crate::config::{Config, ExportConfig};
use crate::disambiguation;
use crate::error::{Error, Result};
use crate::links::LinkResolver;
use crate::naming;
use crate::rate_limiter::RateLimiter;
use crate::types::{Board, BoardSummary, Event, ExportSummary};
use crate::utils::remove_dir_all_with_retries;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Everything a board or card task needs, shared by reference count
pub(crate) struct ExportContext {
    /// Rate-limited API client
    pub(crate) client: TrelloClient,
    /// Run configuration
    pub(crate) config: Arc<Config>,
    /// Root of the export tree (`<output_dir>/t2md`)
    pub(crate) root: PathBuf,
    /// Event broadcast channel sender
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancels the run; spawned board and card tasks stop at their next await
    pub(crate) cancel: CancellationToken,
}

impl ExportContext {
    pub(crate) fn export(&self) -> &ExportConfig {
        &self.config.export
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Run `work` unless the run is cancelled first
    pub(crate) async fn cancellable<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = work => result,
        }
    }
}

/// Backs up every selected board into a tree of Markdown files
///
/// Cloneable; clones share the rate limiter, event channel and cancellation token.
#[derive(Clone)]
pub struct Exporter {
    ctx: Arc<ExportContext>,
    cancel: CancellationToken,
}

impl Exporter {
    /// Create an exporter from a validated configuration
    ///
    /// Must be called inside a Tokio runtime (the rate limiter runs a background task).
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be created
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let limiter = RateLimiter::with_cancellation(config.api.rate_limit, &cancel);
        let client = TrelloClient::new(&config.credentials, &config.api, limiter)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            ctx: Arc::new(ExportContext {
                client,
                root: config.export_root(),
                config: Arc::new(config),
                event_tx,
                cancel: cancel.clone(),
            }),
            cancel,
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.event_tx.subscribe()
    }

    /// Token that stops the run (and the rate limiter) when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The folder the export is written to
    pub fn export_root(&self) -> &std::path::Path {
        &self.ctx.root
    }

    /// Run a full export
    ///
    /// Deletes and recreates the export folder, exports every selected board, then
    /// rewrites cross-card links.
    ///
    /// # Errors
    /// - [`Error::ExportFailed`] if any board failed (links are not rewritten)
    /// - [`Error::Cancelled`] if the cancellation token fired
    /// - any error from listing boards or preparing the output folder
    pub async fn run(&self) -> Result<ExportSummary> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.run_phases() => result,
        }
    }

    async fn run_phases(&self) -> Result<ExportSummary> {
        let ctx = &self.ctx;
        let config = &ctx.config;

        info!(root = %ctx.root.display(), "preparing export folder");
        remove_dir_all_with_retries(&ctx.root, &config.export.delete_retry).await?;
        tokio::fs::create_dir_all(&ctx.root).await?;

        let boards = self.select_boards().await?;
        let folder_names = board_folder_names(&boards, &config.export);
        info!(count = boards.len(), "exporting boards");

        // phase 1
        let total = boards.len();
        let outcomes: Vec<(String, Result<board::BoardOutcome>)> =
            stream::iter(boards.into_iter().zip(folder_names))
                .map(|(summary, folder_name)| {
                    let ctx = Arc::clone(ctx);
                    let name = summary.name.clone();
                    async move {
                        let handle = tokio::spawn(async move {
                            let work = board::export_board(Arc::clone(&ctx), summary, folder_name);
                            ctx.cancellable(work).await
                        });
                        let result = handle.await.map_err(Error::from).and_then(|r| r);
                        (name, result)
                    }
                })
                .buffer_unordered(config.export.max_concurrent_boards.max(1))
                .collect()
                .await;

        let mut exported: Vec<Board> = Vec::with_capacity(total);
        let mut backups: Vec<PathBuf> = Vec::with_capacity(total);
        let mut summary = ExportSummary {
            root: ctx.root.clone(),
            ..Default::default()
        };
        let mut failed = 0;
        for (name, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    summary.cards += outcome.board.cards.len();
                    summary.failed_attachments += outcome.failed_attachments;
                    backups.push(outcome.backup_path);
                    exported.push(outcome.board);
                }
                Err(e) => {
                    failed += 1;
                    error!(board = %name, error = %e, "board export failed");
                    ctx.emit_event(Event::BoardFailed {
                        board: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        if failed > 0 {
            return Err(Error::ExportFailed { failed, total });
        }
        summary.boards = exported.len();

        // phase 2
        let resolver = Arc::new(LinkResolver::new(
            &exported,
            &config.api.site_base_url,
            &config.boards,
            &config.export,
        )?);
        summary.files_relinked = resolver
            .rewrite_all(&exported, config.export.max_concurrent_cards, &ctx.event_tx)
            .await?;

        if !config.export.keep_raw_backups {
            remove_raw_backups(&backups).await?;
        }

        info!(
            boards = summary.boards,
            cards = summary.cards,
            relinked = summary.files_relinked,
            "export complete"
        );
        ctx.emit_event(Event::ExportComplete {
            boards: summary.boards,
            cards: summary.cards,
        });
        Ok(summary)
    }

    /// List the member's boards and apply the include/exclude selection
    async fn select_boards(&self) -> Result<Vec<BoardSummary>> {
        let selection = &self.ctx.config.boards;
        let boards: Vec<BoardSummary> = self
            .ctx
            .client
            .list_boards()
            .await?
            .into_iter()
            .filter(|board| selection.is_selected(&board.name, &board.short_link))
            .collect();

        if boards.is_empty() {
            warn!("no boards selected for export");
        }
        Ok(boards)
    }
}

/// Folder (and JSON file) name per board, with duplicates disambiguated
fn board_folder_names(boards: &[BoardSummary], export: &ExportConfig) -> Vec<String> {
    let suffixes = disambiguation::suffixes_for(boards, export);
    boards
        .iter()
        .zip(suffixes)
        .map(|(board, suffix)| {
            let name = naming::usable_board_name(&board.name, export);
            naming::entry_name(&name, 0, &suffix, false)
        })
        .collect()
}

/// Delete the raw `<board>.json` backups after a successful run
async fn remove_raw_backups(backups: &[PathBuf]) -> Result<()> {
    for path in backups {
        tokio::fs::remove_file(path).await?;
    }
    tracing::debug!(count = backups.len(), "removed raw board backups");
    Ok(())
}
