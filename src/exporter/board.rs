//! Phase 1 for one board: fetch, order, name, create folders, export cards

use super::ExportContext;
use super::card::{self, CardJob};
use crate::disambiguation;
use crate::error::{Error, Result};
use crate::naming;
use crate::types::{Action, Board, BoardSummary, Checklist, Event, List};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Folder for archived lists (inside a board) and archived cards (inside a list)
pub(crate) const ARCHIVED_FOLDER: &str = "archived";

/// A board after phase 1, with every card's output paths filled in
#[derive(Debug)]
pub(crate) struct BoardOutcome {
    pub(crate) board: Board,
    /// Where the raw backup was written
    pub(crate) backup_path: PathBuf,
    /// Attachments that failed and were tolerated
    pub(crate) failed_attachments: usize,
}

/// Export one board; errors are wrapped with the board's name
pub(crate) async fn export_board(
    ctx: Arc<ExportContext>,
    summary: BoardSummary,
    folder_name: String,
) -> Result<BoardOutcome> {
    info!(board = %summary.name, "starting board");
    ctx.emit_event(Event::BoardStarted {
        board: summary.name.clone(),
    });

    match run_board(&ctx, &summary, &folder_name).await {
        Ok(outcome) => {
            info!(board = %summary.name, cards = outcome.board.cards.len(), "finished board");
            ctx.emit_event(Event::BoardFinished {
                board: summary.name.clone(),
                cards: outcome.board.cards.len(),
            });
            Ok(outcome)
        }
        Err(e) => Err(Error::Board {
            board: summary.name,
            source: Box::new(e),
        }),
    }
}

async fn run_board(
    ctx: &Arc<ExportContext>,
    summary: &BoardSummary,
    folder_name: &str,
) -> Result<BoardOutcome> {
    // the backup and the full comment history are independent
    let (raw, comments) = tokio::try_join!(
        ctx.client.fetch_board_backup(&summary.short_link),
        ctx.client.fetch_board_comments(&summary.short_link),
    )?;

    // written before parsing so a board that fails to parse still leaves its payload
    let backup_path = ctx.root.join(format!("{folder_name}.json"));
    tokio::fs::write(&backup_path, &raw).await?;

    let mut board = Board::from_backup(&raw)?;
    let board_dir = ctx.root.join(folder_name);
    let jobs = plan_board(&mut board, &board_dir, comments, ctx.export())?;
    create_folders(&board_dir, &board.lists).await?;
    debug!(board = %board.name, cards = jobs.len(), "dispatching cards");

    let results: Vec<Result<card::CardOutcome>> = stream::iter(jobs)
        .map(|job| {
            let ctx = Arc::clone(ctx);
            async move {
                tokio::spawn(async move {
                    let work = card::export_card(Arc::clone(&ctx), job);
                    ctx.cancellable(work).await
                })
                .await
                .map_err(Error::from)
                .and_then(|r| r)
            }
        })
        .buffer_unordered(ctx.export().max_concurrent_cards.max(1))
        .collect()
        .await;

    // a failed card doesn't stop its siblings; the first failure is reported
    let mut failed_attachments = 0;
    let mut first_error: Option<Error> = None;
    for result in results {
        match result {
            Ok(outcome) => {
                failed_attachments += outcome.failed_attachments;
                board.cards[outcome.slot] = outcome.card;
            }
            Err(e) => {
                tracing::error!(board = %board.name, error = %e, "card export failed");
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(BoardOutcome {
        board,
        backup_path,
        failed_attachments,
    })
}

/// Create the folder tree laid out by [`plan_board`]
///
/// Each list's archive folder sits inside the list folder, so creating it makes both.
pub(crate) async fn create_folders(board_dir: &Path, lists: &[List]) -> Result<()> {
    tokio::fs::create_dir_all(board_dir.join(ARCHIVED_FOLDER)).await?;
    for archive_folder in lists.iter().filter_map(|list| list.archive_folder.as_ref()) {
        tokio::fs::create_dir_all(archive_folder).await?;
    }
    Ok(())
}

/// Everything that must happen in position order before any card work starts
///
/// Sorts lists and cards, assigns every list its folders, and hands out card indices and
/// suffixes. Card indices come from per-list counters, so this runs synchronously; the
/// folders themselves are made by [`create_folders`].
pub(crate) fn plan_board(
    board: &mut Board,
    board_dir: &Path,
    comments: Vec<Action>,
    export: &crate::config::ExportConfig,
) -> Result<Vec<CardJob>> {
    // stable sorts, so equal positions keep source order
    board.lists.sort_by(|a, b| a.pos.total_cmp(&b.pos));
    board.cards.sort_by(|a, b| a.pos.total_cmp(&b.pos));

    let archived_lists_dir = board_dir.join(ARCHIVED_FOLDER);

    let list_suffixes = disambiguation::suffixes_for(&board.lists, export);
    let mut open_lists = 0;
    let mut archived_lists = 0;
    for (list, suffix) in board.lists.iter_mut().zip(list_suffixes) {
        let (parent, counter) = if list.closed {
            (archived_lists_dir.as_path(), &mut archived_lists)
        } else {
            (board_dir, &mut open_lists)
        };
        let name = naming::usable_list_name(&list.name, export);
        let folder = parent.join(naming::entry_name(&name, *counter, &suffix, export.numbering));
        *counter += 1;

        let archive_folder = folder.join(ARCHIVED_FOLDER);
        list.folder = Some(folder);
        list.archive_folder = Some(archive_folder);
    }

    let list_slots: HashMap<String, usize> = board
        .lists
        .iter()
        .enumerate()
        .map(|(slot, list)| (list.id.clone(), slot))
        .collect();

    let checklists: HashMap<&str, &Checklist> = board
        .checklists
        .iter()
        .map(|checklist| (checklist.id.as_str(), checklist))
        .collect();

    let mut comments_by_card: HashMap<String, Vec<Action>> = HashMap::new();
    for comment in comments.into_iter().filter(Action::is_comment) {
        if let Some(card_id) = comment.card_id() {
            comments_by_card
                .entry(card_id.to_string())
                .or_default()
                .push(comment);
        }
    }

    let board_ref = board.board_ref();
    let card_suffixes = disambiguation::suffixes_for(&board.cards, export);
    let mut jobs = Vec::with_capacity(board.cards.len());

    for (slot, (card, suffix)) in board.cards.iter_mut().zip(card_suffixes).enumerate() {
        let Some(&list_slot) = list_slots.get(&card.id_list) else {
            return Err(Error::invalid_board(
                &board.name,
                format!("card {:?} references unknown list {:?}", card.id, card.id_list),
            ));
        };
        let list = &mut board.lists[list_slot];

        let folder = if card.closed {
            list.archive_folder.clone()
        } else {
            list.folder.clone()
        }
        .ok_or_else(|| Error::invalid_board(&board.name, "list folder was not created"))?;

        card.index = list.take_card_index(card.closed);
        card.duplicate_suffix = suffix;
        card.board = Some(Arc::clone(&board_ref));

        let card_checklists = card
            .id_checklists
            .iter()
            .filter_map(|id| checklists.get(id.as_str()).map(|&c| c.clone()))
            .collect();

        jobs.push(CardJob {
            slot,
            card: card.clone(),
            folder,
            checklists: card_checklists,
            comments: comments_by_card.remove(&card.id).unwrap_or_default(),
        });
    }

    Ok(jobs)
}
