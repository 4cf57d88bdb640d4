//! Phase 1 for one card: description, checklists, attachments and comments

use super::ExportContext;
use super::attachments::{self, AttachmentTarget};
use super::markdown;
use crate::error::{Error, Result};
use crate::naming;
use crate::types::{Action, Card, CardPaths, Checklist};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A card ready to export; owns everything its task reads and writes
#[derive(Debug)]
pub(crate) struct CardJob {
    /// Position of the card in its board's card list
    pub(crate) slot: usize,
    pub(crate) card: Card,
    /// The list folder (archived or not) the card's files go in
    pub(crate) folder: PathBuf,
    pub(crate) checklists: Vec<Checklist>,
    pub(crate) comments: Vec<Action>,
}

/// A finished card, handed back to its board
#[derive(Debug)]
pub(crate) struct CardOutcome {
    pub(crate) slot: usize,
    pub(crate) card: Card,
    pub(crate) failed_attachments: usize,
}

/// File names derived from a card's stem
struct CardFiles {
    description: PathBuf,
    checklists: PathBuf,
    comments: PathBuf,
    attachments: PathBuf,
    attachments_dir: PathBuf,
}

impl CardFiles {
    fn new(folder: &Path, stem: &str) -> Self {
        Self {
            description: folder.join(format!("{stem}.md")),
            checklists: folder.join(format!("{stem} - Checklists.md")),
            comments: folder.join(format!("{stem} - Comments.md")),
            attachments: folder.join(format!("{stem} - Attachments.md")),
            attachments_dir: folder.join(format!("{stem} - Attachments")),
        }
    }
}

/// Export one card; errors are wrapped with the card and board names
pub(crate) async fn export_card(ctx: Arc<ExportContext>, job: CardJob) -> Result<CardOutcome> {
    let board = job
        .card
        .board
        .as_ref()
        .map(|board| board.name.clone())
        .unwrap_or_default();
    let name = job.card.name.clone();

    run_card(&ctx, job).await.map_err(|e| Error::Card {
        board,
        card: name,
        source: Box::new(e),
    })
}

async fn run_card(ctx: &ExportContext, job: CardJob) -> Result<CardOutcome> {
    let CardJob {
        slot,
        mut card,
        folder,
        checklists,
        comments,
    } = job;
    let export = ctx.export();

    let usable = naming::usable_card_name(&card.name, export);
    let stem = naming::entry_name(&usable, card.index, &card.duplicate_suffix, export.numbering);
    let files = CardFiles::new(&folder, &stem);
    debug!(card = %card.name, stem = %stem, "exporting card");

    let description = markdown::description(&card, &ctx.config.api.site_base_url);
    let checklists = markdown::checklists(&card.name, &checklists);
    let comments = markdown::comments(&card.name, &comments);
    let has_uploads = card.attachments.iter().any(|a| a.is_upload);

    let board_name = card
        .board
        .as_ref()
        .map(|board| board.name.clone())
        .unwrap_or_default();
    let card_name = card.name.clone();
    let target = AttachmentTarget {
        card_dir: &folder,
        attachments_dir: &files.attachments_dir,
        board: &board_name,
        card: &card_name,
    };

    let failed_attachments;
    let mut paths = CardPaths::default();

    if export.single_file {
        // every section is appended to the description file, in order
        let path = files.description.clone();
        let mut text = description;
        tokio::fs::write(&path, &text).await?;
        paths.description = Some(path.clone());

        if let Some(section) = checklists {
            text.push_str(&append_section(&path, &section).await?);
            paths.checklists = Some(path.clone());
        }

        let report = if has_uploads {
            let report =
                attachments::download_all(ctx, &target, &mut card.attachments).await?;
            let table = markdown::attachments_table(&card_name, &report.rows);
            text.push_str(&append_section(&path, &table).await?);
            paths.attachments = Some(path.clone());
            report
        } else {
            attachments::DownloadReport::default()
        };
        failed_attachments = report.failed;

        if let Some(section) = comments {
            text.push_str(&append_section(&path, &section).await?);
            paths.comments = Some(path.clone());
        }

        write_if_changed(&path, &text, &markdown::rewrite_attachment_urls(&text, &card.attachments))
            .await?;
    } else {
        let card_attachments = &mut card.attachments;
        let download = async {
            if has_uploads {
                let report = attachments::download_all(ctx, &target, card_attachments).await?;
                let table = markdown::attachments_table(&card_name, &report.rows);
                tokio::fs::write(&files.attachments, table).await?;
                Ok::<_, Error>(Some(report))
            } else {
                Ok(None)
            }
        };

        let (_, _, report, _) = tokio::try_join!(
            write_section(&files.description, Some(&description)),
            write_section(&files.checklists, checklists.as_deref()),
            download,
            write_section(&files.comments, comments.as_deref()),
        )?;

        paths.description = Some(files.description.clone());
        if checklists.is_some() {
            paths.checklists = Some(files.checklists.clone());
        }
        if comments.is_some() {
            paths.comments = Some(files.comments.clone());
        }
        failed_attachments = match report {
            Some(report) => {
                paths.attachments = Some(files.attachments.clone());
                report.failed
            }
            None => 0,
        };

        // attachment URLs can appear in both the description and the comments
        if has_uploads {
            write_if_changed(
                &files.description,
                &description,
                &markdown::rewrite_attachment_urls(&description, &card.attachments),
            )
            .await?;
            if let Some(comments) = &comments {
                write_if_changed(
                    &files.comments,
                    comments,
                    &markdown::rewrite_attachment_urls(comments, &card.attachments),
                )
                .await?;
            }
        }
    }

    card.paths = paths;
    Ok(CardOutcome {
        slot,
        card,
        failed_attachments,
    })
}

async fn write_section(path: &Path, text: Option<&str>) -> Result<()> {
    if let Some(text) = text {
        tokio::fs::write(path, text).await?;
    }
    Ok(())
}

/// Append a section to a single-file card, returning exactly what was appended
async fn append_section(path: &Path, section: &str) -> Result<String> {
    let appended = format!("\n\n{section}");
    let mut file = tokio::fs::OpenOptions::new().append(true).open(path).await?;
    file.write_all(appended.as_bytes()).await?;
    file.flush().await?;
    Ok(appended)
}

async fn write_if_changed(path: &Path, original: &str, rewritten: &str) -> Result<()> {
    if original != rewritten {
        tokio::fs::write(path, rewritten).await?;
    }
    Ok(())
}
