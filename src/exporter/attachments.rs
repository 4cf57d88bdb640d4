//! Attachment downloads for one card

use super::ExportContext;
use super::markdown::AttachmentRow;
use crate::error::{Error, Result};
use crate::types::{Attachment, Event};
use crate::utils::relative_link;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where a card's attachments go, and who they belong to (for logs and events)
pub(crate) struct AttachmentTarget<'a> {
    /// Folder holding the card's Markdown files; links are relative to it
    pub(crate) card_dir: &'a Path,
    pub(crate) attachments_dir: &'a Path,
    pub(crate) board: &'a str,
    pub(crate) card: &'a str,
}

/// Result of downloading a card's attachments
#[derive(Debug, Default)]
pub(crate) struct DownloadReport {
    /// Table rows in attachment order
    pub(crate) rows: Vec<AttachmentRow>,
    /// Failures that were tolerated
    pub(crate) failed: usize,
}

/// Local file name for an attachment: its id plus the original extension
pub(crate) fn local_file_name(attachment: &Attachment) -> String {
    match Path::new(&attachment.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!("{}.{ext}", attachment.id),
        None => attachment.id.clone(),
    }
}

/// Download every uploaded attachment concurrently
///
/// Successful downloads get their `local_path` set. A failed download either fails the
/// card or, with `ignore_failed_attachment_downloads`, becomes a failed row.
pub(crate) async fn download_all(
    ctx: &ExportContext,
    target: &AttachmentTarget<'_>,
    attachments: &mut [Attachment],
) -> Result<DownloadReport> {
    tokio::fs::create_dir_all(target.attachments_dir).await?;

    let downloads = attachments
        .iter_mut()
        .filter(|attachment| attachment.is_upload)
        .map(|attachment| download_one(ctx, target, attachment));
    let rows = try_join_all(downloads).await?;

    let failed = rows
        .iter()
        .filter(|row| matches!(row, AttachmentRow::Failed { .. }))
        .count();
    Ok(DownloadReport { rows, failed })
}

async fn download_one(
    ctx: &ExportContext,
    target: &AttachmentTarget<'_>,
    attachment: &mut Attachment,
) -> Result<AttachmentRow> {
    let path: PathBuf = target.attachments_dir.join(local_file_name(attachment));

    match ctx.client.download_to(&attachment.url, &path).await {
        Ok(_) => {
            let link = relative_link(
                target.card_dir,
                &path,
                ctx.export().always_use_forward_slashes,
            );
            attachment.local_path = Some(link.encoded.clone());
            Ok(AttachmentRow::Downloaded {
                id: attachment.id.clone(),
                file_name: attachment.file_name.clone(),
                link,
            })
        }
        Err(e) if ctx.export().ignore_failed_attachment_downloads => {
            warn!(
                board = %target.board,
                card = %target.card,
                attachment = %attachment.name,
                url = %attachment.url,
                error = %e,
                "attachment download failed, continuing"
            );
            // a partial file is worse than none
            tokio::fs::remove_file(&path).await.ok();
            ctx.emit_event(Event::AttachmentFailed {
                board: target.board.to_string(),
                card: target.card.to_string(),
                attachment: attachment.name.clone(),
                url: attachment.url.clone(),
                error: e.to_string(),
            });
            Ok(AttachmentRow::Failed {
                id: attachment.id.clone(),
                file_name: attachment.file_name.clone(),
            })
        }
        Err(e) => Err(Error::Attachment {
            name: attachment.name.clone(),
            url: attachment.url.clone(),
            source: Box::new(e),
        }),
    }
}
