//! # t2md
//!
//! Backs up Trello boards into a tree of Markdown files.
//!
//! ## Design Philosophy
//!
//! t2md is designed to be:
//! - **Stable across reruns** - lists and cards are numbered in position order and duplicate
//!   names get deterministic suffixes, so the same board always produces the same tree
//! - **Linked** - card URLs inside descriptions, checklists and comments become relative
//!   links to the exported files, across boards
//! - **Library-first** - the export is a plain async API; the demo program is a thin wrapper
//! - **Event-driven** - consumers subscribe to progress events instead of parsing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use t2md::{Config, Credentials, Exporter};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         output_dir: "backups".into(),
//!         credentials: Credentials::from_file(Path::new("credentials.json"))?,
//!         ..Default::default()
//!     };
//!
//!     let exporter = Exporter::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = exporter.run().await?;
//!     println!("exported {} cards", summary.cards);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote API client
pub mod client;
/// Configuration types
pub mod config;
/// Duplicate-name disambiguation
pub mod disambiguation;
/// Emoji replacement for file names
pub mod emoji;
/// Error types
pub mod error;
/// Export pipeline (decomposed into focused submodules)
pub mod exporter;
/// Card reference scanning and link rewriting
pub mod links;
/// File and folder naming
pub mod naming;
/// Sliding-window request rate limiting
pub mod rate_limiter;
/// Retry logic for filesystem contention
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::TrelloClient;
pub use config::{ApiConfig, BoardSelection, Config, Credentials, ExportConfig, RetryConfig};
pub use error::{Error, Result};
pub use exporter::Exporter;
pub use rate_limiter::RateLimiter;
pub use types::{
    Action, Attachment, Board, BoardSummary, Card, CheckItem, CheckState, Checklist, Event,
    ExportSummary, List,
};

/// Run an export, cancelling it cleanly on a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use t2md::{Config, Exporter, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let exporter = Exporter::new(Config::default())?;
///     let summary = run_with_shutdown(&exporter).await?;
///     println!("{summary:?}");
///     Ok(())
/// }
/// ```
///
/// # Errors
/// Returns [`Error::Cancelled`] if a signal arrived first, otherwise the run's own result.
pub async fn run_with_shutdown(exporter: &Exporter) -> Result<ExportSummary> {
    let cancel = exporter.cancellation_token();
    tokio::select! {
        result = exporter.run() => result,
        _ = wait_for_signal() => {
            cancel.cancel();
            Err(Error::Cancelled)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, cancelling export");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT, cancelling export");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT, cancelling export");
            } else if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM, cancelling export");
            } else if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C, cancelling export");
        }
        Err(e) => {
            // never resolve, so the export runs to completion
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
