//! Back up every board to a folder
//!
//! This example demonstrates the core functionality of t2md:
//! - Loading credentials from a JSON file
//! - Loading optional export settings from a JSON config file
//! - Subscribing to progress events
//! - Running an export that stops cleanly on Ctrl+C
//!
//! ```bash
//! cargo run --example backup -- <output-dir> [credentials.json] [config.json]
//! ```
//!
//! The credentials file looks like `{"ApiKey": "...", "ApiToken": "..."}`. Log verbosity is
//! controlled with `RUST_LOG` (e.g. `RUST_LOG=t2md=debug`).

use std::path::{Path, PathBuf};
use t2md::{Config, Credentials, Event, Exporter, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("t2md=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(output_dir) = args.next().map(PathBuf::from) else {
        eprintln!("usage: backup <output-dir> [credentials.json] [config.json]");
        std::process::exit(2);
    };
    let credentials_path = args.next().unwrap_or_else(|| "t2md.json".to_string());

    // export, board and API settings come from the optional config file
    let mut config = match args.next() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&content)?
        }
        None => Config::default(),
    };
    config.output_dir = output_dir;
    config.credentials = Credentials::from_file(Path::new(&credentials_path))?;

    let exporter = Exporter::new(config)?;
    println!("Exporting to {}", exporter.export_root().display());

    let mut events = exporter.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::BoardStarted { board } => println!("→ {board}"),
                Event::BoardFinished { board, cards } => {
                    println!("✓ {board} ({cards} cards)");
                }
                Event::BoardFailed { board, error } => println!("✗ {board}: {error}"),
                Event::AttachmentFailed {
                    card, attachment, ..
                } => {
                    println!("  ! attachment {attachment} on {card} not downloaded");
                }
                Event::LinksRewritten { .. } => {}
                Event::ExportComplete { boards, cards } => {
                    println!("Done: {boards} boards, {cards} cards");
                }
            }
        }
    });

    let summary = run_with_shutdown(&exporter).await?;
    if summary.failed_attachments > 0 {
        println!(
            "{} attachments could not be downloaded",
            summary.failed_attachments
        );
    }
    println!("{} files had card links rewritten", summary.files_relinked);

    Ok(())
}
