//! Error types for t2md
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised inside a card
//! or board task are wrapped with the card/board they came from so a failed run reports
//! exactly where it stopped.

use thiserror::Error;

/// Result type alias for t2md operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for t2md
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "credentials.api_key")
        key: Option<String>,
    },

    /// The remote API answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// The response status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed JSON or a value that could not be decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A board payload was structurally invalid
    #[error("invalid board {board}: {reason}")]
    InvalidBoard {
        /// Board name or short link
        board: String,
        /// What was missing or inconsistent
        reason: String,
    },

    /// An attachment could not be downloaded
    #[error("failed to download attachment {name} from {url}: {source}")]
    Attachment {
        /// The attachment's original file name
        name: String,
        /// The attachment's source URL
        url: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A card task failed
    #[error("card {card:?} on board {board:?} failed: {source}")]
    Card {
        /// Owning board name
        board: String,
        /// Card name
        card: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A board task failed
    #[error("board {board:?} failed: {source}")]
    Board {
        /// Board name
        board: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// One or more boards failed during phase 1, so links were not rewritten
    #[error("{failed} of {total} boards failed to export")]
    ExportFailed {
        /// Number of failed boards
        failed: usize,
        /// Number of boards attempted
        total: usize,
    },

    /// A spawned task panicked or was aborted
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The run was cancelled
    #[error("export cancelled")]
    Cancelled,
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Build an invalid-board error
    pub fn invalid_board(board: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidBoard {
            board: board.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error code, used in events and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Http { .. } => "http_status",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::InvalidBoard { .. } => "invalid_board",
            Error::Attachment { .. } => "attachment_failed",
            Error::Card { source, .. } | Error::Board { source, .. } => source.error_code(),
            Error::ExportFailed { .. } => "export_failed",
            Error::TaskFailed(_) => "task_failed",
            Error::Cancelled => "cancelled",
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::TaskFailed(e.to_string())
        }
    }
}
