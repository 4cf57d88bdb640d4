//! Configuration types for t2md

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the folder created under [`Config::output_dir`]. It is deleted and recreated
/// on every run, so the user's own folder is never cleared.
pub const EXPORT_FOLDER_NAME: &str = "t2md";

/// Placeholder values written into a fresh credentials template
const TEMPLATE_API_KEY: &str = "key";
const TEMPLATE_API_TOKEN: &str = "token";

/// Main configuration for an export run
///
/// Fields are grouped into sub-configs:
/// - [`api`](ApiConfig): endpoints, rate limit and timeouts
/// - [`export`](ExportConfig): file naming and output layout
/// - [`boards`](BoardSelection): which boards are exported and linked
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Folder the `t2md` export folder is created in
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// API key and token
    #[serde(default)]
    pub credentials: Credentials,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Output naming and layout
    #[serde(default)]
    pub export: ExportConfig,

    /// Board selection
    #[serde(default)]
    pub boards: BoardSelection,
}

impl Config {
    /// The folder the export tree is written to
    pub fn export_root(&self) -> PathBuf {
        self.output_dir.join(EXPORT_FOLDER_NAME)
    }

    /// Check the configuration before any network or filesystem work starts
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;

        for (key, value) in [
            ("api.api_base_url", &self.api.api_base_url),
            ("api.site_base_url", &self.api.site_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL {value:?}: {e}"), key))?;
        }

        if self.export.max_card_filename_title_length == 0 {
            return Err(Error::config(
                "card filename title length must be at least 1",
                "export.max_card_filename_title_length",
            ));
        }

        Ok(())
    }
}

/// Trello API credentials
///
/// Read from a JSON file shaped `{"ApiKey": "...", "ApiToken": "..."}`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// API key from trello.com/app-key
    #[serde(rename = "ApiKey", default)]
    pub api_key: String,

    /// Token authorised for the key
    #[serde(rename = "ApiToken", default)]
    pub api_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Create credentials from a key and token
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_token: api_token.into(),
        }
    }

    /// Load credentials from a JSON file and validate them
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("can't read credentials file {}: {e}", path.display()),
                "credentials",
            )
        })?;
        let credentials: Credentials = serde_json::from_str(&content).map_err(|e| {
            Error::config(
                format!("can't parse credentials file {}: {e}", path.display()),
                "credentials",
            )
        })?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Reject empty values and the unedited template placeholders
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() || self.api_token.is_empty() {
            return Err(Error::config(
                "ApiKey and ApiToken must both be set",
                "credentials",
            ));
        }
        if self.api_key == TEMPLATE_API_KEY || self.api_token == TEMPLATE_API_TOKEN {
            return Err(Error::config(
                "ApiKey and ApiToken still contain the template placeholders",
                "credentials",
            ));
        }
        Ok(())
    }

    /// Value for the `Authorization` header sent with every request
    pub fn authorization_header(&self) -> String {
        format!(
            "OAuth oauth_consumer_key=\"{}\", oauth_token=\"{}\"",
            self.api_key, self.api_token
        )
    }
}

/// Remote API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST API root (default: "https://api.trello.com/1")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Web site root used for board backups and card links (default: "https://trello.com")
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,

    /// Maximum requests per rolling second (default: 10, values below 1 become 1)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Timeout for a single request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            site_base_url: default_site_base_url(),
            rate_limit: default_rate_limit(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Output naming and layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum number of characters of a card title used in its filenames (default: 40)
    ///
    /// The full title is always written inside the description file.
    #[serde(default = "default_max_title_length")]
    pub max_card_filename_title_length: usize,

    /// Replace emoji in file and folder names with `_`
    #[serde(default)]
    pub remove_emoji: bool,

    /// Use `/` in generated links regardless of platform (Obsidian doesn't accept `\`)
    #[serde(default)]
    pub always_use_forward_slashes: bool,

    /// Write description, checklists, attachments and comments into one file per card
    #[serde(default)]
    pub single_file: bool,

    /// Prefix list and card names with their position index (default: true)
    ///
    /// When disabled, colliding names get a disambiguation suffix instead.
    #[serde(default = "default_true")]
    pub numbering: bool,

    /// Log failed attachment downloads as warnings instead of failing the run
    #[serde(default)]
    pub ignore_failed_attachment_downloads: bool,

    /// Keep the raw `<board>.json` backups next to the Markdown tree (default: true)
    #[serde(default = "default_true")]
    pub keep_raw_backups: bool,

    /// Treat archived and non-archived entities as separate naming scopes (default: true)
    #[serde(default = "default_true")]
    pub scope_duplicates_by_archived: bool,

    /// Maximum boards processed at once (default: 8)
    #[serde(default = "default_max_concurrent_boards")]
    pub max_concurrent_boards: usize,

    /// Maximum cards processed at once within a board (default: 32)
    #[serde(default = "default_max_concurrent_cards")]
    pub max_concurrent_cards: usize,

    /// Retry policy for deleting the previous export tree
    #[serde(default)]
    pub delete_retry: RetryConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_card_filename_title_length: default_max_title_length(),
            remove_emoji: false,
            always_use_forward_slashes: false,
            single_file: false,
            numbering: true,
            ignore_failed_attachment_downloads: false,
            keep_raw_backups: true,
            scope_duplicates_by_archived: true,
            max_concurrent_boards: default_max_concurrent_boards(),
            max_concurrent_cards: default_max_concurrent_cards(),
            delete_retry: RetryConfig::default(),
        }
    }
}

/// Which boards are exported, and which are left out of link rewriting
///
/// Entries match a board's name or short link, ignoring case.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BoardSelection {
    /// Boards to export (empty = all)
    #[serde(default)]
    pub include: Vec<String>,

    /// Boards never exported
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Boards whose cards are never turned into local links
    #[serde(default)]
    pub exclude_from_links: Vec<String>,
}

impl BoardSelection {
    /// Whether a board with this name and short link should be exported
    pub fn is_selected(&self, name: &str, short_link: &str) -> bool {
        let included =
            self.include.is_empty() || matches_any(&self.include, name, short_link);
        included && !matches_any(&self.exclude, name, short_link)
    }

    /// Whether links to cards on this board should stay remote
    pub fn is_link_excluded(&self, name: &str, short_link: &str) -> bool {
        matches_any(&self.exclude_from_links, name, short_link)
    }
}

fn matches_any(patterns: &[String], name: &str, short_link: &str) -> bool {
    patterns
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name) || p.eq_ignore_ascii_case(short_link))
}

/// Retry configuration for local filesystem contention
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 100 milliseconds)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, a fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_api_base_url() -> String {
    "https://api.trello.com/1".to_string()
}

fn default_site_base_url() -> String {
    "https://trello.com".to_string()
}

fn default_rate_limit() -> u32 {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_title_length() -> usize {
    40
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_boards() -> usize {
    8
}

fn default_max_concurrent_cards() -> usize {
    32
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
