//! Test configuration helpers for mock servers and .env credentials

use std::path::Path;
use t2md::{ApiConfig, Config, Credentials, ExportConfig};
use wiremock::MockServer;

/// Config pointing both API roots at a mock server, writing under `dir`
pub fn mock_config(server: &MockServer, dir: &Path, export: ExportConfig) -> Config {
    Config {
        output_dir: dir.to_path_buf(),
        credentials: Credentials::new("test-key", "test-token"),
        api: ApiConfig {
            api_base_url: format!("{}/1", server.uri()),
            site_base_url: server.uri(),
            rate_limit: 1000,
            ..Default::default()
        },
        export,
        boards: Default::default(),
    }
}

/// Load Trello credentials from the environment
///
/// Required environment variables:
/// - `TRELLO_API_KEY` - API key
/// - `TRELLO_API_TOKEN` - API token
pub fn load_credentials() -> Option<Credentials> {
    dotenvy::dotenv().ok();

    let key = std::env::var("TRELLO_API_KEY").ok()?;
    let token = std::env::var("TRELLO_API_TOKEN").ok()?;
    let credentials = Credentials::new(key, token);
    credentials.validate().ok()?;
    Some(credentials)
}

/// Check if live credentials are available
pub fn has_live_credentials() -> bool {
    load_credentials().is_some()
}

/// Config for the real API, limited to the boards named in `TRELLO_TEST_BOARDS`
/// (comma separated) when that variable is set
pub fn live_config(dir: &Path) -> Option<Config> {
    let credentials = load_credentials()?;
    let mut config = Config {
        output_dir: dir.to_path_buf(),
        credentials,
        ..Default::default()
    };
    if let Ok(boards) = std::env::var("TRELLO_TEST_BOARDS") {
        config.boards.include = boards
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();
    }
    Some(config)
}
