//! Shared test helpers for building export contexts against a mock server.

use super::ExportContext;
use crate::client::TrelloClient;
use crate::config::{ApiConfig, Config, Credentials, ExportConfig};
use crate::rate_limiter::RateLimiter;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

/// Config pointing both base URLs at the mock server and the output at `dir`
pub(crate) fn test_config(server: &MockServer, dir: &Path, export: ExportConfig) -> Config {
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

/// A context for calling board and card exports directly
///
/// The export root is created; events go to a channel nobody listens on unless the
/// caller subscribes through `event_tx`.
pub(crate) fn context(server: &MockServer, dir: &Path, export: ExportConfig) -> Arc<ExportContext> {
    let config = test_config(server, dir, export);
    let client = TrelloClient::new(
        &config.credentials,
        &config.api,
        RateLimiter::new(config.api.rate_limit),
    )
    .unwrap();
    let root = config.export_root();
    std::fs::create_dir_all(&root).unwrap();
    let (event_tx, _rx) = tokio::sync::broadcast::channel(100);

    Arc::new(ExportContext {
        client,
        config: Arc::new(config),
        root,
        event_tx,
        cancel: CancellationToken::new(),
    })
}
