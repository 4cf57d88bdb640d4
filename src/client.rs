//! Authenticated, rate-limited access to the Trello API
//!
//! Every request goes through the shared [`RateLimiter`] first and carries the credential
//! pair in an `Authorization` header. A non-success status is returned as
//! [`Error::Http`]; nothing is retried here.

use crate::config::{ApiConfig, Credentials};
use crate::error::{Error, Result};
use crate::rate_limiter::RateLimiter;
use crate::types::{Action, BoardSummary};
use reqwest::header::AUTHORIZATION;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Page size of the comment feed
pub const COMMENT_PAGE_SIZE: usize = 1000;

/// HTTP client for the Trello API and web site
#[derive(Clone)]
pub struct TrelloClient {
    http: reqwest::Client,
    authorization: String,
    api_base_url: String,
    site_base_url: String,
    limiter: RateLimiter,
}

impl TrelloClient {
    /// Create a client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(credentials: &Credentials, api: &ApiConfig, limiter: RateLimiter) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .user_agent(concat!("t2md/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            authorization: credentials.authorization_header(),
            api_base_url: api.api_base_url.trim_end_matches('/').to_string(),
            site_base_url: api.site_base_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// The rate limiter shared by this client's requests
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Issue one authenticated GET and check its status
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.limiter.acquire().await;
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// List the boards the authenticated member can see
    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>> {
        let url = format!("{}/members/me/boards", self.api_base_url);
        let boards: Vec<BoardSummary> = self
            .get(&url, &[("fields", "id,name,shortLink")])
            .await?
            .json()
            .await?;

        for board in &boards {
            board.validate()?;
        }
        Ok(boards)
    }

    /// Download a board's full backup document, exactly as received
    ///
    /// Parsing is left to [`Board::from_backup`](crate::types::Board::from_backup) so the
    /// payload can be archived even when it turns out to be malformed.
    pub async fn fetch_board_backup(&self, short_link: &str) -> Result<Vec<u8>> {
        let url = format!("{}/b/{}.json", self.site_base_url, short_link);
        Ok(self.get(&url, &[]).await?.bytes().await?.to_vec())
    }

    /// Fetch every comment on a board, newest first
    ///
    /// The backup document only carries recent actions, so the full history is paged from
    /// the actions feed: each page asks for items older than the oldest one already seen,
    /// until a page comes back empty.
    pub async fn fetch_board_comments(&self, short_link: &str) -> Result<Vec<Action>> {
        let url = format!("{}/boards/{}/actions", self.api_base_url, short_link);
        let limit = COMMENT_PAGE_SIZE.to_string();
        let mut comments: Vec<Action> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let mut query = vec![("filter", "commentCard"), ("limit", limit.as_str())];
            if let Some(date) = before.as_deref() {
                query.push(("before", date));
            }

            let page: Vec<Action> = self.get(&url, &query).await?.json().await?;
            let Some(oldest) = page.last() else {
                break;
            };
            debug!(board = %short_link, count = page.len(), "fetched comment page");

            before = Some(oldest.date.clone());
            comments.extend(page.into_iter().filter(Action::is_comment));
        }

        Ok(comments)
    }

    /// Stream a file to `path`
    pub async fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.get(url, &[]).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url = %url, path = %path.display(), bytes = written, "downloaded");
        Ok(written)
    }
}
