//! Remote shortcut source: fetch the per-domain JSON file.
//!
//! Missing data must never block the panel, so every transport problem and
//! every non-200 answer degrades to [`ShortcutsDocument::default`]. Only a 200
//! whose body is not a shortcut document is reported as an error.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use crate::domain::DomainKey;
use crate::shortcuts::ShortcutsDocument;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("malformed shortcuts document at {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where shortcut documents come from.
#[async_trait]
pub trait ShortcutSource: Send + Sync {
    /// Resolves exactly once. `Err` only for a malformed body.
    async fn fetch(&self, key: &DomainKey) -> Result<ShortcutsDocument, FetchError>;
}

/// Fetches documents over HTTP; the [`DomainKey`] is the request URL.
#[derive(Debug, Clone)]
pub struct HttpShortcutSource {
    client: reqwest::Client,
}

impl HttpShortcutSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    /// Use an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ShortcutSource for HttpShortcutSource {
    async fn fetch(&self, key: &DomainKey) -> Result<ShortcutsDocument, FetchError> {
        let response = match self.client.get(key.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(key = %key, "shortcut fetch failed: {e}");
                return Ok(ShortcutsDocument::default());
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(key = %key, "shortcut source returned HTTP {status}");
            return Ok(ShortcutsDocument::default());
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(key = %key, "failed to read shortcut response body: {e}");
                return Ok(ShortcutsDocument::default());
            }
        };

        parse_document(key, &body)
    }
}

fn parse_document(key: &DomainKey, body: &str) -> Result<ShortcutsDocument, FetchError> {
    serde_json::from_str(body).map_err(|source| FetchError::Malformed {
        key: key.to_string(),
        source,
    })
}
