//! Google Drive implementation of [`DocumentSource`].
//!
//! Metadata comes from `GET /files/{id}` with an explicit field list;
//! content comes from the plain-text export endpoint, which covers Google
//! Docs. The client holds a ready-to-use bearer token — acquiring and
//! refreshing it is outside this process.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::DriveConfig;
use crate::models::DocumentMetadata;
use crate::source::DocumentSource;

pub struct DriveSource {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    modified_time: String,
    web_view_link: Option<String>,
}

impl DriveSource {
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build Drive HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Build a client from config, reading the bearer token from the
    /// configured environment variable.
    pub fn from_config(config: &DriveConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            anyhow!(
                "{} is not set; a Drive access token is required",
                config.token_env
            )
        })?;
        Self::new(config.api_base.clone(), token)
    }
}

#[async_trait]
impl DocumentSource for DriveSource {
    fn name(&self) -> &str {
        "Google Drive"
    }

    async fn metadata(&self, document_id: &str) -> Result<DocumentMetadata> {
        let url = format!("{}/files/{}", self.api_base, document_id);
        let file: DriveFile = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id, name, modifiedTime, webViewLink")])
            .send()
            .await
            .with_context(|| format!("metadata request for {} failed", document_id))?
            .error_for_status()
            .with_context(|| format!("metadata request for {} was rejected", document_id))?
            .json()
            .await
            .with_context(|| format!("metadata for {} was not valid JSON", document_id))?;

        Ok(DocumentMetadata {
            id: file.id,
            name: file.name,
            modified_time: file.modified_time,
            access_link: file.web_view_link,
        })
    }

    async fn content(&self, document_id: &str) -> Result<String> {
        let url = format!("{}/files/{}/export", self.api_base, document_id);
        let body = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("mimeType", "text/plain")])
            .send()
            .await
            .with_context(|| format!("export request for {} failed", document_id))?
            .error_for_status()
            .with_context(|| format!("export request for {} was rejected", document_id))?
            .text()
            .await
            .with_context(|| format!("export body for {} was not readable", document_id))?;
        Ok(body)
    }
}

/// Extract the file id from a Drive URL.
///
/// Handles the common shapes:
/// `https://docs.google.com/document/d/FILE_ID/edit`,
/// `https://drive.google.com/file/d/FILE_ID/view`, and
/// `https://drive.google.com/open?id=FILE_ID`. Returns `None` when no
/// pattern matches.
pub fn extract_file_id(url: &str) -> Option<String> {
    for pattern in ["/file/d/", "/d/", "id="] {
        if let Some(start) = url.find(pattern) {
            let start = start + pattern.len();
            let rest = &url[start..];
            let end = rest
                .find('/')
                .or_else(|| rest.find('?'))
                .unwrap_or(rest.len());
            let file_id = rest[..end].trim_matches('/');
            if !file_id.is_empty() {
                return Some(file_id.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_docs_url() {
        let url = "https://docs.google.com/document/d/1ABC123xyz/edit";
        assert_eq!(extract_file_id(url).as_deref(), Some("1ABC123xyz"));
    }

    #[test]
    fn extracts_from_file_url() {
        let url = "https://drive.google.com/file/d/1XYZ789abc/view";
        assert_eq!(extract_file_id(url).as_deref(), Some("1XYZ789abc"));
    }

    #[test]
    fn extracts_from_query_param() {
        let url = "https://drive.google.com/open?id=1DEF456uvw";
        assert_eq!(extract_file_id(url).as_deref(), Some("1DEF456uvw"));
    }

    #[test]
    fn unrelated_url_yields_none() {
        assert_eq!(extract_file_id("https://example.com/invalid"), None);
    }

    #[test]
    fn bare_id_yields_none() {
        // Bare ids don't match any URL pattern; callers pass them through
        // unchanged instead of extracting.
        assert_eq!(extract_file_id("1ABC123xyz"), None);
    }
}
