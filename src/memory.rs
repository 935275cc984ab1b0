//! The memory-backend seam and its hosted REST implementation.
//!
//! The backend owns assistants, ingests uploaded documents into each
//! assistant's memory, and answers threaded messages with that memory
//! attached. API keys are tenant-scoped, so every call takes the caller's
//! key; the client instance holds only the base URL and connection pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::models::{IndexState, IndexStatus};

/// A tenant-isolated AI memory service.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Create an assistant and return its id. Called once per tenant, at
    /// onboarding.
    async fn create_assistant(&self, api_key: &str, name: &str, description: &str)
        -> Result<String>;

    /// Upload a text artifact into an assistant's memory. Returns the
    /// artifact id used for status polling.
    async fn upload_document(
        &self,
        api_key: &str,
        assistant_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String>;

    /// Report the indexing status of a previously uploaded artifact.
    async fn index_status(&self, api_key: &str, artifact_id: &str) -> Result<IndexStatus>;

    /// Send one message to an assistant on a fresh thread and return the
    /// reply text.
    async fn send_message(&self, api_key: &str, assistant_id: &str, content: &str)
        -> Result<String>;
}

/// REST client for the hosted memory backend.
pub struct MemoryClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AssistantResponse {
    assistant_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    document_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: IndexState,
    #[serde(default)]
    status_message: Option<String>,
}

#[derive(Deserialize)]
struct ThreadResponse {
    thread_id: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: String,
}

impl MemoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build memory-backend HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MemoryBackend for MemoryClient {
    async fn create_assistant(
        &self,
        api_key: &str,
        name: &str,
        description: &str,
    ) -> Result<String> {
        let response: AssistantResponse = self
            .http
            .post(self.url("/assistants"))
            .bearer_auth(api_key)
            .json(&json!({ "name": name, "description": description }))
            .send()
            .await
            .context("assistant creation request failed")?
            .error_for_status()
            .context("assistant creation was rejected")?
            .json()
            .await
            .context("assistant creation response was not valid JSON")?;
        Ok(response.assistant_id)
    }

    async fn upload_document(
        &self,
        api_key: &str,
        assistant_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let response: UploadResponse = self
            .http
            .post(self.url(&format!("/assistants/{}/documents", assistant_id)))
            .bearer_auth(api_key)
            .json(&json!({ "title": title, "content": body }))
            .send()
            .await
            .context("document upload request failed")?
            .error_for_status()
            .context("document upload was rejected")?
            .json()
            .await
            .context("document upload response was not valid JSON")?;
        Ok(response.document_id)
    }

    async fn index_status(&self, api_key: &str, artifact_id: &str) -> Result<IndexStatus> {
        let response: StatusResponse = self
            .http
            .get(self.url(&format!("/documents/{}/status", artifact_id)))
            .bearer_auth(api_key)
            .send()
            .await
            .context("index-status request failed")?
            .error_for_status()
            .context("index-status request was rejected")?
            .json()
            .await
            .context("index-status response was not valid JSON")?;
        Ok(IndexStatus {
            state: response.status,
            message: response.status_message,
        })
    }

    async fn send_message(
        &self,
        api_key: &str,
        assistant_id: &str,
        content: &str,
    ) -> Result<String> {
        // One thread per message keeps the relay stateless; the backend's
        // memory carries continuity across threads.
        let thread: ThreadResponse = self
            .http
            .post(self.url(&format!("/assistants/{}/threads", assistant_id)))
            .bearer_auth(api_key)
            .send()
            .await
            .context("thread creation request failed")?
            .error_for_status()
            .context("thread creation was rejected")?
            .json()
            .await
            .context("thread creation response was not valid JSON")?;

        let message: MessageResponse = self
            .http
            .post(self.url(&format!("/threads/{}/messages", thread.thread_id)))
            .bearer_auth(api_key)
            .json(&json!({ "content": content, "memory": "auto" }))
            .send()
            .await
            .context("message request failed")?
            .error_for_status()
            .context("message was rejected")?
            .json()
            .await
            .context("message response was not valid JSON")?;
        Ok(message.content)
    }
}
