//! Core data models used throughout Context Relay.
//!
//! These types represent the tenants, monitored documents, and sync results
//! that flow through the ingestion and polling pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One monitored external document, as stored in the registry.
///
/// `fingerprint` is empty exactly when the document is registered but has
/// never completed a sync. `content` holds the last successfully ingested
/// text and is never re-hashed on read.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DocumentRecord {
    pub document_id: String,
    pub tenant_id: String,
    pub display_name: String,
    pub fingerprint: String,
    pub last_modified: String,
    pub content: String,
    pub updated_at: i64,
}

/// One tenant's credential row: an encrypted memory-backend API key and the
/// tenant's single assistant on that backend.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TenantRecord {
    pub tenant_id: String,
    pub encrypted_credential: String,
    pub assistant_id: String,
    pub created_at: i64,
}

/// Source-reported metadata for a document, fetched without its content.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub id: String,
    pub name: String,
    pub modified_time: String,
    pub access_link: Option<String>,
}

/// Indexing states reported by the memory backend for an uploaded artifact.
/// `Indexed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Pending,
    Indexed,
    Failed,
}

/// Indexing status of one uploaded artifact.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub state: IndexState,
    pub message: Option<String>,
}

/// Outcome of syncing a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// First successful ingestion of a registered document.
    Created,
    /// Content changed and the new version was ingested.
    Updated,
    /// Stored fingerprint matches the live content. No external calls made.
    Unchanged,
}

/// Outcome of registering a document for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered { display_name: String },
    AlreadyRegistered,
}

/// One running polling loop: a snapshot of document ids taken when the loop
/// starts, plus the fixed cycle interval. Documents registered later are not
/// picked up by an existing session.
#[derive(Debug, Clone)]
pub struct PollSession {
    pub tenant_id: String,
    pub document_ids: Vec<String>,
    pub interval: Duration,
}

/// A chat message relayed from a group-chat producer (e.g. the Telegram bot).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub chat_id: String,
    pub channel_name: String,
    pub sender: String,
    pub body: String,
}
