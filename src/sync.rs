//! The document sync core.
//!
//! [`SyncEngine::sync_document`] brings one registry row into agreement
//! with its live source state: fetch metadata and content, fingerprint,
//! compare, and — only on a difference — upload to the memory backend,
//! wait for indexing to confirm, then persist. The registry write is the
//! last step; every failure before it leaves the row untouched, so the
//! next cycle retries from scratch.
//!
//! Registration lives here too: it validates reachability and creates the
//! empty-fingerprint row, deferring all expensive work to the first sync.

use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::encryption;
use crate::events::{EventBus, EventSource};
use crate::fingerprint::fingerprint;
use crate::memory::MemoryBackend;
use crate::models::{DocumentMetadata, IndexState, RegisterOutcome, SyncOutcome};
use crate::registry;
use crate::source::DocumentSource;

/// Every distinct way a sync or registration can abort. Callers (the HTTP
/// layer, the poller, tests) match on these rather than parsing messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("document {document_id} is inaccessible: {reason}")]
    Inaccessible { document_id: String, reason: String },

    #[error("document {document_id} is unreadable: {reason}")]
    Unreadable { document_id: String, reason: String },

    #[error("document {0} is not registered")]
    NotRegistered(String),

    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("credential for tenant {tenant_id} is unusable: {reason}")]
    MissingCredential { tenant_id: String, reason: String },

    #[error("tenant {0} has no assistant")]
    MissingAssistant(String),

    #[error("upload rejected by the memory backend: {0}")]
    UploadRejected(String),

    #[error("indexing failed: {0}")]
    IndexingFailed(String),

    #[error("indexing did not reach a terminal state within {0:?}")]
    IndexingTimedOut(Duration),

    #[error("a sync for document {0} is already in flight")]
    InFlight(String),

    #[error(transparent)]
    Registry(#[from] anyhow::Error),
}

/// Resolve a tenant's decrypted API key and assistant id, or the
/// configuration error explaining why the tenant cannot reach the backend.
pub async fn resolve_tenant(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<(String, String), SyncError> {
    let tenant = registry::lookup_tenant(pool, tenant_id)
        .await?
        .ok_or_else(|| SyncError::TenantNotFound(tenant_id.to_string()))?;

    let api_key = encryption::decrypt_credential(&tenant.encrypted_credential).map_err(|e| {
        SyncError::MissingCredential {
            tenant_id: tenant_id.to_string(),
            reason: e.to_string(),
        }
    })?;

    if tenant.assistant_id.is_empty() {
        return Err(SyncError::MissingAssistant(tenant_id.to_string()));
    }

    Ok((api_key, tenant.assistant_id))
}

pub struct SyncEngine {
    pool: SqlitePool,
    source: Arc<dyn DocumentSource>,
    backend: Arc<dyn MemoryBackend>,
    events: EventBus,
    index_wait: Duration,
    index_poll: Duration,
    in_flight: Mutex<HashSet<(String, String)>>,
}

/// Removes its `(tenant, document)` key from the in-flight set on drop, so
/// every sync exit path releases the guard.
struct FlightPermit<'a> {
    set: &'a Mutex<HashSet<(String, String)>>,
    key: (String, String),
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.set.lock().expect("in-flight set poisoned").remove(&self.key);
    }
}

impl SyncEngine {
    pub fn new(
        pool: SqlitePool,
        source: Arc<dyn DocumentSource>,
        backend: Arc<dyn MemoryBackend>,
        events: EventBus,
        index_wait: Duration,
        index_poll: Duration,
    ) -> Self {
        Self {
            pool,
            source,
            backend,
            events,
            index_wait,
            index_poll,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Register a document for monitoring. Metadata-only: confirms the
    /// tenant exists and the document is reachable, then creates the row
    /// with an empty fingerprint. Never fetches content, never uploads.
    /// Re-registering an existing document is a reported no-op.
    pub async fn register_document(
        &self,
        document_id: &str,
        tenant_id: &str,
    ) -> Result<RegisterOutcome, SyncError> {
        if registry::lookup_tenant(&self.pool, tenant_id).await?.is_none() {
            return Err(SyncError::TenantNotFound(tenant_id.to_string()));
        }

        let metadata = self.source.metadata(document_id).await.map_err(|e| {
            SyncError::Inaccessible {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        if registry::lookup_document(&self.pool, document_id).await?.is_some() {
            debug!(document_id, "document already registered");
            return Ok(RegisterOutcome::AlreadyRegistered);
        }

        registry::insert_document(
            &self.pool,
            document_id,
            tenant_id,
            &metadata.name,
            &metadata.modified_time,
        )
        .await?;

        info!(document_id, name = %metadata.name, "registered document for monitoring");
        Ok(RegisterOutcome::Registered {
            display_name: metadata.name,
        })
    }

    /// Sync one document. See the module docs for the full contract; in
    /// short: unchanged content is a no-op with zero external calls, and
    /// the registry is only written after the backend confirms `indexed`.
    pub async fn sync_document(
        &self,
        document_id: &str,
        tenant_id: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let _permit = self.begin_flight(tenant_id, document_id)?;

        let metadata = self.source.metadata(document_id).await.map_err(|e| {
            SyncError::Inaccessible {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let content = self.source.content(document_id).await.map_err(|e| {
            SyncError::Unreadable {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let digest = fingerprint(&content);

        let record = registry::lookup_document(&self.pool, document_id)
            .await?
            .ok_or_else(|| SyncError::NotRegistered(document_id.to_string()))?;

        if record.fingerprint == digest {
            debug!(document_id, name = %metadata.name, "no changes detected");
            return Ok(SyncOutcome::Unchanged);
        }

        let (api_key, assistant_id) = resolve_tenant(&self.pool, tenant_id).await?;

        let body = compose_upload_body(self.source.name(), &metadata, &content);
        let artifact_id = self
            .backend
            .upload_document(&api_key, &assistant_id, &metadata.name, &body)
            .await
            .map_err(|e| SyncError::UploadRejected(e.to_string()))?;

        self.wait_for_indexing(&api_key, &artifact_id).await?;

        registry::mark_document_synced(
            &self.pool,
            document_id,
            &digest,
            &content,
            &metadata.modified_time,
            &metadata.name,
        )
        .await?;

        let outcome = if record.fingerprint.is_empty() {
            SyncOutcome::Created
        } else {
            SyncOutcome::Updated
        };
        self.events.emit(EventSource::Drive, Some(tenant_id));
        info!(document_id, name = %metadata.name, ?outcome, "document synced");
        Ok(outcome)
    }

    /// Poll the backend until the artifact reaches a terminal state or the
    /// bounded wait elapses. A non-`indexed` outcome aborts the sync before
    /// any registry write.
    async fn wait_for_indexing(&self, api_key: &str, artifact_id: &str) -> Result<(), SyncError> {
        let deadline = Instant::now() + self.index_wait;

        loop {
            let status = self
                .backend
                .index_status(api_key, artifact_id)
                .await
                .map_err(|e| SyncError::IndexingFailed(e.to_string()))?;

            match status.state {
                IndexState::Indexed => return Ok(()),
                IndexState::Failed => {
                    return Err(SyncError::IndexingFailed(
                        status.message.unwrap_or_else(|| "no detail".to_string()),
                    ))
                }
                IndexState::Pending => {}
            }

            if Instant::now() >= deadline {
                return Err(SyncError::IndexingTimedOut(self.index_wait));
            }
            tokio::time::sleep(self.index_poll).await;
        }
    }

    fn begin_flight(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<FlightPermit<'_>, SyncError> {
        let key = (tenant_id.to_string(), document_id.to_string());
        let mut set = self.in_flight.lock().expect("in-flight set poisoned");
        if !set.insert(key.clone()) {
            return Err(SyncError::InFlight(document_id.to_string()));
        }
        Ok(FlightPermit {
            set: &self.in_flight,
            key,
        })
    }
}

/// Prefix the content with its provenance so the assistant can cite where
/// a fact came from.
fn compose_upload_body(source_name: &str, metadata: &DocumentMetadata, content: &str) -> String {
    format!(
        "Document: {}\nLast Modified: {}\nSource: {}\nLink: {}\n\n{}\n\n{}",
        metadata.name,
        metadata.modified_time,
        source_name,
        metadata.access_link.as_deref().unwrap_or("N/A"),
        "=".repeat(60),
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_body_carries_provenance_header() {
        let metadata = DocumentMetadata {
            id: "doc-1".to_string(),
            name: "Plan".to_string(),
            modified_time: "2026-01-12T10:00:00Z".to_string(),
            access_link: None,
        };
        let body = compose_upload_body("Google Drive", &metadata, "v1");
        assert!(body.starts_with("Document: Plan\n"));
        assert!(body.contains("Source: Google Drive"));
        assert!(body.contains("Link: N/A"));
        assert!(body.contains(&"=".repeat(60)));
        assert!(body.ends_with("v1"));
    }
}
