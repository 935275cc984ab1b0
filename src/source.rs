//! The document-source seam.
//!
//! The sync core never talks to a concrete provider; it sees one
//! [`DocumentSource`] that can describe a document and hand over its
//! current text. The production implementation is [`crate::drive`];
//! tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentMetadata;

/// A provider of externally hosted documents, addressed by stable ids.
///
/// Both methods treat failure as a plain error: the sync core maps a
/// `metadata` failure to "inaccessible" and a `content` failure to
/// "unreadable" without inspecting the cause further. Implementations are
/// constructed once at startup and injected — authentication state lives
/// in the instance.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable provider name, used in upload provenance headers
    /// (e.g. `"Google Drive"`).
    fn name(&self) -> &str;

    /// Fetch current name, modification time, and access link for a
    /// document. Failure means the document is inaccessible (deleted,
    /// permission revoked, or the provider is down).
    async fn metadata(&self, document_id: &str) -> Result<DocumentMetadata>;

    /// Fetch the document's current textual content. Failure means the
    /// content is unreadable even though metadata may still resolve.
    async fn content(&self, document_id: &str) -> Result<String>;
}
