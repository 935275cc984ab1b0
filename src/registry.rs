//! Row operations for the document registry, credential store, and chat log.
//!
//! Absent rows come back as `Ok(None)`, never as errors — callers decide
//! what absence means. The sync core is the only writer of document sync
//! state; registration is the only creator of document rows.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{ChatMessage, DocumentRecord, TenantRecord};

pub async fn lookup_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<Option<TenantRecord>> {
    let record = sqlx::query_as::<_, TenantRecord>("SELECT * FROM tenants WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub async fn insert_tenant(
    pool: &SqlitePool,
    tenant_id: &str,
    encrypted_credential: &str,
    assistant_id: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO tenants (tenant_id, encrypted_credential, assistant_id, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(tenant_id)
    .bind(encrypted_credential)
    .bind(assistant_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn lookup_document(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Option<DocumentRecord>> {
    let record =
        sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(pool)
            .await?;
    Ok(record)
}

/// Create a registry row for a newly registered document. The fingerprint
/// and content start empty; the first sync fills them in.
pub async fn insert_document(
    pool: &SqlitePool,
    document_id: &str,
    tenant_id: &str,
    display_name: &str,
    last_modified: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO documents \
         (document_id, tenant_id, display_name, fingerprint, last_modified, content, updated_at) \
         VALUES (?, ?, ?, '', ?, '', ?)",
    )
    .bind(document_id)
    .bind(tenant_id)
    .bind(display_name)
    .bind(last_modified)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// The single post-sync registry mutation: fingerprint, content, source
/// modification time, and display name move together in one statement.
pub async fn mark_document_synced(
    pool: &SqlitePool,
    document_id: &str,
    fingerprint: &str,
    content: &str,
    last_modified: &str,
    display_name: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "UPDATE documents \
         SET fingerprint = ?, content = ?, last_modified = ?, display_name = ?, updated_at = ? \
         WHERE document_id = ?",
    )
    .bind(fingerprint)
    .bind(content)
    .bind(last_modified)
    .bind(display_name)
    .bind(now)
    .bind(document_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_documents(pool: &SqlitePool, tenant_id: &str) -> Result<Vec<DocumentRecord>> {
    let records = sqlx::query_as::<_, DocumentRecord>(
        "SELECT * FROM documents WHERE tenant_id = ? ORDER BY document_id",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

pub async fn insert_chat(pool: &SqlitePool, tenant_id: &str, message: &ChatMessage) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO chats (tenant_id, chat_id, channel_name, sender, body, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(tenant_id)
    .bind(&message.chat_id)
    .bind(&message.channel_name)
    .bind(&message.sender)
    .bind(&message.body)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count_chats(pool: &SqlitePool, tenant_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
