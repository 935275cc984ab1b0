//! # Context Relay CLI (`ctxr`)
//!
//! The `ctxr` binary drives the relay: database initialization, tenant
//! onboarding, document registration, one-shot and background syncing,
//! and the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! ctxr --config ./config/relay.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxr init` | Create the SQLite database and run schema migrations |
//! | `ctxr tenant add <id> <api-key>` | Onboard a tenant and its assistant |
//! | `ctxr register <tenant> <doc>` | Register a Drive document for monitoring |
//! | `ctxr sync <tenant> <doc-id>` | Run one immediate sync |
//! | `ctxr poll <tenant>` | Poll all registered documents, forever |
//! | `ctxr documents <tenant>` | List registered documents and sync state |
//! | `ctxr serve` | Start the HTTP API server |

mod config;
mod db;
mod drive;
mod encryption;
mod events;
mod fingerprint;
mod github;
mod memory;
mod migrate;
mod models;
mod poller;
mod registry;
mod server;
mod source;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::drive::{extract_file_id, DriveSource};
use crate::events::EventBus;
use crate::github::GithubIngestor;
use crate::memory::{MemoryBackend, MemoryClient};
use crate::models::{PollSession, RegisterOutcome};
use crate::source::DocumentSource;
use crate::sync::SyncEngine;

/// Context Relay — sync onboarding context from Drive, GitHub, and group
/// chats into a hosted AI memory backend.
#[derive(Parser)]
#[command(
    name = "ctxr",
    about = "Context Relay — mirror onboarding context into a hosted AI memory backend",
    version,
    long_about = "Context Relay watches Google Drive documents for content changes, ingests \
    GitHub push events and group-chat messages, and forwards everything to a per-tenant \
    assistant on a hosted memory backend."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the tenants, documents, and
    /// chats tables. Idempotent — running it multiple times is safe.
    Init,

    /// Manage tenants.
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },

    /// Register a Drive document for monitoring.
    ///
    /// Accepts a bare file id or a full Drive URL. Registration is
    /// metadata-only; the first sync ingests the content.
    Register {
        /// Owning tenant id.
        tenant_id: String,
        /// Drive file id or URL.
        document: String,
    },

    /// Run one immediate sync for a registered document.
    Sync {
        /// Owning tenant id.
        tenant_id: String,
        /// Drive file id.
        document_id: String,
    },

    /// Poll all of a tenant's registered documents, forever.
    ///
    /// Runs in the foreground; stop with Ctrl-C. The interval is fixed —
    /// there is no backoff after failures.
    Poll {
        /// Owning tenant id.
        tenant_id: String,
        /// Seconds between cycles. Defaults to poller.interval_secs.
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// List a tenant's registered documents and their sync state.
    Documents {
        /// Owning tenant id.
        tenant_id: String,
    },

    /// Start the HTTP API server.
    Serve,
}

#[derive(Subcommand)]
enum TenantAction {
    /// Onboard a tenant: create its assistant on the memory backend and
    /// store the encrypted API key.
    Add {
        /// New tenant id.
        tenant_id: String,
        /// Memory-backend API key for this tenant.
        api_key: String,
    },
}

/// Everything a command can need, constructed once at startup. The Drive
/// client and memory-backend client are built here and handed to the
/// engine; authentication state lives in those instances.
struct Runtime {
    pool: SqlitePool,
    engine: Arc<SyncEngine>,
    backend: Arc<dyn MemoryBackend>,
    events: EventBus,
}

async fn build_runtime(config: &Config) -> Result<Runtime> {
    let pool = db::connect(&config.db.path).await?;
    let source: Arc<dyn DocumentSource> = Arc::new(DriveSource::from_config(&config.drive)?);
    let backend: Arc<dyn MemoryBackend> = Arc::new(MemoryClient::from_config(&config.backend)?);
    let events = EventBus::new();
    let engine = Arc::new(SyncEngine::new(
        pool.clone(),
        source,
        backend.clone(),
        events.clone(),
        config.poller.index_wait(),
        config.poller.index_poll(),
    ));
    Ok(Runtime {
        pool,
        engine,
        backend,
        events,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Tenant {
            action: TenantAction::Add { tenant_id, api_key },
        } => {
            let pool = db::connect(&config.db.path).await?;
            if registry::lookup_tenant(&pool, &tenant_id).await?.is_some() {
                anyhow::bail!("tenant {} already exists", tenant_id);
            }
            let backend = MemoryClient::from_config(&config.backend)?;
            let assistant_id = backend
                .create_assistant(
                    &api_key,
                    "Onboarding Assistant",
                    "An assistant designed to understand your team's onboarding context",
                )
                .await?;
            let encrypted = encryption::encrypt_credential(&api_key)?;
            registry::insert_tenant(&pool, &tenant_id, &encrypted, &assistant_id).await?;
            println!("tenant {} created (assistant {})", tenant_id, assistant_id);
        }
        Commands::Register {
            tenant_id,
            document,
        } => {
            let runtime = build_runtime(&config).await?;
            let document_id = if document.contains("http") {
                extract_file_id(&document)
                    .ok_or_else(|| anyhow::anyhow!("could not extract a file id from {}", document))?
            } else {
                document
            };
            match runtime.engine.register_document(&document_id, &tenant_id).await? {
                RegisterOutcome::Registered { display_name } => {
                    println!("registered {} ({})", document_id, display_name);
                }
                RegisterOutcome::AlreadyRegistered => {
                    println!("{} is already registered", document_id);
                }
            }
        }
        Commands::Sync {
            tenant_id,
            document_id,
        } => {
            let runtime = build_runtime(&config).await?;
            let outcome = runtime.engine.sync_document(&document_id, &tenant_id).await?;
            println!("sync {}: {:?}", document_id, outcome);
        }
        Commands::Poll {
            tenant_id,
            interval_secs,
        } => {
            let runtime = build_runtime(&config).await?;
            let documents = registry::list_documents(&runtime.pool, &tenant_id).await?;
            if documents.is_empty() {
                anyhow::bail!("no documents registered for tenant {}", tenant_id);
            }
            let session = PollSession {
                tenant_id,
                document_ids: documents.into_iter().map(|d| d.document_id).collect(),
                interval: interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(config.poller.interval()),
            };
            // Foreground: the loop only ends with the process.
            poller::start_polling(runtime.engine, session).await?;
        }
        Commands::Documents { tenant_id } => {
            let pool = db::connect(&config.db.path).await?;
            let documents = registry::list_documents(&pool, &tenant_id).await?;
            println!("{:<32} {:<24} {:<10} UPDATED", "DOCUMENT", "NAME", "SYNCED");
            for doc in documents {
                println!(
                    "{:<32} {:<24} {:<10} {}",
                    doc.document_id,
                    doc.display_name,
                    !doc.fingerprint.is_empty(),
                    doc.updated_at
                );
            }
        }
        Commands::Serve => {
            let runtime = build_runtime(&config).await?;
            let github = Arc::new(GithubIngestor::from_config(&config.github)?);
            server::run_server(
                &config,
                runtime.pool,
                runtime.engine,
                runtime.backend,
                github,
                runtime.events,
            )
            .await?;
        }
    }

    Ok(())
}
