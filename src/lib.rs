//! # Context Relay
//!
//! An onboarding-context relay: it watches externally hosted documents for
//! change, ingests group-chat messages and repository pushes, and forwards
//! everything to a hosted AI memory backend so a tenant's assistant can
//! answer questions with that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Sources    │──▶│  Sync Core    │──▶│ Memory Backend │
//! │ Drive/GitHub │   │ hash+compare │   │ upload+index  │
//! │ /Telegram    │   └──────┬───────┘   └───────────────┘
//! └──────────────┘          │
//!                     ┌─────┴─────┐
//!                     ▼           ▼
//!                ┌─────────┐ ┌─────────┐
//!                │ SQLite  │ │  HTTP   │
//!                │registry │ │ (axum)  │
//!                └─────────┘ └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ctxr init                                  # create database
//! ctxr tenant add acme sk-live-...           # onboard a tenant
//! ctxr register acme https://docs.google.com/document/d/FILE_ID/edit
//! ctxr sync acme FILE_ID                     # one immediate sync
//! ctxr poll acme --interval-secs 300         # poll forever
//! ctxr serve                                 # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Content digests for change detection |
//! | [`registry`] | Document registry and credential store rows |
//! | [`encryption`] | Credential sealing |
//! | [`source`] | Document-source trait seam |
//! | [`drive`] | Google Drive source |
//! | [`memory`] | Memory-backend trait seam and REST client |
//! | [`sync`] | Document sync core and registration |
//! | [`poller`] | Background poll scheduler |
//! | [`github`] | Push-event ingestion |
//! | [`events`] | Ingestion event fan-out |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod drive;
pub mod encryption;
pub mod events;
pub mod fingerprint;
pub mod github;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod poller;
pub mod registry;
pub mod server;
pub mod source;
pub mod sync;
