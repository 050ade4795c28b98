//! # Chat Collector
//!
//! A chat-transcript collection service with file, SQL, and search-index
//! persistence.
//!
//! Chat Collector ingests chat transcripts over HTTP, writes each one to a
//! canonical JSON file, keeps a queryable SQLite record per transcript, and
//! runs a standalone watcher process that reconciles an external full-text
//! search index against the on-disk document set.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Client │──▶│  HTTP API     │──▶│ raw_json/     │
//! └────────┘   │ /collect      │   │ <id>.json     │
//!              │ /search       │   └──────┬────────┘
//!              │ /chat/{id}    │          │ notify
//!              └──────┬────────┘   ┌──────▼────────┐   ┌──────────────┐
//!                     ▼            │ Sync Watcher  │──▶│ Search Index │
//!              ┌──────────────┐    │ hash + clean  │   │ (Meilisearch)│
//!              │ SQLite (sqlx)│    └───────────────┘   └──────────────┘
//!              └──────────────┘
//! ```
//!
//! The HTTP API never talks to the search index; the watcher never talks to
//! SQLite. The two halves are coupled only through the file store, so
//! ingestion never blocks on search-index availability.
//!
//! ## Quick Start
//!
//! ```bash
//! chatd init                    # create database
//! chatd serve                   # start the collection/query HTTP server
//! chatd watch                   # start the search-index sync watcher
//! chatd search "deployment"     # query collected chats
//! chatd get <id>                # print a stored transcript
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with env overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy for ingestion and queries |
//! | [`metadata`] | Metadata extraction from transcript bodies |
//! | [`collect`] | Ingestion pipeline (file write + record upsert) |
//! | [`query`] | Read-only search and fetch |
//! | [`store`] | Canonical JSON file store |
//! | [`search_index`] | Search-index HTTP client |
//! | [`watcher`] | Filesystem-driven index reconciliation |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod query;
pub mod search_index;
pub mod server;
pub mod store;
pub mod watcher;
