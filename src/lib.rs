//! # Bitable Sync
//!
//! Incremental, additive export of Feishu Bitable records into a directory
//! of markdown documents, one file per record, followed by a rebuild of the
//! downstream memory index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ RecordSource│──▶│  enumerate  │──▶│   render     │──▶│ Document  │
//! │ (Feishu)    │   │ all pages   │   │ per table    │   │ Store     │
//! └─────────────┘   └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                                              │
//!                        ┌──────────────┐   ┌───────────┐      │
//!                        │  Reindexer   │◀──│  Ledger   │◀─────┘
//!                        │  (command)   │   │ (SQLite)  │
//!                        └──────────────┘   └───────────┘
//! ```
//!
//! A record id that is already in the ledger, or already has a document on
//! disk, is never rewritten. The run only adds.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`fields`] | Dynamic field values and date resolution |
//! | [`error`] | Remote source errors |
//! | [`traits`] | `RecordSource` and `Reindexer` seams |
//! | [`feishu`] | Feishu Open API client |
//! | [`enumerate`] | Cursor-driven pagination |
//! | [`render`] | Schema and generic markdown renderers |
//! | [`storage`] | Write-once document directory |
//! | [`ledger`] | SQLite index of synced ids |
//! | [`reindex`] | External index rebuild command |
//! | [`ingest`] | Sync orchestration |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod enumerate;
pub mod error;
pub mod feishu;
pub mod fields;
pub mod ingest;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod preview;
pub mod progress;
pub mod reindex;
pub mod render;
pub mod sources;
pub mod stats;
pub mod storage;
pub mod traits;
