//! # Docmill
//!
//! A change-aware document ingestion and chunking pipeline for retrieval
//! systems.
//!
//! Docmill scans a directory tree of office/legal documents (PDF, DOCX,
//! plain text), fingerprints each file, extracts plain text, optionally
//! detects chapter/section structure, splits the text into overlapping
//! chunks, and persists everything to SQLite. Files whose fingerprint and
//! modification time have not changed since the previous run are skipped
//! before any extraction work happens.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────────┐   ┌──────────┐
//! │ Scanner  │──▶│ Fingerprint │──▶│ Extract       │──▶│  SQLite  │
//! │ walkdir  │   │ change gate │   │ Detect, Chunk │   │  rows    │
//! └──────────┘   └─────────────┘   └───────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docmill init                  # create the database
//! docmill sync                  # ingest the configured tree
//! docmill sync --dry-run        # preview what would change
//! docmill stats                 # inspect what's indexed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Recursive document discovery |
//! | [`fingerprint`] | Content fingerprinting for change detection |
//! | [`extract`] | Per-format text extraction |
//! | [`detect`] | Chapter-structure detection (AI + rule-based) |
//! | [`chunker`] | Sliding-window and chapter-aware chunking |
//! | [`pipeline`] | Change-aware sync orchestration |
//! | [`store`] | Document/chapter/chunk persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`stats`] | Database statistics overview |

pub mod chunker;
pub mod config;
pub mod db;
pub mod detect;
pub mod extract;
pub mod fingerprint;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod scanner;
pub mod stats;
pub mod store;
