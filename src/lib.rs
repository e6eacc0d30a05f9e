//! Words Wall - Asynchronous Word-Enrichment Engine
//!
//! Turns a raw English word into a multi-section, progressively-assembled
//! explanatory document using a locally-hosted language model, persisting
//! partial progress along the way.
//!
//! ## Core Pipeline
//!
//! - **Fast path**: `get_or_create` returns immediately with a one-section
//!   record (cache hit, or fresh fast generation persisted `in-progress`)
//! - **Deep path**: a queued job drives four more model calls, one per
//!   section, persisting after each and finalizing the document in
//!   canonical order
//! - **Resilience**: model failures resolve to canned section fallbacks;
//!   persistence failures ride the queue's bounded retry
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use wordswall::{Database, EnrichWordHandler, JobQueue, OllamaClient,
//!                 SqliteWordStore, WordEnricher};
//!
//! let config = wordswall::ConfigLoader::load()?;
//! let db = Arc::new(Database::open(&config.store.db_path)?);
//! let store = Arc::new(SqliteWordStore::new(db));
//! let client = Arc::new(OllamaClient::new(&config.llm)?);
//! let queue = Arc::new(JobQueue::new(&config.queue));
//! let enricher = WordEnricher::new(store, client, queue.clone(), &config.enrich);
//! queue.register(Arc::new(EnrichWordHandler::new(enricher.clone())));
//! queue.start();
//! let word = enricher.get_or_create("serendipity").await?;
//! ```
//!
//! ## Modules
//!
//! - [`llm`]: generation client for the local Ollama backend
//! - [`content`]: deterministic document assembly
//! - [`queue`]: in-process sequential job queue with bounded retry
//! - [`enrich`]: the end-to-end enrichment orchestrator
//! - [`store`]: sqlite persistence for word records

pub mod cli;
pub mod config;
pub mod constants;
pub mod content;
pub mod enrich;
pub mod llm;
pub mod queue;
pub mod store;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, EnrichConfig, LlmConfig, QueueConfig, StoreConfig};

// Error Types
pub use types::error::{Result, ResultExt, WallError};

// Domain Types
pub use types::word::{
    NewWord, ProcessingStatus, Section, SectionResult, Word, WordPatch, normalize_word,
};

// Storage
pub use store::{Database, PoolConfig, SharedDatabase, SharedStore, SqliteWordStore, WordStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use enrich::{EnrichWordHandler, EnrichmentStatus, WordEnricher};
pub use llm::{LlmClient, OllamaClient, SharedClient};
pub use queue::{EnqueueOptions, JobHandler, JobKind, JobPayload, JobQueue, QueueStatus};
