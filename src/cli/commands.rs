//! CLI Command Handlers
//!
//! The thin caller surface over the enrichment pipeline: the word-list and
//! sticker UI talk to the same orchestrator interface these commands do.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cli::ui::Output;
use crate::config::Config;
use crate::enrich::{EnrichWordHandler, WordEnricher};
use crate::llm::{LlmClient, OllamaClient, SharedClient};
use crate::queue::JobQueue;
use crate::store::{Database, SharedStore, SqliteWordStore, WordStore};
use crate::types::{ProcessingStatus, Result, Word};

/// How often `add --wait` re-reads the record while enrichment runs.
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on `add --wait`; local generation of four sections plus
/// delays rarely exceeds this.
const WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Composition root: owns every shared service and wires the queue to the
/// orchestrator. All ambient state lives here, not in module globals.
pub struct App {
    pub config: Config,
    pub store: SharedStore,
    pub client: SharedClient,
    pub queue: Arc<JobQueue>,
    pub enricher: WordEnricher,
}

impl App {
    /// Construct and start all services.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let db = Arc::new(Database::open(&config.store.db_path)?);
        let store: SharedStore = Arc::new(SqliteWordStore::new(db));
        let client: SharedClient = Arc::new(OllamaClient::new(&config.llm)?);
        let queue = Arc::new(JobQueue::new(&config.queue));
        let enricher = WordEnricher::new(
            store.clone(),
            client.clone(),
            queue.clone(),
            &config.enrich,
        );
        queue.register(Arc::new(EnrichWordHandler::new(enricher.clone())));
        queue.start();
        debug!("Application services started");

        Ok(Self {
            config,
            store,
            client,
            queue,
            enricher,
        })
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

// =============================================================================
// add
// =============================================================================

pub async fn add(app: &App, words: &[String], wait: bool) -> Result<()> {
    let out = Output::new();
    let mut created: Vec<Word> = Vec::new();

    for raw in words {
        let word = app.enricher.get_or_create(raw).await?;
        match word.processing_status {
            ProcessingStatus::InProgress => {
                out.info(&format!(
                    "\"{}\" queued for enrichment (id {})",
                    word.text, word.id
                ));
            }
            ProcessingStatus::Completed => {
                out.success(&format!("\"{}\" already enriched (id {})", word.text, word.id));
            }
            ProcessingStatus::Failed => {
                out.warning(&format!(
                    "\"{}\" previously failed enrichment; re-add after deleting it",
                    word.text
                ));
            }
        }
        created.push(word);
    }

    if wait {
        for word in &created {
            wait_for_word(app, word, &out).await?;
        }
    }
    Ok(())
}

async fn wait_for_word(app: &App, word: &Word, out: &Output) -> Result<()> {
    if word.processing_status != ProcessingStatus::InProgress {
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        let Some(current) = app.store.find_by_id(word.id).await? else {
            out.warning(&format!("\"{}\" was deleted while enriching", word.text));
            return Ok(());
        };

        match current.processing_status {
            ProcessingStatus::InProgress => {
                out.info(&format!(
                    "\"{}\": {} section(s) done...",
                    current.text,
                    current.scenarios.len()
                ));
            }
            ProcessingStatus::Completed => {
                out.success(&format!("\"{}\" enriched", current.text));
                return Ok(());
            }
            ProcessingStatus::Failed => {
                out.error(&format!("\"{}\" enrichment failed", current.text));
                return Ok(());
            }
        }

        if tokio::time::Instant::now() >= deadline {
            out.warning(&format!(
                "\"{}\" still enriching after {:?}; giving up on waiting (the job keeps running)",
                word.text, WAIT_TIMEOUT
            ));
            return Ok(());
        }
    }
}

// =============================================================================
// show
// =============================================================================

pub async fn show(app: &App, raw: &str) -> Result<()> {
    let out = Output::new();
    let Some(status) = app.enricher.status(raw).await? else {
        out.warning(&format!("\"{}\" is not in the wall yet", raw.trim()));
        return Ok(());
    };

    // Status comes from the same record; re-read for the content fields
    let word = app
        .store
        .find_by_text(&crate::types::normalize_word(raw))
        .await?;
    let Some(word) = word else {
        out.warning(&format!("\"{}\" disappeared between reads", raw.trim()));
        return Ok(());
    };

    out.header(&word.text);
    println!(
        "status: {}  processing: {}  rating: {}",
        status.processing_status, status.is_processing, word.rating
    );
    println!("sections: {}", status.scenarios.join(", "));
    out.section("content");
    println!("{}", word.meaning);
    Ok(())
}

// =============================================================================
// health / queue-status
// =============================================================================

pub async fn health(app: &App) -> Result<()> {
    let out = Output::new();
    out.header("Words Wall health");

    match app.client.health_check().await {
        Ok(true) => out.success(&format!(
            "{} reachable, model {} available",
            app.client.name(),
            app.client.model()
        )),
        Ok(false) => out.warning(&format!(
            "{} unhealthy (endpoint down or model {} not pulled)",
            app.client.name(),
            app.client.model()
        )),
        Err(e) => out.error(&format!("health check failed: {}", e)),
    }

    queue_status(app)
}

pub fn queue_status(app: &App) -> Result<()> {
    let out = Output::new();
    let status = app.queue.status();
    out.info(&format!(
        "queue: {} pending, {}",
        status.queue_size,
        if status.processing { "processing" } else { "idle" }
    ));
    Ok(())
}
