//! Word Enrichment Orchestrator
//!
//! The end-to-end state machine turning a requested word into a fully
//! enriched, persisted record. A request either hits the cache and returns
//! immediately, or is fast-generated, persisted `in-progress`, and queued
//! for deep enrichment; the deep job persists each section as it completes
//! and then finalizes the record as `completed`. The alternate terminal
//! state `failed` is reachable only when the deep job throws after the
//! client's per-section fallbacks are already exhausted (a persistence
//! error, not a model-call error).
//!
//! Model calls are strictly serialized with a fixed inter-section delay:
//! the local backend handles concurrent generation requests poorly, so the
//! single-lane queue plus this throttle are the whole concurrency story.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::EnrichConfig;
use crate::constants::{enrich as enrich_constants, scenario};
use crate::content;
use crate::llm::{LlmClient, SharedClient};
use crate::queue::{EnqueueOptions, JobHandler, JobKind, JobPayload, JobQueue};
use crate::store::{SharedStore, WordStore};
use crate::types::{
    NewWord, ProcessingStatus, Result, Section, SectionResult, Word, WordPatch, normalize_word,
};

/// Processing-state view of a word, for pollers.
#[derive(Debug, Clone)]
pub struct EnrichmentStatus {
    pub is_processing: bool,
    pub processing_status: ProcessingStatus,
    pub scenarios: Vec<String>,
}

/// The enrichment orchestrator. Cheap to clone: all fields are shared
/// handles.
#[derive(Clone)]
pub struct WordEnricher {
    store: SharedStore,
    client: SharedClient,
    queue: Arc<JobQueue>,
    section_delay: Duration,
}

impl WordEnricher {
    pub fn new(
        store: SharedStore,
        client: SharedClient,
        queue: Arc<JobQueue>,
        config: &EnrichConfig,
    ) -> Self {
        Self {
            store,
            client,
            queue,
            section_delay: Duration::from_secs(config.section_delay_secs),
        }
    }

    /// Return the existing record for a word, or create one.
    ///
    /// On a cache hit the record is returned unchanged: no re-enrichment,
    /// no rating reset. On a miss the fast section is generated inline, the
    /// record is persisted `in-progress`, and the deep-enrichment job is
    /// enqueued; the caller gets the fresh record immediately without
    /// waiting for deep enrichment.
    pub async fn get_or_create(&self, raw: &str) -> Result<Word> {
        let word = normalize_word(raw);
        if let Some(existing) = self.store.find_by_text(&word).await? {
            debug!(%word, "Cache hit, returning existing record");
            return Ok(existing);
        }

        info!(%word, "New word, generating fast section");
        let fast_text = self.client.request_fast(&word).await;
        let document = content::fast_document(&word, &fast_text);

        let record = self
            .store
            .insert(NewWord {
                text: word.clone(),
                meaning: document.clone(),
                chinese_meaning: format!("{word}的中文含义"),
                usage: document,
                scenarios: vec![scenario::FAST_PATH.to_string()],
                pronunciation: None,
                rating: enrich_constants::DEFAULT_RATING,
                is_processing: true,
                processing_status: ProcessingStatus::InProgress,
            })
            .await?;
        info!(%word, word_id = record.id, "Persisted fast record, queueing deep enrichment");

        let payload = JobPayload::EnrichWord {
            word_id: record.id,
            word: word.clone(),
        };
        if let Err(e) = self.queue.enqueue(payload, EnqueueOptions::default()) {
            // Queue refused the work: run the deep pass as a detached task.
            // No retry and no backpressure on this path.
            warn!(%word, "Queue unavailable ({}), running enrichment detached", e);
            let enricher = self.clone();
            let word_id = record.id;
            let text = word.clone();
            tokio::spawn(async move {
                if let Err(e) = enricher.run_deep_enrichment(word_id, &text).await {
                    error!(word = %text, "Detached enrichment failed: {}", e);
                }
            });
        }

        Ok(record)
    }

    /// Processing-state view of a word, by raw (unnormalized) text.
    pub async fn status(&self, raw: &str) -> Result<Option<EnrichmentStatus>> {
        let word = self.store.find_by_text(&normalize_word(raw)).await?;
        Ok(word.map(|w| EnrichmentStatus {
            is_processing: w.is_processing,
            processing_status: w.processing_status,
            scenarios: w.scenarios,
        }))
    }

    /// Drive the four deep sections for a word. Invoked by the job queue
    /// handler; a returned error advances the queue's retry counter.
    pub async fn run_deep_enrichment(&self, word_id: i64, word: &str) -> Result<()> {
        info!(word, word_id, "Starting deep enrichment");
        match self.enrich_sections(word_id, word).await {
            Ok(()) => {
                info!(word, word_id, "Deep enrichment finished");
                Ok(())
            }
            Err(e) => {
                error!(word, word_id, "Deep enrichment failed: {}", e);
                self.mark_failed(word_id, word).await;
                Err(e)
            }
        }
    }

    async fn enrich_sections(&self, word_id: i64, word: &str) -> Result<()> {
        let Some(record) = self.store.find_by_id(word_id).await? else {
            warn!(word, word_id, "Word record disappeared before enrichment, dropping job");
            return Ok(());
        };

        // Snapshot the fast-section text before any appends. The final
        // document is rebuilt from this baseline plus the section results,
        // never from progressively-appended state.
        let baseline = content::fast_section_text(&record.meaning);

        // A retried attempt starts over: drop partial appends from the
        // previous attempt so each section is appended exactly once.
        let fast_document = content::fast_document(word, &baseline);
        if record.meaning != fast_document {
            debug!(word, "Resetting document to fast baseline before re-running sections");
            let reset = self
                .store
                .update(
                    word_id,
                    WordPatch::document(fast_document)
                        .scenarios(vec![scenario::FAST_PATH.to_string()])
                        .status(ProcessingStatus::InProgress),
                )
                .await?;
            if reset.is_none() {
                warn!(word, word_id, "Word record disappeared during reset, dropping job");
                return Ok(());
            }
        }

        let total = Section::DEEP.len();
        let mut results: Vec<SectionResult> = Vec::with_capacity(total);
        for (index, section) in Section::DEEP.into_iter().enumerate() {
            info!(word, %section, "Processing section {}/{}", index + 1, total);
            let text = self.client.request_section(word, section).await;

            // Durably append before moving on: a crash mid-run leaves a
            // partially-useful, valid document.
            self.append_progress(word_id, word, section, &text).await?;
            results.push(SectionResult { section, text });
            debug!(
                word,
                %section,
                progress = progress_after(index, total),
                "Section persisted"
            );

            if index + 1 < total {
                // The backend serves one generation request at a time
                tokio::time::sleep(self.section_delay).await;
            }
        }

        // Deterministic rebuild in canonical order from the snapshot and
        // the in-memory section results.
        let mut sections = vec![SectionResult {
            section: Section::BasicMeaning,
            text: baseline,
        }];
        sections.extend(results);
        let final_document = content::assemble_full(word, &sections);

        let finalized = self
            .store
            .update(
                word_id,
                WordPatch::document(final_document)
                    .scenarios(scenario::COMPLETED.iter().map(|s| s.to_string()).collect())
                    .status(ProcessingStatus::Completed)
                    .processing(false),
            )
            .await?;
        if finalized.is_none() {
            warn!(word, word_id, "Word record disappeared before finalization");
        }
        Ok(())
    }

    /// Append one completed section to the persisted document. A missing
    /// record is logged and skipped: one missed write must not abort the
    /// whole run.
    async fn append_progress(
        &self,
        word_id: i64,
        word: &str,
        section: Section,
        text: &str,
    ) -> Result<()> {
        let Some(record) = self.store.find_by_id(word_id).await? else {
            warn!(word, word_id, %section, "Word record not found, skipping progress update");
            return Ok(());
        };

        let document = content::append_section(&record.meaning, section, text);
        let mut scenarios = record.scenarios;
        scenarios.push(section.tag().to_string());

        let updated = self
            .store
            .update(
                word_id,
                WordPatch::document(document)
                    .scenarios(scenarios)
                    .status(ProcessingStatus::InProgress),
            )
            .await?;
        if updated.is_none() {
            warn!(word, word_id, %section, "Word record not found, progress update lost");
        }
        Ok(())
    }

    /// Best-effort terminal failure write. Errors here are logged, not
    /// propagated: the original failure is the one the queue should see.
    async fn mark_failed(&self, word_id: i64, word: &str) {
        let patch = WordPatch {
            scenarios: Some(scenario::FAILED.iter().map(|s| s.to_string()).collect()),
            is_processing: Some(false),
            processing_status: Some(ProcessingStatus::Failed),
            ..Default::default()
        };
        match self.store.update(word_id, patch).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(word, word_id, "Word record not found while marking failed"),
            Err(e) => error!(word, word_id, "Failed to record failure status: {}", e),
        }
    }
}

/// Percentage progress after the section at `index` (0-based) persisted.
fn progress_after(index: usize, total: usize) -> u8 {
    let fast = enrich_constants::PROGRESS_FAST as usize;
    let span = enrich_constants::PROGRESS_DEEP_END as usize - fast;
    (fast + span * (index + 1) / total) as u8
}

// =============================================================================
// Queue Handler
// =============================================================================

/// Bridges the job queue to the orchestrator's deep-enrichment path.
pub struct EnrichWordHandler {
    enricher: WordEnricher,
}

impl EnrichWordHandler {
    pub fn new(enricher: WordEnricher) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl JobHandler for EnrichWordHandler {
    fn kind(&self) -> JobKind {
        JobKind::EnrichWord
    }

    async fn handle(&self, payload: &JobPayload) -> Result<()> {
        let JobPayload::EnrichWord { word_id, word } = payload;
        self.enricher.run_deep_enrichment(*word_id, word).await
    }
}
