//! Word Store
//!
//! Persistence for word records. The enrichment pipeline depends on the
//! [`WordStore`] trait; [`SqliteWordStore`] is the production
//! implementation on top of the pooled sqlite [`Database`].
//!
//! Concurrency policy: the enrichment orchestrator is the sole writer of
//! processing-state fields. User-driven edits to content fields can race
//! it; writes are last-write-wins with no optimistic locking.

pub mod database;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use tracing::warn;

pub use database::{Database, PoolConfig, SharedDatabase};

use crate::types::{NewWord, ProcessingStatus, Result, Word, WordPatch};

/// Shared store handle for the orchestrator and composition root.
pub type SharedStore = Arc<dyn WordStore>;

// =============================================================================
// Store Trait
// =============================================================================

#[async_trait]
pub trait WordStore: Send + Sync {
    /// Look up a word by its normalized text.
    async fn find_by_text(&self, text: &str) -> Result<Option<Word>>;

    /// Look up a word by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Word>>;

    /// Insert a fresh record, assigning its identity.
    async fn insert(&self, fields: NewWord) -> Result<Word>;

    /// Apply a partial update. Returns `None` if the record no longer
    /// exists (it may have been deleted while enrichment was in flight).
    async fn update(&self, id: i64, patch: WordPatch) -> Result<Option<Word>>;
}

// =============================================================================
// Sqlite Implementation
// =============================================================================

pub struct SqliteWordStore {
    db: SharedDatabase,
}

impl SqliteWordStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    fn row_to_word(row: &Row<'_>) -> rusqlite::Result<Word> {
        let scenarios_json: String = row.get("scenarios")?;
        let scenarios: Vec<String> = serde_json::from_str(&scenarios_json).unwrap_or_else(|e| {
            warn!("Unreadable scenarios column, resetting: {}", e);
            Vec::new()
        });
        let status: String = row.get("processing_status")?;

        Ok(Word {
            id: row.get("id")?,
            text: row.get("word")?,
            meaning: row.get("meaning")?,
            chinese_meaning: row.get("chinese_meaning")?,
            usage: row.get("usage")?,
            scenarios,
            pronunciation: row.get("pronunciation")?,
            rating: row.get("rating")?,
            is_processing: row.get("is_processing")?,
            processing_status: ProcessingStatus::parse(&status),
            created_at: parse_timestamp(&row.get::<_, String>("created_at")?),
            updated_at: parse_timestamp(&row.get::<_, String>("updated_at")?),
        })
    }

    fn query_one<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Option<Word>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map(params, Self::row_to_word)?;
        match rows.next() {
            Some(word) => Ok(Some(word?)),
            None => Ok(None),
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const SELECT_COLUMNS: &str = "id, word, meaning, chinese_meaning, usage, scenarios, \
     pronunciation, rating, is_processing, processing_status, created_at, updated_at";

#[async_trait]
impl WordStore for SqliteWordStore {
    async fn find_by_text(&self, text: &str) -> Result<Option<Word>> {
        self.query_one(
            &format!("SELECT {SELECT_COLUMNS} FROM words WHERE word = ?1"),
            params![text],
        )
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Word>> {
        self.query_one(
            &format!("SELECT {SELECT_COLUMNS} FROM words WHERE id = ?1"),
            params![id],
        )
    }

    async fn insert(&self, fields: NewWord) -> Result<Word> {
        let conn = self.db.conn()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let scenarios_json = serde_json::to_string(&fields.scenarios)?;

        conn.execute(
            "INSERT INTO words (word, meaning, chinese_meaning, usage, scenarios, \
             pronunciation, rating, is_processing, processing_status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                fields.text,
                fields.meaning,
                fields.chinese_meaning,
                fields.usage,
                scenarios_json,
                fields.pronunciation,
                fields.rating,
                fields.is_processing,
                fields.processing_status.as_str(),
                now_str,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Ok(Word {
            id,
            text: fields.text,
            meaning: fields.meaning,
            chinese_meaning: fields.chinese_meaning,
            usage: fields.usage,
            scenarios: fields.scenarios,
            pronunciation: fields.pronunciation,
            rating: fields.rating,
            is_processing: fields.is_processing,
            processing_status: fields.processing_status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, id: i64, patch: WordPatch) -> Result<Option<Word>> {
        let Some(mut word) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        if let Some(meaning) = patch.meaning {
            word.meaning = meaning;
        }
        if let Some(chinese_meaning) = patch.chinese_meaning {
            word.chinese_meaning = chinese_meaning;
        }
        if let Some(usage) = patch.usage {
            word.usage = usage;
        }
        if let Some(scenarios) = patch.scenarios {
            word.scenarios = scenarios;
        }
        if let Some(pronunciation) = patch.pronunciation {
            word.pronunciation = Some(pronunciation);
        }
        if let Some(rating) = patch.rating {
            word.rating = rating;
        }
        if let Some(is_processing) = patch.is_processing {
            word.is_processing = is_processing;
        }
        if let Some(status) = patch.processing_status {
            word.processing_status = status;
        }
        word.updated_at = Utc::now();

        let conn = self.db.conn()?;
        let scenarios_json = serde_json::to_string(&word.scenarios)?;
        let changed = conn.execute(
            "UPDATE words SET meaning = ?2, chinese_meaning = ?3, usage = ?4, scenarios = ?5, \
             pronunciation = ?6, rating = ?7, is_processing = ?8, processing_status = ?9, \
             updated_at = ?10 WHERE id = ?1",
            params![
                id,
                word.meaning,
                word.chinese_meaning,
                word.usage,
                scenarios_json,
                word.pronunciation,
                word.rating,
                word.is_processing,
                word.processing_status.as_str(),
                word.updated_at.to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            // Deleted between the read and the write; report not-found
            return Ok(None);
        }
        Ok(Some(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::enrich::DEFAULT_RATING;

    fn new_word(text: &str) -> NewWord {
        NewWord {
            text: text.to_string(),
            meaning: "## doc".to_string(),
            chinese_meaning: format!("{text}的中文含义"),
            usage: "## doc".to_string(),
            scenarios: vec!["basic-meaning".to_string()],
            pronunciation: None,
            rating: DEFAULT_RATING,
            is_processing: true,
            processing_status: ProcessingStatus::InProgress,
        }
    }

    fn store() -> SqliteWordStore {
        let db = Database::open_in_memory().expect("open db");
        SqliteWordStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let store = store();
        let inserted = store.insert(new_word("apple")).await.expect("insert");
        assert!(inserted.id > 0);

        let by_text = store
            .find_by_text("apple")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(by_text.id, inserted.id);
        assert_eq!(by_text.scenarios, vec!["basic-meaning"]);
        assert_eq!(by_text.processing_status, ProcessingStatus::InProgress);
        assert!(by_text.is_processing);
        assert_eq!(by_text.rating, DEFAULT_RATING);

        let by_id = store
            .find_by_id(inserted.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(by_id.text, "apple");
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let store = store();
        assert!(store.find_by_text("ghost").await.expect("find").is_none());
        assert!(store.find_by_id(999).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_unique_word_constraint() {
        let store = store();
        store.insert(new_word("apple")).await.expect("insert");
        assert!(store.insert(new_word("apple")).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let store = store();
        let word = store.insert(new_word("apple")).await.expect("insert");

        let updated = store
            .update(
                word.id,
                WordPatch::document("## new doc")
                    .scenarios(vec!["multi-request".into(), "completed".into()])
                    .status(ProcessingStatus::Completed)
                    .processing(false),
            )
            .await
            .expect("update")
            .expect("present");

        assert_eq!(updated.meaning, "## new doc");
        assert_eq!(updated.usage, "## new doc");
        assert_eq!(updated.processing_status, ProcessingStatus::Completed);
        assert!(!updated.is_processing);
        // Untouched fields survive
        assert_eq!(updated.chinese_meaning, "apple的中文含义");
        assert_eq!(updated.rating, DEFAULT_RATING);

        let reread = store
            .find_by_id(word.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(reread.meaning, "## new doc");
        assert_eq!(reread.scenarios, vec!["multi-request", "completed"]);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let store = store();
        let result = store
            .update(42, WordPatch::document("x"))
            .await
            .expect("update");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rating_update_is_independent_of_enrichment_fields() {
        let store = store();
        let word = store.insert(new_word("apple")).await.expect("insert");

        let updated = store
            .update(
                word.id,
                WordPatch {
                    rating: Some(2),
                    ..Default::default()
                },
            )
            .await
            .expect("update")
            .expect("present");

        assert_eq!(updated.rating, 2);
        assert_eq!(updated.meaning, "## doc");
        assert_eq!(updated.processing_status, ProcessingStatus::InProgress);
    }
}
