//! Word Domain Types
//!
//! The word record is the unit of enrichment: created on first request with a
//! fast one-section document, then mutated in place by the enrichment
//! pipeline as deep sections complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Processing State
// =============================================================================

/// Lifecycle state of a word's enrichment run.
///
/// Transitions: `InProgress` on creation, then exactly one of `Completed`
/// (full success) or `Failed` (the deep job threw after its internal
/// per-section fallbacks). Callers observe this by re-reading the word;
/// there is no push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStatus {
    Completed,
    InProgress,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in-progress",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored column value. Unknown values map to `Completed`
    /// so that rows written before the pipeline existed stay readable.
    pub fn parse(s: &str) -> Self {
        match s {
            "in-progress" => Self::InProgress,
            "failed" => Self::Failed,
            _ => Self::Completed,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Enrichment Sections
// =============================================================================

/// The five content sections of an enriched word document, in canonical
/// order. The fast path produces `BasicMeaning`; the queued deep job fills
/// in the remaining four, one model call each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    BasicMeaning,
    DetailedMeaning,
    UsageExamples,
    Synonyms,
    Collocations,
}

impl Section {
    /// All sections in canonical document order.
    pub const ALL: [Section; 5] = [
        Section::BasicMeaning,
        Section::DetailedMeaning,
        Section::UsageExamples,
        Section::Synonyms,
        Section::Collocations,
    ];

    /// The sections produced by the queued deep-enrichment job, in the order
    /// they are generated and persisted.
    pub const DEEP: [Section; 4] = [
        Section::DetailedMeaning,
        Section::UsageExamples,
        Section::Synonyms,
        Section::Collocations,
    ];

    /// Stable identifier used as the scenario-ledger tag and prompt key.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::BasicMeaning => "basicMeaning",
            Self::DetailedMeaning => "detailedMeaning",
            Self::UsageExamples => "usageExamples",
            Self::Synonyms => "synonyms",
            Self::Collocations => "collocations",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "basicMeaning" => Some(Self::BasicMeaning),
            "detailedMeaning" => Some(Self::DetailedMeaning),
            "usageExamples" => Some(Self::UsageExamples),
            "synonyms" => Some(Self::Synonyms),
            "collocations" => Some(Self::Collocations),
            _ => None,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One generated section's text, held only for the duration of a single
/// enrichment run.
#[derive(Debug, Clone)]
pub struct SectionResult {
    pub section: Section,
    pub text: String,
}

// =============================================================================
// Word Record
// =============================================================================

/// A persisted word record.
///
/// `text` is the identity: normalized (trimmed, lowercased) and unique.
/// `usage` mirrors `meaning` on every pipeline write for compatibility with
/// the sticker renderer. `scenarios` doubles as a lightweight progress
/// ledger: each completed deep section appends its tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: i64,
    pub text: String,
    pub meaning: String,
    pub chinese_meaning: String,
    pub usage: String,
    pub scenarios: Vec<String>,
    pub pronunciation: Option<String>,
    /// User-adjustable familiarity score; never touched by enrichment.
    pub rating: i32,
    pub is_processing: bool,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a fresh word record.
#[derive(Debug, Clone)]
pub struct NewWord {
    pub text: String,
    pub meaning: String,
    pub chinese_meaning: String,
    pub usage: String,
    pub scenarios: Vec<String>,
    pub pronunciation: Option<String>,
    pub rating: i32,
    pub is_processing: bool,
    pub processing_status: ProcessingStatus,
}

/// Partial update for a word record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct WordPatch {
    pub meaning: Option<String>,
    pub chinese_meaning: Option<String>,
    pub usage: Option<String>,
    pub scenarios: Option<Vec<String>>,
    pub pronunciation: Option<String>,
    pub rating: Option<i32>,
    pub is_processing: Option<bool>,
    pub processing_status: Option<ProcessingStatus>,
}

impl WordPatch {
    /// Patch setting the full rendered document (`meaning` plus its `usage`
    /// mirror) in one write.
    pub fn document(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            meaning: Some(content.clone()),
            usage: Some(content),
            ..Self::default()
        }
    }

    pub fn scenarios(mut self, scenarios: Vec<String>) -> Self {
        self.scenarios = Some(scenarios);
        self
    }

    pub fn status(mut self, status: ProcessingStatus) -> Self {
        self.processing_status = Some(status);
        self
    }

    pub fn processing(mut self, flag: bool) -> Self {
        self.is_processing = Some(flag);
        self
    }
}

/// Normalize raw user input into the canonical word identity.
pub fn normalize_word(raw: &str) -> String {
    raw.trim().to_lowercase()
}
