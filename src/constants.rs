//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Generation backend constants
pub mod llm {
    /// Default Ollama endpoint
    pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

    /// Default generation model
    pub const DEFAULT_MODEL: &str = "qwen3:1.7b";

    /// Request timeout for a single generation call (seconds). Local
    /// generation is slow; a full section can take minutes on CPU.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

    /// Replies shorter than this (after reasoning-markup stripping) are
    /// treated as empty and replaced with the section fallback.
    pub const MIN_RESPONSE_CHARS: usize = 5;
}

/// Job queue constants
pub mod queue {
    /// Interval between queue drain ticks (milliseconds)
    pub const TICK_INTERVAL_MS: u64 = 2000;

    /// Default maximum attempts per job before it is dropped
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
}

/// Enrichment pipeline constants
pub mod enrich {
    /// Delay between consecutive deep-section model calls (seconds).
    /// The backend serves one request at a time; this throttles load.
    pub const SECTION_DELAY_SECS: u64 = 3;

    /// Default familiarity rating for freshly created words
    pub const DEFAULT_RATING: i32 = 5;

    /// Progress fraction reserved for the fast path (the deep sections
    /// divide the remaining range up to [`PROGRESS_DEEP_END`]).
    pub const PROGRESS_FAST: u8 = 10;

    /// Progress fraction after the last deep section persisted
    pub const PROGRESS_DEEP_END: u8 = 90;
}

/// Scenario-ledger markers (stored alongside the per-section tags)
pub mod scenario {
    /// Marker present from creation: only the fast section exists yet.
    pub const FAST_PATH: &str = "basic-meaning";

    /// Markers written on successful completion of the deep job.
    pub const COMPLETED: [&str; 2] = ["multi-request", "completed"];

    /// Markers written when the deep job fails terminally.
    pub const FAILED: [&str; 2] = ["basic-meaning", "processing-failed"];
}
