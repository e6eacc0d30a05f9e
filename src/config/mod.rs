//! Configuration
//!
//! Typed configuration with a figment resolution chain:
//! defaults → global file → project file → environment.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{Config, EnrichConfig, LlmConfig, QueueConfig, StoreConfig};
