//! Instincts - Learned Behavior Library
//!
//! Turns tool-usage observation logs into persisted "instincts":
//! - Pattern detection over observation batches (sequences, error fixes,
//!   tool preferences)
//! - Confidence scoring with correction penalties, boosts, and time decay
//! - Clustering of related instincts into capability proposals
//! - Import/export of shareable instinct packs
//!
//! # Example
//!
//! ```ignore
//! use instincts::instinct::InstinctStore;
//! use instincts::patterns::{detect_all_patterns, load_observations};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = InstinctStore::new()?;
//!     let observations = load_observations(&store.observations_path())?;
//!     let patterns = detect_all_patterns(&observations, 3);
//!     println!("{} patterns detected", patterns.len());
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod confidence;
pub mod patterns;
pub mod instinct; // Must come after confidence since records carry scores
pub mod clustering;
pub mod config;
pub mod cli;

// Pipeline modules
pub mod observer; // Observation log -> patterns -> instinct records
pub mod porting;  // Import/export of instinct packs

// Re-export commonly used types for convenience
pub use confidence::{
    calculate_confidence,
    effective_confidence,
    ConfidenceFactors,
};

pub use patterns::{
    detect_all_patterns,
    load_observations,
    Observation,
    Pattern,
};

pub use instinct::{
    Instinct,
    InstinctStore,
};

pub use clustering::{
    Cluster,
    EvolutionEngine,
};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Learned Behavior Library", NAME, VERSION)
}
