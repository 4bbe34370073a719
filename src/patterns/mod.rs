//! Behavioral pattern detection
//!
//! Turns a stream of recorded tool-use observations into scored patterns:
//! repeated tool sequences, error-to-fix recoveries, and dominant-tool
//! preferences. Detection is a single synchronous pass over in-memory data.

pub mod detector;
pub mod observation;

pub use detector::{
    detect_all_patterns, detect_error_fix_patterns, detect_repeated_sequences,
    detect_tool_preferences, group_patterns_by_domain, Pattern, PatternContent, PatternType,
};
pub use observation::{load_observations, Observation};
