//! Instinct records and their on-disk store
//!
//! An instinct is a persisted trigger/action heuristic with a confidence
//! score, stored one record per file in YAML frontmatter + Markdown format.

pub mod record;
pub mod store;

pub use record::{generate_instinct_id, Instinct, InstinctSource};
pub use store::{Category, InstinctStore};
