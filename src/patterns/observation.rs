//! Observation records captured from tool usage
//!
//! Observations arrive as line-delimited JSON appended by the capture hook.
//! The loader is lossy on purpose: a malformed line is worth a warning,
//! never a failed run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

fn default_session() -> String {
    "default".to_string()
}

/// One recorded tool-use event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Sortable timestamp string (ISO-8601 preferred, not enforced)
    #[serde(default)]
    pub timestamp: String,
    /// Event kind: `pre_tool`/`tool_start` or `post_tool`/`tool_complete`
    #[serde(default, alias = "type")]
    pub event: String,
    /// Tool name, may be empty
    #[serde(default)]
    pub tool: String,
    /// Session grouping key
    #[serde(default = "default_session")]
    pub session: String,
    /// Exit code as reported by the tool ("0" = success)
    #[serde(default)]
    pub exit_code: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl Observation {
    /// Whether this observation carries a non-empty exit code other than "0".
    pub fn is_failure(&self) -> bool {
        match self.exit_code.as_deref() {
            Some(code) => !code.is_empty() && code != "0",
            None => false,
        }
    }

    /// Whether this observation explicitly reports success.
    pub fn is_success(&self) -> bool {
        self.exit_code.as_deref() == Some("0")
    }

    /// Whether this is a completion-type event.
    pub fn is_completion(&self) -> bool {
        self.event == "post_tool" || self.event == "tool_complete"
    }
}

/// Load observations from a JSONL file.
///
/// A missing file yields an empty list; a malformed line is skipped with a
/// warning and the remainder of the file is still processed.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open observations file: {}", path.display()))?;

    let mut observations = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Observation>(line) {
            Ok(obs) => observations.push(obs),
            Err(e) => {
                warn!("Malformed observation at line {}: {}", line_num + 1, e);
            }
        }
    }

    Ok(observations)
}
