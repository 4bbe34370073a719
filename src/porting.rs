//! Import and export of instinct packs
//!
//! Packs are plain multi-record Markdown files, so exports from one
//! environment import cleanly into another. Import plans are computed
//! in memory first; nothing is written until the plan is applied.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use tracing::info;

use crate::instinct::{Category, Instinct, InstinctSource, InstinctStore};

/// Fetch pack content from a local file or an http(s) URL.
pub async fn fetch_source(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("instincts/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let response = client
            .get(source)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", source))?;
        response
            .error_for_status()
            .with_context(|| format!("Request to {} failed", source))?
            .text()
            .await
            .context("Failed to read response body")
    } else {
        let path = PathBuf::from(source);
        std::fs::read_to_string(&path)
            .with_context(|| format!("File not found: {}", path.display()))
    }
}

/// What an import would do, before any file is touched.
#[derive(Debug, Default)]
pub struct ImportPlan {
    /// Records with ids not seen before
    pub to_add: Vec<Instinct>,
    /// Records that beat an existing record's confidence
    pub to_update: Vec<Instinct>,
    /// Records already present with equal or higher confidence
    pub skipped: Vec<Instinct>,
}

impl ImportPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty()
    }
}

/// Categorize incoming records against the existing corpus and drop
/// anything under `min_confidence`.
pub fn plan_import(
    incoming: Vec<Instinct>,
    existing: &[Instinct],
    min_confidence: f64,
) -> ImportPlan {
    let mut plan = ImportPlan::default();

    for instinct in incoming {
        match existing.iter().find(|e| e.id == instinct.id) {
            Some(current) => {
                if instinct.confidence > current.confidence {
                    plan.to_update.push(instinct);
                } else {
                    plan.skipped.push(instinct);
                }
            }
            None => plan.to_add.push(instinct),
        }
    }

    plan.to_add.retain(|i| i.confidence >= min_confidence);
    plan.to_update.retain(|i| i.confidence >= min_confidence);
    plan
}

/// Write a planned import into the inherited directory, one file per
/// record, with source attribution in the evidence.
pub fn apply_import(
    store: &InstinctStore,
    plan: ImportPlan,
    source: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for mut instinct in plan.to_add.into_iter().chain(plan.to_update) {
        instinct.source = InstinctSource::Inherited;
        instinct
            .evidence
            .push(format!("Imported from {}", source));
        written.push(store.save(&instinct, Category::Inherited)?);
    }

    info!("Imported {} instincts from {}", written.len(), source);
    Ok(written)
}

/// Render instincts as a shareable pack with a header.
pub fn render_export(instincts: &[Instinct]) -> String {
    let mut output = format!(
        "# Instincts export\n# Date: {}\n# Total: {}\n\n",
        Local::now().format("%Y-%m-%dT%H:%M:%S"),
        instincts.len()
    );

    for instinct in instincts {
        output.push_str(&instinct.to_markdown());
        output.push('\n');
    }

    output
}
