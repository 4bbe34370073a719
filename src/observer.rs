//! Observer analysis cycle
//!
//! One batch pass: load the observation log, detect patterns, then create
//! new instincts or reinforce existing ones. Runs synchronously over
//! in-memory data; all I/O happens through the store before and after.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::clustering::EvolutionEngine;
use crate::config::Config;
use crate::instinct::{generate_instinct_id, Category, Instinct, InstinctStore};
use crate::patterns::{detect_all_patterns, load_observations, Pattern, PatternContent, PatternType};

/// Outcome of one analysis cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub observations: usize,
    pub patterns_detected: usize,
    pub created: usize,
    pub updated: usize,
    /// Domains whose clusters are ready for evolution, with member counts
    pub ready_domains: Vec<(String, usize)>,
}

/// Human-readable trigger text for a detected pattern.
pub fn pattern_trigger(pattern: &Pattern) -> String {
    match (&pattern.pattern_type, &pattern.content) {
        (PatternType::RepeatedSequence, PatternContent::Sequence(tools)) => {
            format!("when using {} sequence", tools.join(" → "))
        }
        (PatternType::ErrorFix, content) => format!("when {} error occurs", content),
        (PatternType::ToolPreference, _) => "when choosing tools".to_string(),
        (_, content) => format!("when {}", content),
    }
}

/// Convert a detected pattern into a fresh instinct record.
pub fn pattern_to_instinct(pattern: &Pattern) -> Instinct {
    let id_seed = match &pattern.content {
        PatternContent::Sequence(tools) => tools
            .iter()
            .take(3)
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("-"),
        PatternContent::Description(text) => text.clone(),
    };

    let kind = pattern.pattern_type.to_string().replace('_', " ");

    let mut instinct = Instinct::new(
        generate_instinct_id(&id_seed, &pattern.domain),
        pattern_trigger(pattern),
        pattern.confidence,
        pattern.domain.clone(),
    );
    instinct.evidence_count = pattern.evidence_count;
    instinct.action = format!("Apply learned {} pattern", kind);
    instinct.evidence = vec![format!("Detected in {} observations", pattern.evidence_count)];
    instinct
}

/// Run one observer cycle against the store.
pub fn run_cycle(store: &InstinctStore, config: &Config) -> Result<CycleReport> {
    let mut report = CycleReport::default();

    let observations = load_observations(&store.observations_path())?;
    report.observations = observations.len();
    if observations.is_empty() {
        debug!("No observations to analyze");
        return Ok(report);
    }

    let patterns = detect_all_patterns(&observations, config.detection.min_occurrences);
    report.patterns_detected = patterns.len();
    info!(
        "Detected {} patterns from {} observations",
        patterns.len(),
        observations.len()
    );
    if patterns.is_empty() {
        return Ok(report);
    }

    let existing = store.load_all()?;

    for pattern in patterns.iter().take(config.detection.max_patterns_per_cycle) {
        let trigger = pattern_trigger(pattern);

        if let Some(known) = existing.iter().find(|i| i.trigger == trigger) {
            let reinforced = known
                .clone()
                .with_evidence(format!("Reconfirmed at {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ")));
            let category = known.source_category.unwrap_or(Category::Personal);
            store.save(&reinforced, category)?;
            report.updated += 1;
        } else {
            let instinct = pattern_to_instinct(pattern);
            store.save(&instinct, Category::Personal)?;
            report.created += 1;
        }
    }

    // Check whether any domain is now ready to evolve
    let all = store.load_all()?;
    let mut engine = EvolutionEngine::new(
        config.evolution.min_cluster_size,
        config.evolution.min_avg_confidence,
    );
    engine.analyze(&all);
    report.ready_domains = engine
        .ready_clusters()
        .iter()
        .map(|c| (c.domain.clone(), c.count()))
        .collect();

    Ok(report)
}
