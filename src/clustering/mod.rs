//! Instinct clustering and evolution
//!
//! Groups same-domain instincts into clusters and decides which are large
//! and confident enough to propose as higher-level capabilities. Instincts
//! are read-only input here; clusters are recomputed on every analysis.

use serde::Serialize;
use std::collections::HashMap;

use crate::confidence::AUTO_APPROVE_THRESHOLD;
use crate::instinct::Instinct;

/// Minimum members before a domain group can become a cluster.
pub const MIN_INSTINCTS_FOR_CLUSTER: usize = 3;
/// Minimum mean confidence for cluster admission. Deliberately a separate
/// knob from `AUTO_APPROVE_THRESHOLD`; the defaults merely coincide.
pub const MIN_AVG_CONFIDENCE: f64 = 0.7;

/// Capability shape a cluster would evolve into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityType {
    Skill,
    Command,
    Agent,
}

impl std::fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityType::Skill => write!(f, "skill"),
            CapabilityType::Command => write!(f, "command"),
            CapabilityType::Agent => write!(f, "agent"),
        }
    }
}

/// An ephemeral group of same-domain instincts.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub domain: String,
    pub instincts: Vec<Instinct>,
    pub avg_confidence: f64,
    pub capability_type: CapabilityType,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.instincts.len()
    }

    /// Non-empty actions of all members.
    pub fn actions(&self) -> Vec<&str> {
        self.instincts
            .iter()
            .filter(|i| !i.action.is_empty())
            .map(|i| i.action.as_str())
            .collect()
    }

    /// Triggers of all members.
    pub fn triggers(&self) -> Vec<&str> {
        self.instincts.iter().map(|i| i.trigger.as_str()).collect()
    }
}

/// A rendered proposal for evolving a cluster into a capability.
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionSuggestion {
    pub name: String,
    #[serde(rename = "type")]
    pub capability_type: CapabilityType,
    pub description: String,
    pub domain: String,
    pub instinct_count: usize,
    pub avg_confidence: f64,
    pub triggers: Vec<String>,
    pub actions: Vec<String>,
}

/// Partition instincts by domain, preserving first-occurrence order.
pub fn group_by_domain(instincts: &[Instinct]) -> Vec<(String, Vec<&Instinct>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&Instinct>)> = Vec::new();

    for instinct in instincts {
        match index.get(instinct.domain.as_str()) {
            Some(&i) => groups[i].1.push(instinct),
            None => {
                index.insert(instinct.domain.as_str(), groups.len());
                groups.push((instinct.domain.clone(), vec![instinct]));
            }
        }
    }

    groups
}

/// Trigger keywords hinting at analysis-heavy work.
const COMPLEX_KEYWORDS: &[&str] = &["analyze", "research", "investigate", "design"];
/// Trigger keywords hinting at user-invoked tasks.
const COMMAND_KEYWORDS: &[&str] = &["run", "execute", "perform", "do"];
/// Trigger keywords hinting at automatic application.
const AUTO_KEYWORDS: &[&str] = &["when", "always", "automatically", "on"];

/// Classify what a group of instincts should evolve into.
///
/// Substring matches over lower-cased triggers; a trigger may count toward
/// several buckets. Complex outranks command when both clear the 30% bar.
pub fn determine_capability_type(instincts: &[&Instinct]) -> CapabilityType {
    let triggers: Vec<String> = instincts.iter().map(|i| i.trigger.to_lowercase()).collect();

    let hits = |keywords: &[&str]| {
        triggers
            .iter()
            .filter(|t| keywords.iter().any(|k| t.contains(k)))
            .count()
    };

    let complex_count = hits(COMPLEX_KEYWORDS);
    let command_count = hits(COMMAND_KEYWORDS);
    let _auto_count = hits(AUTO_KEYWORDS);

    let threshold = instincts.len() as f64 * 0.3;
    if complex_count as f64 > threshold {
        CapabilityType::Agent
    } else if command_count as f64 > threshold {
        CapabilityType::Command
    } else {
        CapabilityType::Skill
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build clusters from instincts.
///
/// A domain group is admitted when it has at least `min_size` members and
/// its mean confidence reaches `min_confidence`. The result is sorted by
/// average confidence, highest first.
pub fn create_clusters(
    instincts: &[Instinct],
    min_size: usize,
    min_confidence: f64,
) -> Vec<Cluster> {
    let mut clusters = Vec::new();

    for (domain, members) in group_by_domain(instincts) {
        if members.len() < min_size {
            continue;
        }

        let avg_confidence =
            members.iter().map(|i| i.confidence).sum::<f64>() / members.len() as f64;
        if avg_confidence < min_confidence {
            continue;
        }

        let capability_type = determine_capability_type(&members);

        clusters.push(Cluster {
            domain,
            instincts: members.into_iter().cloned().collect(),
            avg_confidence: round2(avg_confidence),
            capability_type,
        });
    }

    clusters.sort_by(|a, b| {
        b.avg_confidence
            .partial_cmp(&a.avg_confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    clusters
}

/// Merge clusters with similar domains.
///
/// TODO: semantic similarity merging; for now each domain stays its own
/// cluster, but callers already route through this hook.
pub fn merge_similar_clusters(clusters: Vec<Cluster>) -> Vec<Cluster> {
    clusters
}

/// Clusters eligible for promotion into a capability. An independent
/// re-check, since admission may run with a different threshold.
pub fn filter_ready_for_evolution(clusters: &[Cluster]) -> Vec<&Cluster> {
    clusters
        .iter()
        .filter(|c| c.count() >= MIN_INSTINCTS_FOR_CLUSTER && c.avg_confidence >= AUTO_APPROVE_THRESHOLD)
        .collect()
}

/// Name for the evolved capability: title-cased domain plus a type suffix.
pub fn generate_capability_name(cluster: &Cluster) -> String {
    let domain = cluster
        .domain
        .replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let suffix = match cluster.capability_type {
        CapabilityType::Skill => "Workflow",
        CapabilityType::Command => "Task",
        CapabilityType::Agent => "Specialist",
    };

    format!("{} {}", domain, suffix)
}

/// Description summarizing the cluster's behaviors.
pub fn generate_capability_description(cluster: &Cluster) -> String {
    let actions = cluster.actions();

    if actions.is_empty() {
        return format!(
            "Learned {} behaviors from {} patterns",
            cluster.domain,
            cluster.count()
        );
    }

    let mut text = actions.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
    if actions.len() > 2 {
        text.push_str(&format!(", and {} more behaviors", actions.len() - 2));
    }
    format!("Automated {} patterns: {}", cluster.domain, text)
}

/// Evolution engine: clusters instincts and caches the last analysis.
pub struct EvolutionEngine {
    min_cluster_size: usize,
    min_avg_confidence: f64,
    clusters: Vec<Cluster>,
}

impl Default for EvolutionEngine {
    fn default() -> Self {
        Self::new(MIN_INSTINCTS_FOR_CLUSTER, MIN_AVG_CONFIDENCE)
    }
}

impl EvolutionEngine {
    pub fn new(min_cluster_size: usize, min_avg_confidence: f64) -> Self {
        Self {
            min_cluster_size,
            min_avg_confidence,
            clusters: Vec::new(),
        }
    }

    /// Analyze instincts into clusters. Idempotent; replaces the cache.
    pub fn analyze(&mut self, instincts: &[Instinct]) -> &[Cluster] {
        let clusters = create_clusters(instincts, self.min_cluster_size, self.min_avg_confidence);
        self.clusters = merge_similar_clusters(clusters);
        &self.clusters
    }

    /// Clusters from the last analysis.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Clusters ready for evolution, from the last analysis.
    pub fn ready_clusters(&self) -> Vec<&Cluster> {
        filter_ready_for_evolution(&self.clusters)
    }

    /// Admitted clusters that still need more data before evolving.
    pub fn pending_clusters(&self) -> Vec<&Cluster> {
        self.clusters
            .iter()
            .filter(|c| {
                !(c.count() >= MIN_INSTINCTS_FOR_CLUSTER
                    && c.avg_confidence >= AUTO_APPROVE_THRESHOLD)
            })
            .collect()
    }

    /// Produce an evolution proposal for a cluster.
    pub fn suggest_evolution(&self, cluster: &Cluster) -> EvolutionSuggestion {
        EvolutionSuggestion {
            name: generate_capability_name(cluster),
            capability_type: cluster.capability_type,
            description: generate_capability_description(cluster),
            domain: cluster.domain.clone(),
            instinct_count: cluster.count(),
            avg_confidence: cluster.avg_confidence,
            triggers: cluster.triggers().iter().map(|t| t.to_string()).collect(),
            actions: cluster.actions().iter().map(|a| a.to_string()).collect(),
        }
    }
}
