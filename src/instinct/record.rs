//! Instinct record type and YAML-frontmatter codec
//!
//! Format:
//! ```markdown
//! ---
//! id: prefer-functional-style
//! trigger: when writing new functions
//! confidence: 0.7
//! domain: code-style
//! created: 2026-01-01T00:00:00Z
//! source: observation
//! evidence_count: 3
//! ---
//! # Prefer Functional Style
//!
//! ## Action
//! Use functional patterns over classes when appropriate.
//!
//! ## Evidence
//! - Observed in 5 different sessions
//! ```

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Where an instinct came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstinctSource {
    Observation,
    Imported,
    Inherited,
}

impl Default for InstinctSource {
    fn default() -> Self {
        InstinctSource::Observation
    }
}

impl std::fmt::Display for InstinctSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstinctSource::Observation => write!(f, "observation"),
            InstinctSource::Imported => write!(f, "imported"),
            InstinctSource::Inherited => write!(f, "inherited"),
        }
    }
}

/// A learned instinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instinct {
    pub id: String,
    pub trigger: String,
    pub confidence: f64,
    pub domain: String,
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<String>,
    #[serde(default)]
    pub source: InstinctSource,
    #[serde(default = "default_evidence_count")]
    pub evidence_count: u32,
    #[serde(skip)]
    pub action: String,
    #[serde(skip)]
    pub evidence: Vec<String>,
    /// File this record was loaded from; attached by the store, opaque here
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
    /// Storage category this record was loaded from; attached by the store
    #[serde(skip)]
    pub source_category: Option<super::store::Category>,
}

fn default_evidence_count() -> u32 {
    1
}

/// Frontmatter keys accepted when parsing; anything else is dropped.
const ALLOWED_KEYS: &[&str] = &[
    "id",
    "trigger",
    "confidence",
    "domain",
    "source",
    "created",
    "last_observed",
    "evidence_count",
    "source_repo",
];

static ACTION_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)## Action\s*\n(.*?)(?:\n##|\z)").unwrap());
static EVIDENCE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)## Evidence\s*\n(.*?)(?:\n##|\z)").unwrap());
static ID_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").unwrap());
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f]").unwrap());

impl Instinct {
    /// Create a new observation-sourced instinct created now.
    pub fn new(id: String, trigger: String, confidence: f64, domain: String) -> Self {
        Self {
            id,
            trigger,
            confidence,
            domain,
            created: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            last_observed: None,
            source: InstinctSource::Observation,
            evidence_count: 1,
            action: String::new(),
            evidence: Vec::new(),
            source_file: None,
            source_category: None,
        }
    }

    /// The timestamp decay should measure from: last_observed, else created.
    pub fn staleness_timestamp(&self) -> Option<&str> {
        self.last_observed
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(Some(self.created.as_str()))
            .filter(|t| !t.is_empty())
    }

    /// Render as YAML frontmatter + Markdown.
    pub fn to_markdown(&self) -> String {
        let mut frontmatter = format!(
            "id: {}\ntrigger: \"{}\"\nconfidence: {}\ndomain: {}\ncreated: {}\nsource: {}\nevidence_count: {}\n",
            self.id,
            self.trigger.replace('"', "\\\""),
            self.confidence,
            self.domain,
            self.created,
            self.source,
            self.evidence_count,
        );
        if let Some(ref last_observed) = self.last_observed {
            frontmatter.push_str(&format!("last_observed: {}\n", last_observed));
        }

        let title = title_case(&self.id.replace('-', " "));

        let action = if self.action.is_empty() {
            format!("When {}, apply this learned behavior.", self.trigger)
        } else {
            self.action.clone()
        };

        let evidence = if self.evidence.is_empty() {
            "- No evidence recorded".to_string()
        } else {
            self.evidence
                .iter()
                .map(|e| format!("- {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "---\n{}---\n\n# {}\n\n## Action\n{}\n\n## Evidence\n{}\n",
            frontmatter, title, action, evidence
        )
    }

    /// Parse a single record. `None` means the content is not a valid
    /// instinct file; callers skip and move on.
    pub fn from_markdown(content: &str) -> Option<Self> {
        let (frontmatter, body) = split_frontmatter(content)?;

        let mapping: serde_yaml::Mapping = serde_yaml::from_str(frontmatter).ok()?;
        let mut instinct = instinct_from_mapping(&mapping)?;

        instinct.action = extract_section(&ACTION_SECTION, body);
        instinct.evidence = extract_evidence(body);
        Some(instinct)
    }

    /// Parse every record out of a multi-record stream, leniently.
    ///
    /// Used for import/export payloads: repeated frontmatter blocks with
    /// Markdown bodies in between. Malformed blocks and records without an
    /// id are dropped with a warning.
    pub fn parse_many(content: &str) -> Vec<Self> {
        let mut instincts = Vec::new();
        let mut frontmatter_lines: Vec<&str> = Vec::new();
        let mut body_lines: Vec<&str> = Vec::new();
        let mut pending: Option<Instinct> = None;
        let mut in_frontmatter = false;

        let mut finish = |pending: &mut Option<Instinct>, body_lines: &mut Vec<&str>| {
            if let Some(mut instinct) = pending.take() {
                let body = body_lines.join("\n");
                instinct.action = extract_section(&ACTION_SECTION, &body);
                instinct.evidence = extract_evidence(&body);
                instincts.push(instinct);
            }
            body_lines.clear();
        };

        for line in content.lines() {
            if line.trim() == "---" {
                if in_frontmatter {
                    let block = frontmatter_lines.join("\n");
                    match serde_yaml::from_str::<serde_yaml::Mapping>(&block) {
                        Ok(mapping) => match instinct_from_mapping(&mapping) {
                            Some(instinct) => pending = Some(instinct),
                            None => warn!("Skipping instinct block without a valid id"),
                        },
                        Err(e) => warn!("Skipping malformed frontmatter block: {}", e),
                    }
                    frontmatter_lines.clear();
                    in_frontmatter = false;
                } else {
                    finish(&mut pending, &mut body_lines);
                    in_frontmatter = true;
                }
            } else if in_frontmatter {
                frontmatter_lines.push(line);
            } else {
                body_lines.push(line);
            }
        }
        finish(&mut pending, &mut body_lines);

        instincts
    }

    /// Record a new piece of evidence, returning the updated instinct.
    ///
    /// Accumulated evidence nudges confidence upward: +0.05 at 5 pieces
    /// (capped 0.8), +0.1 at 10 (capped 0.9).
    pub fn with_evidence(mut self, note: impl Into<String>) -> Self {
        self.evidence.push(note.into());
        self.evidence_count += 1;

        if self.evidence_count >= 10 {
            self.confidence = (self.confidence + 0.1).min(0.9);
        } else if self.evidence_count >= 5 {
            self.confidence = (self.confidence + 0.05).min(0.8);
        }

        self
    }
}

/// Split `---` delimited frontmatter from the Markdown body.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start();
    let rest = trimmed.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let frontmatter = rest[..end].trim();
    let body = rest[end + 4..].trim_start_matches('\n');
    Some((frontmatter, body))
}

/// Build an instinct from parsed frontmatter, keeping only allowed keys.
/// Returns `None` when the id is missing or the confidence is not a number
/// in [0, 1].
fn instinct_from_mapping(mapping: &serde_yaml::Mapping) -> Option<Instinct> {
    let get_str = |key: &str| -> Option<String> {
        if !ALLOWED_KEYS.contains(&key) {
            return None;
        }
        mapping
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| CONTROL_CHARS.replace_all(s, "").into_owned())
    };

    let id = get_str("id")?;
    if id.is_empty() {
        return None;
    }

    let confidence = match mapping.get("confidence") {
        Some(value) => {
            let number = value.as_f64().or_else(|| value.as_u64().map(|n| n as f64))?;
            if !(0.0..=1.0).contains(&number) {
                warn!("Rejecting instinct '{}': confidence {} out of range", id, number);
                return None;
            }
            number
        }
        None => 0.5,
    };

    let evidence_count = mapping
        .get("evidence_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as u32;

    let source = match get_str("source").as_deref() {
        Some("imported") => InstinctSource::Imported,
        Some("inherited") => InstinctSource::Inherited,
        _ => InstinctSource::Observation,
    };

    Some(Instinct {
        id,
        trigger: get_str("trigger").unwrap_or_default(),
        confidence,
        domain: get_str("domain").unwrap_or_else(|| "workflow".to_string()),
        created: get_str("created")
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        last_observed: get_str("last_observed"),
        source,
        evidence_count,
        action: String::new(),
        evidence: Vec::new(),
        source_file: None,
        source_category: None,
    })
}

fn extract_section(section: &Regex, body: &str) -> String {
    section
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn extract_evidence(body: &str) -> Vec<String> {
    let text = extract_section(&EVIDENCE_SECTION, body);
    text.lines()
        .filter(|line| line.trim_start().starts_with('-'))
        .map(|line| line.trim_start().trim_start_matches('-').trim().to_string())
        .filter(|line| !line.is_empty() && line != "No evidence recorded")
        .collect()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stop-words excluded from generated ids.
const ID_STOP_WORDS: &[&str] = &["when", "the", "for", "and", "with"];

/// Generate a short slug id from a trigger, unique via a UTC minute suffix.
pub fn generate_instinct_id(trigger: &str, domain: &str) -> String {
    let lowered = trigger.to_lowercase();
    let key_words: Vec<&str> = ID_WORDS
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !ID_STOP_WORDS.contains(w))
        .take(3)
        .collect();

    let base = if key_words.is_empty() {
        domain.to_string()
    } else {
        key_words.join("-")
    };

    let stamp = Utc::now().format("%Y%m%d%H%M");
    let id = format!("{}-{}", base, stamp);
    id.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Instinct {
        Instinct {
            action: "Use functional patterns over classes when appropriate.".to_string(),
            evidence: vec![
                "Observed in 5 different sessions".to_string(),
                "User consistently uses map/filter/reduce".to_string(),
            ],
            evidence_count: 5,
            ..Instinct::new(
                "prefer-functional-style".to_string(),
                "when writing new functions".to_string(),
                0.7,
                "code-style".to_string(),
            )
        }
    }

    #[test]
    fn test_markdown_round_trip() {
        let original = sample();
        let markdown = original.to_markdown();

        let parsed = Instinct::from_markdown(&markdown).expect("round trip failed");
        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.trigger, original.trigger);
        assert_eq!(parsed.confidence, original.confidence);
        assert_eq!(parsed.domain, original.domain);
        assert_eq!(parsed.evidence_count, original.evidence_count);
        assert_eq!(parsed.action, original.action);
        assert_eq!(parsed.evidence, original.evidence);
    }

    #[test]
    fn test_to_markdown_structure() {
        let markdown = sample().to_markdown();
        assert!(markdown.starts_with("---\n"));
        assert!(markdown.contains("# Prefer Functional Style"));
        assert!(markdown.contains("## Action"));
        assert!(markdown.contains("## Evidence"));
        assert!(markdown.contains("- Observed in 5 different sessions"));
    }

    #[test]
    fn test_empty_evidence_placeholder() {
        let mut instinct = sample();
        instinct.evidence.clear();
        let markdown = instinct.to_markdown();
        assert!(markdown.contains("- No evidence recorded"));

        let parsed = Instinct::from_markdown(&markdown).unwrap();
        assert!(parsed.evidence.is_empty());
    }

    #[test]
    fn test_from_markdown_rejects_garbage() {
        assert!(Instinct::from_markdown("just some text").is_none());
        assert!(Instinct::from_markdown("---\nid: x").is_none());
        assert!(Instinct::from_markdown("---\n: [unbalanced\n---\nbody").is_none());
    }

    #[test]
    fn test_from_markdown_requires_id() {
        let content = "---\ntrigger: when testing\nconfidence: 0.5\n---\n\nbody\n";
        assert!(Instinct::from_markdown(content).is_none());
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let content = "---\nid: bad\nconfidence: 3.5\n---\n\nbody\n";
        assert!(Instinct::from_markdown(content).is_none());
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let content =
            "---\nid: ok\ntrigger: when x\nconfidence: 0.6\nevil_key: payload\n---\n\nbody\n";
        let parsed = Instinct::from_markdown(content).unwrap();
        assert_eq!(parsed.id, "ok");
        assert_eq!(parsed.confidence, 0.6);
    }

    #[test]
    fn test_parse_many_multiple_records() {
        let content = format!(
            "# Instincts export\n\n{}\n{}",
            sample().to_markdown(),
            Instinct::new(
                "commit-often".to_string(),
                "when making progress".to_string(),
                0.6,
                "git".to_string(),
            )
            .to_markdown()
        );

        let parsed = Instinct::parse_many(&content);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "prefer-functional-style");
        assert_eq!(parsed[1].id, "commit-often");
    }

    #[test]
    fn test_parse_many_skips_bad_blocks() {
        let content = "---\n: [bad yaml\n---\nbody\n\n---\nid: good\nconfidence: 0.7\n---\nbody\n";
        let parsed = Instinct::parse_many(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "good");
    }

    #[test]
    fn test_with_evidence_increments_and_boosts() {
        let mut instinct = sample();
        instinct.evidence_count = 4;
        instinct.confidence = 0.6;

        let updated = instinct.with_evidence("Reconfirmed");
        assert_eq!(updated.evidence_count, 5);
        assert!((updated.confidence - 0.65).abs() < 1e-9);
        assert_eq!(updated.evidence.last().unwrap(), "Reconfirmed");

        let mut instinct = sample();
        instinct.evidence_count = 9;
        instinct.confidence = 0.85;
        let updated = instinct.with_evidence("Again");
        assert_eq!(updated.evidence_count, 10);
        assert_eq!(updated.confidence, 0.9);
    }

    #[test]
    fn test_generate_instinct_id() {
        let id = generate_instinct_id("when implementing new features", "testing");
        assert!(id.starts_with("implementing-new-features-"));
        assert!(id.len() <= 50);

        // Nothing but stop-words falls back to the domain
        let id = generate_instinct_id("when the and", "git");
        assert!(id.starts_with("git-"));
    }

    #[test]
    fn test_staleness_timestamp_fallback() {
        let mut instinct = sample();
        assert_eq!(instinct.staleness_timestamp(), Some(instinct.created.as_str()));

        instinct.last_observed = Some("2026-02-01T00:00:00Z".to_string());
        assert_eq!(instinct.staleness_timestamp(), Some("2026-02-01T00:00:00Z"));
    }
}
