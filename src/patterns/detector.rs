//! Pattern detectors over observation batches
//!
//! Three detector families share the same shape: scan the observations,
//! accumulate counts, emit patterns above a threshold. Sparse input means
//! fewer patterns, never an error.

use serde_json::json;
use std::collections::HashMap;

use super::observation::Observation;

/// Longest tool sequence considered by the sequence detector.
const MAX_SEQUENCE_LENGTH: usize = 5;

/// Minimum occurrences before a sequence becomes a pattern.
pub const DEFAULT_MIN_OCCURRENCES: u32 = 3;

/// Kind of detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    RepeatedSequence,
    ErrorFix,
    ToolPreference,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::RepeatedSequence => write!(f, "repeated_sequence"),
            PatternType::ErrorFix => write!(f, "error_fix"),
            PatternType::ToolPreference => write!(f, "tool_preference"),
        }
    }
}

/// The detected regularity itself: an ordered tool sequence or a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternContent {
    Sequence(Vec<String>),
    Description(String),
}

impl std::fmt::Display for PatternContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternContent::Sequence(tools) => write!(f, "{}", tools.join(" → ")),
            PatternContent::Description(text) => write!(f, "{}", text),
        }
    }
}

/// A detected behavioral pattern, produced fresh on every run.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub pattern_type: PatternType,
    pub content: PatternContent,
    pub confidence: f64,
    pub evidence_count: u32,
    pub domain: String,
    pub evidence: Vec<serde_json::Value>,
}

/// Counter that preserves first-encounter order, so tie-breaks and output
/// ordering stay deterministic across runs.
struct OrderedCounter<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u32)>,
}

impl<K: std::hash::Hash + Eq + Clone> OrderedCounter<K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn increment(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, 1));
            }
        }
    }

    fn into_entries(self) -> Vec<(K, u32)> {
        self.entries
    }
}

/// Partition observations by session key, preserving encounter order.
fn group_by_session(observations: &[Observation]) -> Vec<Vec<&Observation>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sessions: Vec<Vec<&Observation>> = Vec::new();

    for obs in observations {
        match index.get(obs.session.as_str()) {
            Some(&i) => sessions[i].push(obs),
            None => {
                index.insert(obs.session.as_str(), sessions.len());
                sessions.push(vec![obs]);
            }
        }
    }

    sessions
}

/// Sort a session's observations ascending by timestamp. Lexical ordering is
/// sufficient for ISO-style stamps; no timezone normalization here.
fn sort_by_timestamp<'a>(mut session: Vec<&'a Observation>) -> Vec<&'a Observation> {
    session.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    session
}

/// Count every contiguous tool subsequence of length `min_length..=5` across
/// all sessions.
pub fn extract_tool_sequences(
    observations: &[Observation],
    min_length: usize,
) -> Vec<(Vec<String>, u32)> {
    let mut sequences: OrderedCounter<Vec<String>> = OrderedCounter::new();

    for session in group_by_session(observations) {
        let sorted = sort_by_timestamp(session);
        let tools: Vec<&str> = sorted
            .iter()
            .filter(|obs| !obs.tool.is_empty())
            .map(|obs| obs.tool.as_str())
            .collect();

        for length in min_length..=MAX_SEQUENCE_LENGTH.min(tools.len()) {
            for window in tools.windows(length) {
                let seq: Vec<String> = window.iter().map(|t| t.to_string()).collect();
                sequences.increment(seq);
            }
        }
    }

    sequences.into_entries()
}

/// Detect tool sequences that repeat at least `min_occurrences` times.
pub fn detect_repeated_sequences(
    observations: &[Observation],
    min_occurrences: u32,
) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    for (seq, count) in extract_tool_sequences(observations, 2) {
        if count >= min_occurrences {
            let domain = infer_domain_from_sequence(&seq);
            patterns.push(Pattern {
                pattern_type: PatternType::RepeatedSequence,
                confidence: sequence_confidence(count),
                evidence_count: count,
                domain,
                evidence: vec![json!({ "sequence": seq, "count": count })],
                content: PatternContent::Sequence(seq),
            });
        }
    }

    patterns
}

/// Detect failed-tool to recovering-tool pairs.
///
/// For each failure, the first of the next 4 observations that reports
/// success or is a completion event counts as the recovery; pairs seen at
/// least twice across the whole corpus become patterns.
pub fn detect_error_fix_patterns(observations: &[Observation]) -> Vec<Pattern> {
    let mut pairs: OrderedCounter<(String, String)> = OrderedCounter::new();

    for session in group_by_session(observations) {
        let sorted = sort_by_timestamp(session);

        for (i, obs) in sorted.iter().enumerate() {
            if !obs.is_failure() {
                continue;
            }
            let failed_tool = obs.tool.clone();

            for next in sorted.iter().skip(i + 1).take(4) {
                if next.is_success() || next.is_completion() {
                    if !next.tool.is_empty() {
                        pairs.increment((failed_tool.clone(), next.tool.clone()));
                    }
                    break;
                }
            }
        }
    }

    let mut patterns = Vec::new();
    for ((failed, recovery), count) in pairs.into_entries() {
        if count >= 2 {
            patterns.push(Pattern {
                pattern_type: PatternType::ErrorFix,
                content: PatternContent::Description(format!("{} → {}", failed, recovery)),
                // Observed recoveries are reliable signals
                confidence: 0.7,
                evidence_count: count,
                domain: "debugging".to_string(),
                evidence: vec![json!({
                    "failed_tool": failed,
                    "recovery_tool": recovery,
                    "count": count,
                })],
            });
        }
    }

    patterns
}

/// Detect dominant tools: more than 20% of all usage and at least 5 uses.
pub fn detect_tool_preferences(observations: &[Observation]) -> Vec<Pattern> {
    let mut counts: OrderedCounter<String> = OrderedCounter::new();
    for obs in observations {
        if !obs.tool.is_empty() {
            counts.increment(obs.tool.clone());
        }
    }

    let mut entries = counts.into_entries();
    let total: u32 = entries.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return Vec::new();
    }

    // Ten most-used tools; stable sort keeps first-encounter order on ties
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(10);

    let mut patterns = Vec::new();
    for (tool, count) in entries {
        let ratio = count as f64 / total as f64;
        if ratio > 0.2 && count >= 5 {
            patterns.push(Pattern {
                pattern_type: PatternType::ToolPreference,
                content: PatternContent::Description(format!("Prefer {}", tool)),
                confidence: (0.5 + ratio).min(0.9),
                evidence_count: count,
                domain: "workflow".to_string(),
                evidence: vec![json!({
                    "tool": tool,
                    "usage_ratio": ratio,
                    "count": count,
                })],
            });
        }
    }

    patterns
}

/// Majority domain of a sequence's tools; earlier-encountered domain wins a tie.
fn infer_domain_from_sequence(sequence: &[String]) -> String {
    let mut counts: OrderedCounter<&str> = OrderedCounter::new();
    for tool in sequence {
        counts.increment(tool_domain(tool));
    }

    let mut best: Option<(&str, u32)> = None;
    for (domain, count) in counts.into_entries() {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((domain, count));
        }
    }

    best.map(|(domain, _)| domain.to_string())
        .unwrap_or_else(|| "workflow".to_string())
}

/// Fixed tool-to-domain lookup used for sequence domain inference.
fn tool_domain(tool: &str) -> &'static str {
    match tool {
        "Edit" | "Write" => "code-style",
        "Grep" => "debugging",
        "Read" | "Glob" | "Bash" => "workflow",
        _ => "workflow",
    }
}

/// Confidence step function for sequence occurrence counts.
fn sequence_confidence(count: u32) -> f64 {
    if count >= 10 {
        0.9
    } else if count >= 5 {
        0.7
    } else if count >= 3 {
        0.5
    } else {
        0.3
    }
}

/// Run every detector and return the combined list, highest confidence first.
/// The sort is stable, so equal-confidence patterns keep detector order.
pub fn detect_all_patterns(observations: &[Observation], min_occurrences: u32) -> Vec<Pattern> {
    let mut all = detect_repeated_sequences(observations, min_occurrences);
    all.extend(detect_error_fix_patterns(observations));
    all.extend(detect_tool_preferences(observations));

    all.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    all
}

/// Group patterns by their inferred domain, insertion-ordered.
pub fn group_patterns_by_domain(patterns: Vec<Pattern>) -> Vec<(String, Vec<Pattern>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Pattern>)> = Vec::new();

    for pattern in patterns {
        match index.get(&pattern.domain) {
            Some(&i) => groups[i].1.push(pattern),
            None => {
                index.insert(pattern.domain.clone(), groups.len());
                let domain = pattern.domain.clone();
                groups.push((domain, vec![pattern]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(timestamp: &str, tool: &str, session: &str) -> Observation {
        Observation {
            timestamp: timestamp.to_string(),
            event: "post_tool".to_string(),
            tool: tool.to_string(),
            session: session.to_string(),
            exit_code: None,
            input: None,
            output: None,
        }
    }

    fn obs_exit(timestamp: &str, tool: &str, session: &str, exit_code: &str) -> Observation {
        Observation {
            exit_code: Some(exit_code.to_string()),
            ..obs(timestamp, tool, session)
        }
    }

    #[test]
    fn test_repeated_sequence_across_sessions() {
        // Three sessions, each Read → Edit → Write
        let mut observations = Vec::new();
        for session in ["s1", "s2", "s3"] {
            observations.push(obs("2026-01-01T10:00:00Z", "Read", session));
            observations.push(obs("2026-01-01T10:00:05Z", "Edit", session));
            observations.push(obs("2026-01-01T10:00:10Z", "Write", session));
        }

        let patterns = detect_repeated_sequences(&observations, 3);
        assert!(!patterns.is_empty());

        let full = patterns
            .iter()
            .find(|p| matches!(&p.content, PatternContent::Sequence(s) if s.len() == 3))
            .expect("three-tool sequence not detected");
        match &full.content {
            PatternContent::Sequence(tools) => {
                assert!(tools.contains(&"Read".to_string()));
                assert!(tools.contains(&"Write".to_string()));
            }
            _ => unreachable!(),
        }
        assert_eq!(full.evidence_count, 3);
        assert_eq!(full.confidence, 0.5);
    }

    #[test]
    fn test_sequence_ordering_respects_timestamps() {
        // Out-of-order input must still yield the time-ordered sequence
        let observations = vec![
            obs("2026-01-01T10:00:10Z", "Write", "s1"),
            obs("2026-01-01T10:00:00Z", "Read", "s1"),
            obs("2026-01-01T10:00:05Z", "Edit", "s1"),
        ];
        let sequences = extract_tool_sequences(&observations, 2);
        let pairs: Vec<&Vec<String>> = sequences
            .iter()
            .filter(|(s, _)| s.len() == 2)
            .map(|(s, _)| s)
            .collect();
        assert!(pairs.contains(&&vec!["Read".to_string(), "Edit".to_string()]));
        assert!(pairs.contains(&&vec!["Edit".to_string(), "Write".to_string()]));
    }

    #[test]
    fn test_sequences_do_not_cross_sessions() {
        let observations = vec![
            obs("2026-01-01T10:00:00Z", "Read", "s1"),
            obs("2026-01-01T10:00:05Z", "Edit", "s2"),
        ];
        assert!(extract_tool_sequences(&observations, 2).is_empty());
    }

    #[test]
    fn test_error_fix_detection() {
        let mut observations = Vec::new();
        for session in ["s1", "s2"] {
            observations.push(obs_exit("2026-01-01T10:00:00Z", "Bash", session, "1"));
            observations.push(obs_exit("2026-01-01T10:00:05Z", "Edit", session, "0"));
        }

        let patterns = detect_error_fix_patterns(&observations);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_type, PatternType::ErrorFix);
        assert_eq!(patterns[0].confidence, 0.7);
        assert_eq!(patterns[0].domain, "debugging");
        assert_eq!(
            patterns[0].content,
            PatternContent::Description("Bash → Edit".to_string())
        );
    }

    #[test]
    fn test_error_fix_requires_two_occurrences() {
        let observations = vec![
            obs_exit("2026-01-01T10:00:00Z", "Bash", "s1", "1"),
            obs_exit("2026-01-01T10:00:05Z", "Edit", "s1", "0"),
        ];
        assert!(detect_error_fix_patterns(&observations).is_empty());
    }

    #[test]
    fn test_error_fix_scan_window_is_four() {
        let mut observations = vec![obs_exit("2026-01-01T10:00:00Z", "Bash", "s1", "1")];
        // Four pre-tool fillers without exit codes, then the success
        for i in 1..=4 {
            let mut filler = obs(&format!("2026-01-01T10:00:0{}Z", i), "Noise", "s1");
            filler.event = "pre_tool".to_string();
            observations.push(filler);
        }
        observations.push(obs_exit("2026-01-01T10:00:09Z", "Edit", "s1", "0"));

        // Recovery lands outside the 4-observation window
        assert!(detect_error_fix_patterns(&observations).is_empty());
    }

    #[test]
    fn test_tool_preference_even_split() {
        let mut observations = Vec::new();
        for i in 0..5 {
            observations.push(obs(&format!("2026-01-01T10:00:{:02}Z", i), "Edit", "s1"));
            observations.push(obs(&format!("2026-01-01T10:01:{:02}Z", i), "Read", "s1"));
        }

        let patterns = detect_tool_preferences(&observations);
        assert_eq!(patterns.len(), 2, "both tools sit at exactly 50% usage");
        for pattern in &patterns {
            assert_eq!(pattern.evidence_count, 5);
            // min(0.9, 0.5 + 0.5) caps at the ceiling
            assert!((pattern.confidence - 0.9).abs() < 1e-9);
            assert_eq!(pattern.domain, "workflow");
        }
    }

    #[test]
    fn test_tool_preference_needs_absolute_count() {
        // 4 uses is 100% share but below the absolute floor of 5
        let observations: Vec<Observation> = (0..4)
            .map(|i| obs(&format!("2026-01-01T10:00:{:02}Z", i), "Edit", "s1"))
            .collect();
        assert!(detect_tool_preferences(&observations).is_empty());
    }

    #[test]
    fn test_domain_inference_majority() {
        let seq = vec!["Edit".to_string(), "Write".to_string(), "Bash".to_string()];
        assert_eq!(infer_domain_from_sequence(&seq), "code-style");

        let seq = vec!["Grep".to_string(), "Read".to_string(), "Bash".to_string()];
        // workflow outnumbers debugging 2:1
        assert_eq!(infer_domain_from_sequence(&seq), "workflow");
    }

    #[test]
    fn test_domain_inference_tie_goes_to_first_encountered() {
        let seq = vec!["Read".to_string(), "Edit".to_string()];
        // workflow and code-style tie 1:1; Read's domain was seen first
        assert_eq!(infer_domain_from_sequence(&seq), "workflow");
    }

    #[test]
    fn test_detect_all_sorted_by_confidence() {
        let mut observations = Vec::new();
        for session in 0..3 {
            let name = format!("s{}", session);
            observations.push(obs("2026-01-01T10:00:00Z", "Read", &name));
            observations.push(obs("2026-01-01T10:00:05Z", "Edit", &name));
        }
        for i in 0..10 {
            observations.push(obs(&format!("2026-01-02T10:00:{:02}Z", i), "Grep", "s9"));
        }

        let patterns = detect_all_patterns(&observations, 3);
        assert!(!patterns.is_empty());
        for pair in patterns.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(detect_all_patterns(&[], 3).is_empty());
        assert!(detect_repeated_sequences(&[], 3).is_empty());
        assert!(detect_error_fix_patterns(&[]).is_empty());
        assert!(detect_tool_preferences(&[]).is_empty());
    }

    #[test]
    fn test_group_patterns_by_domain() {
        let observations: Vec<Observation> = (0..6)
            .map(|i| obs(&format!("2026-01-01T10:00:{:02}Z", i), "Grep", "s1"))
            .collect();
        let patterns = detect_all_patterns(&observations, 3);
        let groups = group_patterns_by_domain(patterns);
        for (domain, members) in &groups {
            for member in members {
                assert_eq!(&member.domain, domain);
            }
        }
    }
}
