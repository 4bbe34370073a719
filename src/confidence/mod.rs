//! Confidence scoring for instincts
//!
//! Pure arithmetic over explicit inputs. Build-time scores live in the
//! [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`] band; the separate presentation-time
//! decay variant (staleness of already-persisted records) lives in [`decay`].

pub mod decay;

pub use decay::{effective_confidence, DEFAULT_DECAY_RATE};

/// Floor for every build-time confidence score.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Ceiling for every build-time confidence score.
pub const MAX_CONFIDENCE: f64 = 0.9;
/// Instincts at or above this are applied without confirmation.
pub const AUTO_APPROVE_THRESHOLD: f64 = 0.7;
/// Below this an instinct is considered tentative.
pub const TENTATIVE_THRESHOLD: f64 = 0.5;
/// Boundary between medium and high confidence.
pub const MODERATE_THRESHOLD: f64 = 0.7;

/// Factors feeding a full confidence calculation.
#[derive(Debug, Clone)]
pub struct ConfidenceFactors {
    pub occurrence_count: u32,
    pub user_corrections: u32,
    pub consistency_score: f64,
    pub recency_boost: f64,
    pub domain_relevance: f64,
}

impl Default for ConfidenceFactors {
    fn default() -> Self {
        Self {
            occurrence_count: 0,
            user_corrections: 0,
            consistency_score: 1.0,
            recency_boost: 0.0,
            domain_relevance: 1.0,
        }
    }
}

/// Human-readable confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "low"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::High => write!(f, "high"),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Base confidence from how often a pattern was observed.
pub fn calculate_base_confidence(occurrence_count: u32) -> f64 {
    if occurrence_count >= 10 {
        0.8
    } else if occurrence_count >= 5 {
        0.6
    } else if occurrence_count >= 3 {
        0.5
    } else {
        MIN_CONFIDENCE
    }
}

/// Reduce confidence for user corrections, 0.15 per correction.
pub fn apply_corrections(base_confidence: f64, correction_count: u32) -> f64 {
    let penalty = correction_count as f64 * 0.15;
    (base_confidence - penalty).max(MIN_CONFIDENCE)
}

/// Boost confidence when the pattern is highly consistent.
pub fn apply_consistency_boost(confidence: f64, consistency_score: f64) -> f64 {
    if consistency_score > 0.9 {
        (confidence + 0.1).min(MAX_CONFIDENCE)
    } else if consistency_score > 0.7 {
        (confidence + 0.05).min(MAX_CONFIDENCE)
    } else {
        confidence
    }
}

/// Compose all factors into a final score.
///
/// Order matters: base, correction penalty, consistency boost, recency
/// boost, domain relevance, final clamp.
pub fn calculate_confidence(factors: &ConfidenceFactors) -> f64 {
    let mut confidence = calculate_base_confidence(factors.occurrence_count);

    confidence = apply_corrections(confidence, factors.user_corrections);
    confidence = apply_consistency_boost(confidence, factors.consistency_score);

    // Recently observed patterns are more relevant
    confidence = (confidence + factors.recency_boost).min(MAX_CONFIDENCE);

    confidence *= factors.domain_relevance;

    round2(confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
}

/// Bucket a score into low/medium/high.
pub fn confidence_level(confidence: f64) -> ConfidenceLevel {
    if confidence >= AUTO_APPROVE_THRESHOLD {
        ConfidenceLevel::High
    } else if confidence >= TENTATIVE_THRESHOLD {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Whether an instinct can be applied without asking.
pub fn should_auto_apply(confidence: f64) -> bool {
    confidence >= AUTO_APPROVE_THRESHOLD
}

/// Linear confidence decay for instincts that have not been used.
///
/// No-op for non-positive elapsed time; never drops below the floor.
pub fn calculate_decay(current_confidence: f64, days_since_use: i64, decay_rate: f64) -> f64 {
    if days_since_use <= 0 {
        return current_confidence;
    }

    let decay_amount = days_since_use as f64 * decay_rate;
    (current_confidence - decay_amount).max(MIN_CONFIDENCE)
}

/// Weighted average used when merging two instincts into one.
pub fn calculate_merge_confidence(confidence1: f64, confidence2: f64, weight1: f64) -> f64 {
    let weight2 = 1.0 - weight1;
    let merged = confidence1 * weight1 + confidence2 * weight2;
    round2(merged.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
}

/// Average confidence for a cluster, with a small boost for larger clusters.
pub fn calculate_cluster_confidence(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return MIN_CONFIDENCE;
    }

    let avg = confidences.iter().sum::<f64>() / confidences.len() as f64;
    let cluster_boost = (confidences.len() as f64 * 0.02).min(0.1);
    round2((avg + cluster_boost).min(MAX_CONFIDENCE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_confidence_steps() {
        assert_eq!(calculate_base_confidence(0), 0.3);
        assert_eq!(calculate_base_confidence(1), 0.3);
        assert_eq!(calculate_base_confidence(3), 0.5);
        assert_eq!(calculate_base_confidence(4), 0.5);
        assert_eq!(calculate_base_confidence(5), 0.6);
        assert_eq!(calculate_base_confidence(9), 0.6);
        assert_eq!(calculate_base_confidence(10), 0.8);
        assert_eq!(calculate_base_confidence(20), 0.8);
    }

    #[test]
    fn test_corrections_penalty() {
        assert!((apply_corrections(0.7, 1) - 0.55).abs() < 1e-9);
        assert_eq!(apply_corrections(0.7, 100), MIN_CONFIDENCE);
        assert_eq!(apply_corrections(0.7, 0), 0.7);
    }

    #[test]
    fn test_consistency_boost() {
        assert!((apply_consistency_boost(0.5, 0.95) - 0.6).abs() < 1e-9);
        assert!((apply_consistency_boost(0.5, 0.8) - 0.55).abs() < 1e-9);
        assert_eq!(apply_consistency_boost(0.5, 0.5), 0.5);
        // Capped at the ceiling
        assert_eq!(apply_consistency_boost(0.89, 0.95), MAX_CONFIDENCE);
    }

    #[test]
    fn test_calculate_confidence_monotonic_in_occurrences() {
        let mut prev = 0.0;
        for count in [0, 3, 5, 10, 50] {
            let factors = ConfidenceFactors {
                occurrence_count: count,
                ..Default::default()
            };
            let c = calculate_confidence(&factors);
            assert!(c >= prev, "confidence decreased at {} occurrences", count);
            prev = c;
        }
    }

    #[test]
    fn test_calculate_confidence_monotonic_in_corrections() {
        let mut prev = f64::MAX;
        for corrections in 0..5 {
            let factors = ConfidenceFactors {
                occurrence_count: 10,
                user_corrections: corrections,
                ..Default::default()
            };
            let c = calculate_confidence(&factors);
            assert!(c <= prev, "confidence increased at {} corrections", corrections);
            prev = c;
        }
    }

    #[test]
    fn test_calculate_confidence_clamped() {
        let factors = ConfidenceFactors {
            occurrence_count: 100,
            consistency_score: 1.0,
            recency_boost: 1.0,
            domain_relevance: 10.0,
            ..Default::default()
        };
        let c = calculate_confidence(&factors);
        assert!(c <= MAX_CONFIDENCE);

        let factors = ConfidenceFactors {
            user_corrections: 100,
            domain_relevance: 0.0,
            ..Default::default()
        };
        let c = calculate_confidence(&factors);
        assert!(c >= MIN_CONFIDENCE);
    }

    #[test]
    fn test_decay_zero_days_is_noop() {
        assert_eq!(calculate_decay(0.8, 0, 0.02), 0.8);
        assert_eq!(calculate_decay(0.8, -5, 0.02), 0.8);
    }

    #[test]
    fn test_decay_converges_to_floor() {
        assert_eq!(calculate_decay(0.9, 10_000, 0.02), MIN_CONFIDENCE);
        assert_eq!(calculate_decay(0.9, 1, 100.0), MIN_CONFIDENCE);
    }

    #[test]
    fn test_merge_confidence() {
        assert!((calculate_merge_confidence(0.8, 0.6, 0.5) - 0.7).abs() < 1e-9);
        assert_eq!(calculate_merge_confidence(0.9, 0.9, 0.5), MAX_CONFIDENCE);
    }

    #[test]
    fn test_cluster_confidence() {
        // mean 0.7 + boost 0.06
        assert!((calculate_cluster_confidence(&[0.6, 0.7, 0.8]) - 0.76).abs() < 1e-9);
        assert_eq!(calculate_cluster_confidence(&[]), MIN_CONFIDENCE);
        // boost capped at 0.1, result capped at ceiling
        let many = vec![0.85; 20];
        assert_eq!(calculate_cluster_confidence(&many), MAX_CONFIDENCE);
    }

    #[test]
    fn test_confidence_level_buckets() {
        assert_eq!(confidence_level(0.8), ConfidenceLevel::High);
        assert_eq!(confidence_level(0.7), ConfidenceLevel::High);
        assert_eq!(confidence_level(0.6), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(0.4), ConfidenceLevel::Low);
        assert!(should_auto_apply(0.7));
        assert!(!should_auto_apply(0.69));
    }
}
