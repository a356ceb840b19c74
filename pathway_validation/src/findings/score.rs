//! Compatibility score computation.

use serde::{Deserialize, Serialize};

use super::{Severity, ValidationIssue};

/// Points subtracted per finding, by severity.
///
/// All four tiers must be given when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub critical: i32,
    pub high: i32,
    pub medium: i32,
    pub low: i32,
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> i32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    fn error_defaults() -> Self {
        Self {
            critical: 25,
            high: 15,
            medium: 10,
            low: 5,
        }
    }

    fn warning_defaults() -> Self {
        // Warnings have no critical tier; treat it as high.
        Self {
            critical: 8,
            high: 8,
            medium: 5,
            low: 2,
        }
    }
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self::error_defaults()
    }
}

/// Weights used to turn findings into a 0-100 score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub errors: SeverityWeights,
    pub warnings: SeverityWeights,

    /// Added when there are no errors and no suggestions.
    pub clean_bonus: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            errors: SeverityWeights::error_defaults(),
            warnings: SeverityWeights::warning_defaults(),
            clean_bonus: 5,
        }
    }
}

impl ScoringWeights {
    /// Score before clamping. May fall below 0 or exceed 100.
    pub fn raw_score(
        &self,
        errors: &[ValidationIssue],
        warnings: &[ValidationIssue],
        suggestion_count: usize,
    ) -> i32 {
        let mut score = 100;
        for error in errors {
            score -= self.errors.weight(error.severity);
        }
        for warning in warnings {
            score -= self.warnings.weight(warning.severity);
        }
        if errors.is_empty() && suggestion_count == 0 {
            score += self.clean_bonus;
        }
        score
    }

    /// Score clamped to 0..=100.
    pub fn score(
        &self,
        errors: &[ValidationIssue],
        warnings: &[ValidationIssue],
        suggestion_count: usize,
    ) -> u8 {
        clamp_score(self.raw_score(errors, warnings, suggestion_count))
    }
}

pub fn clamp_score(raw: i32) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Caller-supplied overrides for scoring.
///
/// Results scored with different preferences are cached separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPreferences {
    #[serde(default)]
    pub error_weights: Option<SeverityWeights>,
    #[serde(default)]
    pub warning_weights: Option<SeverityWeights>,
    #[serde(default)]
    pub clean_bonus: Option<i32>,
}

impl ScoringPreferences {
    /// Apply the overrides on top of `base`.
    pub fn apply(&self, base: &ScoringWeights) -> ScoringWeights {
        ScoringWeights {
            errors: self.error_weights.unwrap_or(base.errors),
            warnings: self.warning_weights.unwrap_or(base.warnings),
            clean_bonus: self.clean_bonus.unwrap_or(base.clean_bonus),
        }
    }

    /// Stable string identifying these preferences in cache keys.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    pub fn is_empty(&self) -> bool {
        self == &ScoringPreferences::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::IssueKind;

    fn issue(severity: Severity) -> ValidationIssue {
        ValidationIssue::new(IssueKind::MutualExclusion, severity, "test")
    }

    #[test]
    fn test_clean_score_gets_bonus() {
        let weights = ScoringWeights::default();
        assert_eq!(weights.raw_score(&[], &[], 0), 105);
        assert_eq!(weights.score(&[], &[], 0), 100);
        assert_eq!(weights.raw_score(&[], &[], 1), 100);
    }

    #[test]
    fn test_error_and_warning_penalties() {
        let weights = ScoringWeights::default();
        let errors = vec![issue(Severity::High), issue(Severity::Low)];
        let warnings = vec![issue(Severity::Medium), issue(Severity::Low)];

        // 100 - 15 - 5 - 5 - 2
        assert_eq!(weights.raw_score(&errors, &warnings, 0), 73);
    }

    #[test]
    fn test_critical_error_costs_25() {
        let weights = ScoringWeights::default();
        let mut errors = vec![issue(Severity::Medium)];
        let before = weights.raw_score(&errors, &[], 2);

        errors.push(issue(Severity::Critical));
        let after = weights.raw_score(&errors, &[], 2);

        assert_eq!(before - after, 25);
    }

    #[test]
    fn test_score_clamps_at_zero() {
        let weights = ScoringWeights::default();
        let errors: Vec<_> = (0..10).map(|_| issue(Severity::Critical)).collect();

        assert!(weights.raw_score(&errors, &[], 0) < 0);
        assert_eq!(weights.score(&errors, &[], 0), 0);
    }

    #[test]
    fn test_preferences_override_and_fingerprint() {
        let prefs = ScoringPreferences {
            clean_bonus: Some(0),
            ..Default::default()
        };
        let weights = prefs.apply(&ScoringWeights::default());

        assert_eq!(weights.clean_bonus, 0);
        assert_eq!(weights.errors.critical, 25);
        assert_ne!(prefs.fingerprint(), ScoringPreferences::default().fingerprint());
        assert!(!prefs.is_empty());
        assert!(ScoringPreferences::default().is_empty());
    }
}
