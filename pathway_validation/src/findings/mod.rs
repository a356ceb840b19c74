//! Findings - the errors, warnings, suggestions and conflicts a validation produces.
//!
//! Everything here is plain data. Results are built once per validation call and
//! never mutated afterwards (the cache hands out copies).

mod score;

pub use score::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationFault;
use crate::rules::DependencyLevel;

/// Impact of a finding on the compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Whether a conflict blocks the pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingLevel {
    Error,
    Warning,
}

/// Top-level taxonomy of validation problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Structural,
    TagRuleViolation,
    PlotBlockConflict,
    CircularDependency,
    InternalFault,
}

/// The specific rule a finding comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    // Structural
    DuplicateItem,
    PathwayTooLong,
    UnresolvedReference,

    // Tag class rules
    MutualExclusion,
    InstanceLimit,
    RequiredContext,
    CategoryRestriction,
    MissingDependency,

    // Plot block conflicts
    DirectExclusion,
    CategoryExclusion,
    ConditionConflict,
    MissingRequirement,

    CircularReference,
    InternalFault,
}

impl IssueKind {
    /// The category a finding of this kind belongs to when raised by its usual validator.
    pub fn category(&self) -> ErrorCategory {
        match self {
            IssueKind::DuplicateItem | IssueKind::PathwayTooLong | IssueKind::UnresolvedReference => {
                ErrorCategory::Structural
            }
            IssueKind::MutualExclusion
            | IssueKind::InstanceLimit
            | IssueKind::RequiredContext
            | IssueKind::CategoryRestriction
            | IssueKind::MissingDependency => ErrorCategory::TagRuleViolation,
            IssueKind::DirectExclusion
            | IssueKind::CategoryExclusion
            | IssueKind::ConditionConflict
            | IssueKind::MissingRequirement => ErrorCategory::PlotBlockConflict,
            IssueKind::CircularReference => ErrorCategory::CircularDependency,
            IssueKind::InternalFault => ErrorCategory::InternalFault,
        }
    }
}

/// An error or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,

    /// Ids of the pathway elements involved, as supplied (unresolved ids included).
    #[serde(default)]
    pub affected_ids: Vec<String>,

    /// Set when this issue mirrors an entry of `conflicts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_id: Option<Uuid>,
}

impl ValidationIssue {
    /// Create a new issue in the kind's default category.
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            category: kind.category(),
            severity,
            message: message.into(),
            affected_ids: Vec::new(),
            conflict_id: None,
        }
    }

    /// Add an affected element id.
    pub fn with_affected(mut self, id: impl Into<String>) -> Self {
        self.affected_ids.push(id.into());
        self
    }

    /// Add several affected element ids.
    pub fn with_affected_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Override the category.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }
}

/// Kinds of non-blocking suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    AddElement,
    RemoveElement,
    Balance,
    Enhancement,
}

/// A non-blocking improvement hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub message: String,
    #[serde(default)]
    pub target_ids: Vec<String>,
}

impl Suggestion {
    pub fn new(kind: SuggestionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            target_ids: Vec::new(),
        }
    }

    pub fn with_target(mut self, id: impl Into<String>) -> Self {
        self.target_ids.push(id.into());
        self
    }
}

/// The kinds of conflicts between selected elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DirectExclusion,
    CategoryExclusion,
    InstanceLimit,
    ConditionConflict,
    MissingRequirement,
    CircularReference,
}

impl ConflictKind {
    /// The issue kind used when this conflict is mirrored into errors or warnings.
    pub fn issue_kind(&self) -> IssueKind {
        match self {
            ConflictKind::DirectExclusion => IssueKind::DirectExclusion,
            ConflictKind::CategoryExclusion => IssueKind::CategoryExclusion,
            ConflictKind::InstanceLimit => IssueKind::InstanceLimit,
            ConflictKind::ConditionConflict => IssueKind::ConditionConflict,
            ConflictKind::MissingRequirement => IssueKind::MissingRequirement,
            ConflictKind::CircularReference => IssueKind::CircularReference,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DirectExclusion => "direct_exclusion",
            ConflictKind::CategoryExclusion => "category_exclusion",
            ConflictKind::InstanceLimit => "instance_limit",
            ConflictKind::ConditionConflict => "condition_conflict",
            ConflictKind::MissingRequirement => "missing_requirement",
            ConflictKind::CircularReference => "circular_reference",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            ConflictKind::CircularReference => ErrorCategory::CircularDependency,
            _ => ErrorCategory::PlotBlockConflict,
        }
    }
}

/// A reference to a pathway element, with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: String,
    pub name: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What a consumer should do to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionAction {
    Remove,
    Replace,
    Modify,
    Add,
}

/// A machine-actionable fix for a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub action: ResolutionAction,
    pub target_id: String,
    #[serde(default)]
    pub alternative_ids: Vec<String>,
    pub reason: String,
}

impl ConflictResolution {
    pub fn new(action: ResolutionAction, target_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action,
            target_id: target_id.into(),
            alternative_ids: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn with_alternatives(mut self, alternative_ids: Vec<String>) -> Self {
        self.alternative_ids = alternative_ids;
        self
    }
}

/// A detected incompatibility between selected elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Derived from the kind and the involved ids, so it is stable across calls.
    pub id: Uuid,
    pub kind: ConflictKind,
    pub level: FindingLevel,
    pub severity: Severity,
    pub message: String,
    pub source: ElementRef,
    pub targets: Vec<ElementRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
    pub can_auto_fix: bool,
}

impl Conflict {
    /// Create a conflict; `key` identifies it uniquely within its kind.
    pub fn new(
        kind: ConflictKind,
        key: &str,
        level: FindingLevel,
        severity: Severity,
        message: impl Into<String>,
        source: ElementRef,
    ) -> Self {
        let name = format!("{}:{}", kind.as_str(), key);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
            kind,
            level,
            severity,
            message: message.into(),
            source,
            targets: Vec::new(),
            resolution: None,
            can_auto_fix: false,
        }
    }

    pub fn with_target(mut self, target: ElementRef) -> Self {
        self.targets.push(target);
        self
    }

    /// Attach a resolution. Conflicts with a resolution can be fixed automatically.
    pub fn with_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = Some(resolution);
        self.can_auto_fix = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == FindingLevel::Error
    }

    /// The error or warning that mirrors this conflict.
    pub fn to_issue(&self) -> ValidationIssue {
        let mut issue = ValidationIssue::new(self.kind.issue_kind(), self.severity, self.message.clone())
            .with_category(self.kind.category())
            .with_affected(self.source.id.clone())
            .with_affected_ids(self.targets.iter().map(|t| t.id.clone()));
        issue.conflict_id = Some(self.id);
        issue
    }
}

/// Sorted key for an unordered pair, so (a, b) and (b, a) collapse.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// Accumulated output of one or more validators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<Suggestion>,
    pub conflicts: Vec<Conflict>,
    pub rules_evaluated: usize,
}

impl RuleOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn suggest(&mut self, suggestion: Suggestion) {
        self.suggestions.push(suggestion);
    }

    /// Record a conflict and mirror it into errors or warnings by level.
    pub fn conflict(&mut self, conflict: Conflict) {
        let issue = conflict.to_issue();
        match conflict.level {
            FindingLevel::Error => self.errors.push(issue),
            FindingLevel::Warning => self.warnings.push(issue),
        }
        self.conflicts.push(conflict);
    }

    /// Count one evaluated rule.
    pub fn evaluated(&mut self) {
        self.rules_evaluated += 1;
    }

    /// Append another outcome to this one.
    pub fn merge(&mut self, other: RuleOutcome) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.suggestions.extend(other.suggestions);
        self.conflicts.extend(other.conflicts);
        self.rules_evaluated += other.rules_evaluated;
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Timing and work counters for a validation call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Wall-clock time in milliseconds.
    #[serde(rename = "validationTime")]
    pub validation_time_ms: f64,
    pub rules_evaluated: usize,
    pub cache_hits: u64,
}

/// The outcome of validating a pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff there are no errors.
    pub is_valid: bool,
    /// Compatibility score, 0-100.
    pub score: u8,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<Suggestion>,
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_chain: Option<Vec<DependencyLevel>>,
    pub performance: PerformanceMetrics,
}

impl ValidationResult {
    /// Build a result from accumulated findings and a computed score.
    pub fn from_outcome(outcome: RuleOutcome, score: u8) -> Self {
        Self {
            is_valid: outcome.errors.is_empty(),
            score,
            errors: outcome.errors,
            warnings: outcome.warnings,
            suggestions: outcome.suggestions,
            conflicts: outcome.conflicts,
            dependency_chain: None,
            performance: PerformanceMetrics {
                rules_evaluated: outcome.rules_evaluated,
                ..Default::default()
            },
        }
    }

    /// The result returned when validation itself failed.
    pub fn internal_fault(fault: &ValidationFault) -> Self {
        let issue = ValidationIssue::new(
            IssueKind::InternalFault,
            Severity::Critical,
            format!("Validation could not be completed: {}", fault),
        );
        Self {
            is_valid: false,
            score: 0,
            errors: vec![issue],
            warnings: Vec::new(),
            suggestions: Vec::new(),
            conflicts: Vec::new(),
            dependency_chain: None,
            performance: PerformanceMetrics::default(),
        }
    }

    /// Compare everything except the performance metrics.
    pub fn same_findings(&self, other: &ValidationResult) -> bool {
        self.is_valid == other.is_valid
            && self.score == other.score
            && self.errors == other.errors
            && self.warnings == other.warnings
            && self.suggestions == other.suggestions
            && self.conflicts == other.conflicts
            && self.dependency_chain == other.dependency_chain
    }

    /// Errors of a given kind.
    pub fn errors_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Conflicts of a given kind.
    pub fn conflicts_of(&self, kind: ConflictKind) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(move |c| c.kind == kind)
    }
}
