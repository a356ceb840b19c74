//! The pathway validation service.
//!
//! [`PathwayValidator`] runs the structural checks and the four validators in a
//! fixed order, scores the findings and caches the result:
//!
//! ```text
//! structural -> tag classes -> dependencies -> circular references -> conflicts -> score
//! ```

mod cache;
mod incremental;

pub use cache::*;
pub use incremental::*;

use pathway_catalog::{pathway_signature, Catalog, PathwayItem};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument, warn};

use crate::config::ValidatorConfig;
use crate::error::ValidationFault;
use crate::findings::{
    IssueKind, RuleOutcome, ScoringPreferences, ScoringWeights, Severity, Suggestion,
    SuggestionKind, ValidationIssue, ValidationResult,
};
use crate::rules::{
    CircularReferenceDetector, ConflictDetector, DependencyValidator, Selection, TagClassValidator,
};

/// Everything a validation call needs.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub fandom_id: String,
    pub pathway: Vec<PathwayItem>,
    pub catalog: Arc<Catalog>,
    pub metadata: HashMap<String, Value>,
    pub preferences: Option<ScoringPreferences>,
}

impl ValidationContext {
    pub fn new(fandom_id: impl Into<String>, catalog: Arc<Catalog>) -> Self {
        Self {
            fandom_id: fandom_id.into(),
            pathway: Vec::new(),
            catalog,
            metadata: HashMap::new(),
            preferences: None,
        }
    }

    /// Append an item, ordered after the existing ones.
    pub fn with_item(mut self, mut item: PathwayItem) -> Self {
        item.order = self.pathway.len();
        self.pathway.push(item);
        self
    }

    pub fn with_pathway(mut self, pathway: Vec<PathwayItem>) -> Self {
        self.pathway = pathway;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_preferences(mut self, preferences: ScoringPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Cache key: fandom, sorted pathway signature, the items in pathway order,
    /// then metadata and preference fingerprints when present.
    ///
    /// Order is part of the key because instance-limit targets and conflict
    /// sources follow pathway order.
    pub fn cache_key(&self) -> String {
        let ordered: Vec<String> = self.pathway.iter().map(PathwayItem::signature).collect();
        let mut key = format!(
            "{}|{}~{}",
            self.fandom_id,
            pathway_signature(&self.pathway),
            ordered.join(",")
        );

        if !self.metadata.is_empty() {
            let sorted: BTreeMap<&String, &Value> = self.metadata.iter().collect();
            key.push('@');
            key.push_str(&serde_json::to_string(&sorted).unwrap_or_default());
        }

        if let Some(preferences) = self.preferences.as_ref().filter(|p| !p.is_empty()) {
            key.push('#');
            key.push_str(&preferences.fingerprint());
        }

        key
    }
}

/// Validates pathways against a catalog.
///
/// Each instance owns its cache. Share one across threads behind an `Arc`.
#[derive(Debug)]
pub struct PathwayValidator {
    config: ValidatorConfig,
    cache: Option<ValidationCache>,
    tag_classes: TagClassValidator,
    dependencies: DependencyValidator,
    circular: CircularReferenceDetector,
    conflicts: ConflictDetector,
}

impl Default for PathwayValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl PathwayValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ValidationCache::from_config(&config.cache));

        Self {
            cache,
            tag_classes: TagClassValidator::new(),
            dependencies: DependencyValidator::new(),
            circular: CircularReferenceDetector::new(),
            conflicts: ConflictDetector::new(config.max_alternatives),
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The result cache, if caching is enabled.
    pub fn cache(&self) -> Option<&ValidationCache> {
        self.cache.as_ref()
    }

    /// Drop cached results for a fandom. Call this when its catalog changes.
    pub fn invalidate_fandom(&self, fandom_id: &str) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.invalidate_fandom(fandom_id))
    }

    /// Validate a pathway.
    ///
    /// Always returns a result. Internal faults and panics inside a validator
    /// produce an `internal_fault` result, which is never cached.
    #[instrument(
        skip(self, context),
        fields(fandom_id = %context.fandom_id, items = context.pathway.len())
    )]
    pub fn validate(&self, context: &ValidationContext) -> ValidationResult {
        let started = Instant::now();
        let key = self.cache.as_ref().map(|_| context.cache_key());

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                let mut result = ValidationResult::clone(&hit.result);
                result.performance.cache_hits = hit.hits;
                result.performance.validation_time_ms = elapsed_ms(started);
                return result;
            }
        }

        let mut result = match guarded(|| self.run_pipeline(context)) {
            Ok(result) => result,
            Err(fault) => {
                error!(fault = %fault, "Pathway validation failed internally");
                let mut result = ValidationResult::internal_fault(&fault);
                result.performance.validation_time_ms = elapsed_ms(started);
                return result;
            }
        };
        result.performance.validation_time_ms = elapsed_ms(started);

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, result.clone());
        }
        result
    }

    fn run_pipeline(&self, context: &ValidationContext) -> Result<ValidationResult, ValidationFault> {
        let catalog = context.catalog.as_ref();

        if context.pathway.is_empty() {
            let mut outcome = RuleOutcome::new();
            outcome.suggest(Suggestion::new(
                SuggestionKind::AddElement,
                "Start by adding a tag or plot block to your pathway",
            ));
            return Ok(ValidationResult::from_outcome(outcome, 100));
        }

        let selection = Selection::resolve(&context.pathway, catalog);
        let mut outcome = self.structural_checks(context, &selection);

        outcome.merge(self.tag_classes.validate(&selection, catalog, &context.metadata));
        outcome.merge(self.dependencies.validate(&selection, catalog));

        for cycle in self.circular.detect(&selection)? {
            outcome.conflict(cycle.to_conflict());
        }
        outcome.evaluated();

        outcome.merge(self.conflicts.validate(&selection, catalog));
        self.balance_suggestions(&selection, &mut outcome);
        outcome.conflicts.sort_by_key(|c| c.level);

        let weights = self.scoring_weights(context);
        let score = weights.score(&outcome.errors, &outcome.warnings, outcome.suggestions.len());

        let mut result = ValidationResult::from_outcome(outcome, score);
        if self.config.include_dependency_chain {
            result.dependency_chain = Some(self.dependencies.dependency_chain(&selection, catalog));
        }
        Ok(result)
    }

    fn scoring_weights(&self, context: &ValidationContext) -> ScoringWeights {
        match &context.preferences {
            Some(preferences) => preferences.apply(&self.config.scoring),
            None => self.config.scoring.clone(),
        }
    }

    fn structural_checks(&self, context: &ValidationContext, selection: &Selection<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::new();
        let pathway = &context.pathway;

        outcome.evaluated();
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for item in pathway {
            if !seen.insert(item.id.as_str()) && reported.insert(item.id.as_str()) {
                outcome.error(
                    ValidationIssue::new(
                        IssueKind::DuplicateItem,
                        Severity::High,
                        format!("'{}' appears more than once in the pathway", item.id),
                    )
                    .with_affected(item.id.clone()),
                );
            }
        }

        outcome.evaluated();
        if pathway.len() > self.config.max_pathway_length {
            warn!(
                items = pathway.len(),
                max = self.config.max_pathway_length,
                "Pathway exceeds recommended length"
            );
            outcome.warning(ValidationIssue::new(
                IssueKind::PathwayTooLong,
                Severity::Low,
                format!(
                    "Pathway has {} items; more than {} may slow down validation",
                    pathway.len(),
                    self.config.max_pathway_length
                ),
            ));
        }

        outcome.evaluated();
        for item in &selection.unresolved {
            outcome.warning(
                ValidationIssue::new(
                    IssueKind::UnresolvedReference,
                    Severity::Low,
                    format!("Unknown {} '{}'", item.item_type, item.id),
                )
                .with_affected(item.id.clone()),
            );
        }

        outcome
    }

    fn balance_suggestions(&self, selection: &Selection<'_>, outcome: &mut RuleOutcome) {
        if selection.len() < self.config.min_recommended_items {
            outcome.suggest(Suggestion::new(
                SuggestionKind::Balance,
                format!(
                    "Consider adding more elements; pathways work best with at least {}",
                    self.config.min_recommended_items
                ),
            ));
        }

        let has_tags = !selection.tag_ids.is_empty();
        let has_blocks = !selection.plot_blocks.is_empty();
        if has_tags && !has_blocks {
            outcome.suggest(Suggestion::new(
                SuggestionKind::Balance,
                "Add a plot block to give your tags some story structure",
            ));
        } else if has_blocks && !has_tags {
            outcome.suggest(Suggestion::new(
                SuggestionKind::Balance,
                "Add tags to set the tone of your plot blocks",
            ));
        }
    }
}

/// Run `f`, turning a panic into a [`ValidationFault::Panic`].
fn guarded<T, F>(f: F) -> Result<T, ValidationFault>
where
    F: FnOnce() -> Result<T, ValidationFault>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ValidationFault::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{ConflictKind, ErrorCategory, FindingLevel, ResolutionAction};
    use pathway_catalog::{MutualExclusionRule, PlotBlock, PlotBlockCondition, Tag, TagClass};
    use serde_json::json;

    fn hp_catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new()
                .with_tag_class(TagClass::new("ship", "Ships").with_mutual_exclusion(
                    MutualExclusionRule {
                        within_class: true,
                        ..Default::default()
                    },
                ))
                .with_tag(Tag::new("harry-hermione", "Harry/Hermione", "pairing").with_class("ship"))
                .with_tag(Tag::new("harry-ginny", "Harry/Ginny", "pairing").with_class("ship"))
                .with_tag(Tag::new("angst", "Angst", "genre"))
                .with_plot_block(
                    PlotBlock::new("romance", "Romance Arc", "romance").with_requires("cd"),
                )
                .with_plot_block(PlotBlock::new("cd", "Character Development", "arc"))
                .with_plot_block(PlotBlock::new("war", "War", "conflict").with_conflict("peace"))
                .with_plot_block(PlotBlock::new("peace", "Peace", "setting"))
                .with_plot_block(PlotBlock::new("truce", "Truce", "setting"))
                .with_plot_block(PlotBlock::new("x", "Loop X", "arc").with_requires("y"))
                .with_plot_block(PlotBlock::new("y", "Loop Y", "arc").with_requires("x"))
                .with_plot_block(PlotBlock::new("duel-1", "Duel", "action").with_max_instances(1))
                .with_plot_block(PlotBlock::new("duel-2", "Duel", "action"))
                .with_plot_block(PlotBlock::new("duel-3", "Duel", "action"))
                .with_condition(PlotBlockCondition::new("cond-a", "war", "Early").with_conflict("cond-b"))
                .with_condition(PlotBlockCondition::new("cond-b", "war", "Late")),
        )
    }

    fn context(items: Vec<PathwayItem>) -> ValidationContext {
        ValidationContext::new("harry-potter", hp_catalog()).with_pathway(items)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn uncached() -> PathwayValidator {
        PathwayValidator::new(ValidatorConfig::default().without_cache())
    }

    #[test]
    fn test_empty_pathway() {
        let result = PathwayValidator::default().validate(&context(vec![]));

        assert!(result.is_valid);
        assert_eq!(result.score, 100);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.suggestions.len(), 1);
    }

    #[test]
    fn test_harry_potter_mutual_exclusion() {
        let result = uncached().validate(&context(vec![
            PathwayItem::tag("harry-hermione", 0),
            PathwayItem::tag("harry-ginny", 1),
        ]));

        assert!(!result.is_valid);
        assert!(result.errors_of(IssueKind::MutualExclusion).count() >= 1);
        assert!(result.score < 100);
    }

    #[test]
    fn test_romance_arc_needs_character_development() {
        let validator = uncached();

        let result = validator.validate(&context(vec![PathwayItem::plot_block("romance", 0)]));
        assert!(!result.is_valid);
        let missing: Vec<_> = result.conflicts_of(ConflictKind::MissingRequirement).collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("Character Development"));
        assert_eq!(
            missing[0].resolution.as_ref().map(|r| r.action),
            Some(ResolutionAction::Add)
        );

        let result = validator.validate(&context(vec![
            PathwayItem::plot_block("romance", 0),
            PathwayItem::plot_block("cd", 1),
        ]));
        assert!(result.is_valid);
        assert_eq!(result.conflicts_of(ConflictKind::MissingRequirement).count(), 0);
    }

    #[test]
    fn test_direct_exclusion_is_symmetric() {
        let validator = uncached();
        let forward = validator.validate(&context(vec![
            PathwayItem::plot_block("war", 0),
            PathwayItem::plot_block("peace", 1),
        ]));
        let backward = validator.validate(&context(vec![
            PathwayItem::plot_block("peace", 0),
            PathwayItem::plot_block("war", 1),
        ]));

        for result in [&forward, &backward] {
            assert!(!result.is_valid);
            assert_eq!(result.conflicts_of(ConflictKind::DirectExclusion).count(), 1);
        }
        assert_eq!(forward.conflicts[0].id, backward.conflicts[0].id);
    }

    #[test]
    fn test_cycle_is_critical_and_terminates() {
        let result = uncached().validate(&context(vec![
            PathwayItem::plot_block("x", 0),
            PathwayItem::plot_block("y", 1),
        ]));

        assert!(!result.is_valid);
        let cycles: Vec<_> = result.errors_of(IssueKind::CircularReference).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].severity, Severity::Critical);
        assert_eq!(cycles[0].category, ErrorCategory::CircularDependency);
    }

    #[test]
    fn test_instance_limit_targets_excess() {
        let result = uncached().validate(&context(vec![
            PathwayItem::plot_block("duel-1", 0),
            PathwayItem::plot_block("duel-2", 1),
            PathwayItem::plot_block("duel-3", 2),
        ]));

        let limits: Vec<_> = result.conflicts_of(ConflictKind::InstanceLimit).collect();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0].targets.len(), 2);
    }

    #[test]
    fn test_condition_conflict_is_warning_only() {
        let result = uncached().validate(&context(vec![
            PathwayItem::plot_block("war", 0),
            PathwayItem::condition("cond-a", 1),
            PathwayItem::condition("cond-b", 2),
            PathwayItem::tag("angst", 3),
        ]));

        assert!(result.is_valid);
        let conflict = result
            .conflicts_of(ConflictKind::ConditionConflict)
            .next()
            .unwrap();
        assert_eq!(conflict.level, FindingLevel::Warning);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.conflict_id == Some(conflict.id)));
    }

    #[test]
    fn test_structural_findings() {
        let result = uncached().validate(&context(vec![
            PathwayItem::tag("angst", 0),
            PathwayItem::tag("angst", 1),
            PathwayItem::plot_block("nowhere", 2),
        ]));

        assert!(!result.is_valid);
        assert_eq!(result.errors_of(IssueKind::DuplicateItem).count(), 1);
        let unresolved: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.kind == IssueKind::UnresolvedReference)
            .collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].affected_ids, vec!["nowhere".to_string()]);
    }

    #[test]
    fn test_long_pathway_warning() {
        init_tracing();
        let config = ValidatorConfig {
            max_pathway_length: 2,
            ..ValidatorConfig::default()
        };
        let result = PathwayValidator::new(config).validate(&context(vec![
            PathwayItem::tag("angst", 0),
            PathwayItem::plot_block("cd", 1),
            PathwayItem::plot_block("truce", 2),
        ]));

        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.kind == IssueKind::PathwayTooLong));
    }

    #[test]
    fn test_clean_pathway_scores_full() {
        let result = uncached().validate(&context(vec![
            PathwayItem::tag("angst", 0),
            PathwayItem::plot_block("cd", 1),
            PathwayItem::plot_block("truce", 2),
        ]));

        assert!(result.is_valid);
        assert!(result.suggestions.is_empty());
        assert_eq!(result.score, 100);
        assert!(result.performance.rules_evaluated > 0);
    }

    #[test]
    fn test_balance_suggestions() {
        let result = uncached().validate(&context(vec![PathwayItem::tag("angst", 0)]));

        let balance = result
            .suggestions
            .iter()
            .filter(|s| s.kind == SuggestionKind::Balance)
            .count();
        assert_eq!(balance, 2);
    }

    #[test]
    fn test_repeat_validation_hits_cache() {
        init_tracing();
        let validator = PathwayValidator::default();
        let ctx = context(vec![
            PathwayItem::plot_block("war", 0),
            PathwayItem::plot_block("peace", 1),
        ]);

        let first = validator.validate(&ctx);
        let second = validator.validate(&ctx);
        let third = validator.validate(&ctx);

        assert!(first.same_findings(&second));
        assert!(second.same_findings(&third));
        assert_eq!(first.performance.cache_hits, 0);
        assert_eq!(second.performance.cache_hits, 1);
        assert_eq!(third.performance.cache_hits, 2);
    }

    #[test]
    fn test_cache_key_tracks_order() {
        let a = context(vec![PathwayItem::tag("angst", 0), PathwayItem::plot_block("cd", 1)]);
        let b = context(vec![PathwayItem::plot_block("cd", 0), PathwayItem::tag("angst", 1)]);
        assert_ne!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("harry-potter|plot_block:cd,tag:angst~"));
        assert_eq!(a.cache_key(), a.clone().cache_key());

        let c = a.clone().with_metadata("rating", json!("M"));
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_reordered_pathway_not_served_from_cache() {
        let validator = PathwayValidator::default();
        let forward = context(vec![
            PathwayItem::plot_block("duel-1", 0),
            PathwayItem::plot_block("duel-2", 1),
            PathwayItem::plot_block("duel-3", 2),
        ]);
        let backward = context(vec![
            PathwayItem::plot_block("duel-3", 0),
            PathwayItem::plot_block("duel-2", 1),
            PathwayItem::plot_block("duel-1", 2),
        ]);

        let first = validator.validate(&forward);
        let second = validator.validate(&backward);
        let fresh = uncached().validate(&backward);

        assert_eq!(second.performance.cache_hits, 0);
        assert!(second.same_findings(&fresh));

        let excess = |result: &ValidationResult| -> Vec<String> {
            result
                .conflicts_of(ConflictKind::InstanceLimit)
                .flat_map(|c| c.targets.iter().map(|t| t.id.clone()))
                .collect()
        };
        assert_eq!(excess(&first), vec!["duel-2", "duel-3"]);
        assert_eq!(excess(&second), vec!["duel-2", "duel-1"]);

        // Both orderings stay cached under the same fandom.
        assert_eq!(validator.invalidate_fandom("harry-potter"), 2);
    }

    #[test]
    fn test_preferences_are_cached_separately() {
        let validator = PathwayValidator::default();
        let base = context(vec![
            PathwayItem::plot_block("war", 0),
            PathwayItem::plot_block("peace", 1),
        ]);
        let strict = base.clone().with_preferences(ScoringPreferences {
            error_weights: Some(crate::findings::SeverityWeights {
                critical: 50,
                high: 50,
                medium: 50,
                low: 50,
            }),
            ..Default::default()
        });

        let normal = validator.validate(&base);
        let harsh = validator.validate(&strict);

        assert_eq!(harsh.performance.cache_hits, 0);
        assert!(harsh.score < normal.score);
        assert_eq!(validator.cache().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_invalidate_fandom() {
        let validator = PathwayValidator::default();
        let ctx = context(vec![PathwayItem::tag("angst", 0)]);

        validator.validate(&ctx);
        assert_eq!(validator.invalidate_fandom("harry-potter"), 1);
        assert_eq!(validator.validate(&ctx).performance.cache_hits, 0);
    }

    #[test]
    fn test_dependency_chain_attached_when_configured() {
        let validator = PathwayValidator::new(ValidatorConfig::default().without_cache().with_dependency_chain());
        let result = validator.validate(&context(vec![PathwayItem::plot_block("romance", 0)]));

        let chain = result.dependency_chain.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].name, "Character Development");
        assert_eq!(chain[1].level, 1);
    }

    #[test]
    fn test_guarded_converts_faults_and_panics() {
        let fault: Result<(), _> = guarded(|| Err(ValidationFault::Internal("broken".into())));
        assert_eq!(fault, Err(ValidationFault::Internal("broken".into())));

        let panicked: Result<(), _> = guarded(|| panic!("validator exploded"));
        assert_eq!(
            panicked,
            Err(ValidationFault::Panic("validator exploded".into()))
        );

        let result = ValidationResult::internal_fault(&panicked.unwrap_err());
        assert!(!result.is_valid);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let validator = Arc::new(PathwayValidator::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let validator = Arc::clone(&validator);
                std::thread::spawn(move || {
                    validator
                        .validate(&context(vec![PathwayItem::plot_block("romance", 0)]))
                        .is_valid
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.join().unwrap());
        }
    }
}
