//! Tag class rule evaluation.
//!
//! Every tag class referenced by at least one applied tag is evaluated on its own,
//! in the order the classes are first referenced by the pathway.

use pathway_catalog::{
    Catalog, CategoryRestrictionRule, DependencyRule, InstanceLimitRule, MutualExclusionRule,
    RequiredContextRule, Tag, TagClass, TagClassRule,
};
use serde_json::Value;
use std::collections::HashMap;

use super::Selection;
use crate::findings::{IssueKind, RuleOutcome, Severity, Suggestion, SuggestionKind, ValidationIssue};

/// Evaluates [`TagClass`] validation rules against the applied tags.
#[derive(Debug, Clone, Default)]
pub struct TagClassValidator;

impl TagClassValidator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all referenced tag classes.
    pub fn validate(
        &self,
        selection: &Selection<'_>,
        catalog: &Catalog,
        metadata: &HashMap<String, Value>,
    ) -> RuleOutcome {
        let mut outcome = RuleOutcome::new();

        for class in referenced_classes(selection, catalog) {
            let members = selection.tags_in_class(&class.id);
            let ctx = ClassContext {
                class,
                members: &members,
                selection,
                catalog,
                metadata,
            };

            for rule in class.rules() {
                outcome.evaluated();
                match rule {
                    TagClassRule::MutualExclusion(rule) => ctx.mutual_exclusion(rule, &mut outcome),
                    TagClassRule::InstanceLimits(rule) => ctx.instance_limits(rule, &mut outcome),
                    TagClassRule::RequiredContext(rule) => ctx.required_context(rule, &mut outcome),
                    TagClassRule::CategoryRestrictions(rule) => {
                        ctx.category_restrictions(rule, &mut outcome)
                    }
                    TagClassRule::Dependencies(rule) => ctx.dependencies(rule, &mut outcome),
                }
            }
        }

        outcome
    }
}

/// Tag classes referenced by applied tags, in first-reference order.
fn referenced_classes<'a>(selection: &Selection<'a>, catalog: &'a Catalog) -> Vec<&'a TagClass> {
    let mut classes: Vec<&TagClass> = Vec::new();
    for tag in &selection.tags {
        let Some(class_id) = tag.tag_class_id.as_deref() else {
            continue;
        };
        let Some(class) = catalog.tag_class(class_id) else {
            continue;
        };
        if !classes.iter().any(|c| c.id == class.id) {
            classes.push(class);
        }
    }
    classes
}

struct ClassContext<'s, 'a> {
    class: &'a TagClass,
    members: &'s [&'a Tag],
    selection: &'s Selection<'a>,
    catalog: &'a Catalog,
    metadata: &'s HashMap<String, Value>,
}

impl ClassContext<'_, '_> {
    fn class_name(&self) -> &str {
        self.class.display_name()
    }

    fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|t| t.id.clone()).collect()
    }

    fn mutual_exclusion(&self, rule: &MutualExclusionRule, outcome: &mut RuleOutcome) {
        if rule.within_class && self.members.len() > 1 {
            let names: Vec<&str> = self.members.iter().map(|t| t.name.as_str()).collect();
            outcome.error(
                ValidationIssue::new(
                    IssueKind::MutualExclusion,
                    Severity::High,
                    format!(
                        "Only one '{}' tag may be applied, found {}: {}",
                        self.class_name(),
                        self.members.len(),
                        names.join(", ")
                    ),
                )
                .with_affected_ids(self.member_ids()),
            );
        }

        for tag_id in &rule.conflicting_tags {
            if !self.selection.has_tag(tag_id) {
                continue;
            }
            outcome.error(
                ValidationIssue::new(
                    IssueKind::MutualExclusion,
                    Severity::High,
                    format!(
                        "'{}' cannot be combined with tags of class '{}'",
                        self.catalog.display_name(tag_id),
                        self.class_name()
                    ),
                )
                .with_affected(tag_id.clone())
                .with_affected_ids(self.member_ids()),
            );
        }

        for class_id in &rule.conflicting_classes {
            if class_id == &self.class.id {
                continue;
            }
            let offenders: Vec<String> = self
                .selection
                .tags_in_class(class_id)
                .iter()
                .map(|t| t.id.clone())
                .collect();
            if offenders.is_empty() {
                continue;
            }
            let other_name = self
                .catalog
                .tag_class(class_id)
                .map(|c| if c.name.is_empty() { c.id.as_str() } else { c.name.as_str() })
                .unwrap_or(class_id.as_str());
            outcome.error(
                ValidationIssue::new(
                    IssueKind::MutualExclusion,
                    Severity::High,
                    format!(
                        "Tags of class '{}' cannot be combined with tags of class '{}'",
                        self.class_name(),
                        other_name
                    ),
                )
                .with_affected_ids(self.member_ids())
                .with_affected_ids(offenders),
            );
        }
    }

    fn instance_limits(&self, rule: &InstanceLimitRule, outcome: &mut RuleOutcome) {
        let count = self.members.len();
        let mut violations = Vec::new();

        if let Some(max) = rule.max_instances {
            if count > max {
                violations.push(format!("at most {} allowed", max));
            }
        }
        if let Some(min) = rule.min_instances {
            if count < min {
                violations.push(format!("at least {} required", min));
            }
        }
        if let Some(exact) = rule.exact_instances {
            if count != exact {
                violations.push(format!("exactly {} required", exact));
            }
        }

        for violation in violations {
            outcome.error(
                ValidationIssue::new(
                    IssueKind::InstanceLimit,
                    Severity::Medium,
                    format!(
                        "{} '{}' tag(s) applied, {}",
                        count,
                        self.class_name(),
                        violation
                    ),
                )
                .with_affected_ids(self.member_ids()),
            );
        }
    }

    fn required_context(&self, rule: &RequiredContextRule, outcome: &mut RuleOutcome) {
        for tag_id in &rule.required_tags {
            if self.selection.has_tag(tag_id) {
                continue;
            }
            outcome.error(
                ValidationIssue::new(
                    IssueKind::RequiredContext,
                    Severity::Medium,
                    format!(
                        "'{}' tags require the tag '{}'",
                        self.class_name(),
                        self.catalog.display_name(tag_id)
                    ),
                )
                .with_affected(tag_id.clone()),
            );
        }

        for class_id in &rule.required_classes {
            if self.selection.has_tag_in_class(class_id) {
                continue;
            }
            outcome.error(
                ValidationIssue::new(
                    IssueKind::RequiredContext,
                    Severity::Medium,
                    format!(
                        "'{}' tags require at least one tag of class '{}'",
                        self.class_name(),
                        class_id
                    ),
                )
                .with_affected_ids(self.member_ids()),
            );
        }

        // Sort keys so findings do not depend on map iteration order.
        let mut keys: Vec<&String> = rule.required_metadata.keys().collect();
        keys.sort();
        for key in keys {
            let expected = &rule.required_metadata[key];
            let message = match self.metadata.get(key) {
                None => format!("'{}' tags require metadata '{}'", self.class_name(), key),
                Some(actual) if !expected.is_null() && actual != expected => format!(
                    "'{}' tags require metadata '{}' = {}, found {}",
                    self.class_name(),
                    key,
                    expected,
                    actual
                ),
                Some(_) => continue,
            };
            outcome.error(
                ValidationIssue::new(IssueKind::RequiredContext, Severity::Medium, message)
                    .with_affected_ids(self.member_ids()),
            );
        }
    }

    fn category_restrictions(&self, rule: &CategoryRestrictionRule, outcome: &mut RuleOutcome) {
        for tag in self.members {
            let category = tag.category.as_str();
            if !rule.applicable_categories.is_empty()
                && !rule.applicable_categories.iter().any(|c| c == category)
            {
                outcome.error(
                    ValidationIssue::new(
                        IssueKind::CategoryRestriction,
                        Severity::Medium,
                        format!(
                            "'{}' has category '{}', which is not allowed for class '{}'",
                            tag.name,
                            category,
                            self.class_name()
                        ),
                    )
                    .with_affected(tag.id.clone()),
                );
            }
            if rule.excluded_categories.iter().any(|c| c == category) {
                outcome.error(
                    ValidationIssue::new(
                        IssueKind::CategoryRestriction,
                        Severity::Medium,
                        format!(
                            "'{}' has category '{}', which is excluded for class '{}'",
                            tag.name,
                            category,
                            self.class_name()
                        ),
                    )
                    .with_affected(tag.id.clone()),
                );
            }
        }

        for block_id in &rule.required_plot_blocks {
            if self.selection.has_plot_block(block_id) {
                continue;
            }
            outcome.error(
                ValidationIssue::new(
                    IssueKind::CategoryRestriction,
                    Severity::Medium,
                    format!(
                        "'{}' tags require the plot block '{}'",
                        self.class_name(),
                        self.catalog.display_name(block_id)
                    ),
                )
                .with_affected(block_id.clone()),
            );
        }
    }

    fn dependencies(&self, rule: &DependencyRule, outcome: &mut RuleOutcome) {
        for tag_id in &rule.requires {
            if self.selection.has_tag(tag_id) {
                continue;
            }
            outcome.error(
                ValidationIssue::new(
                    IssueKind::MissingDependency,
                    Severity::High,
                    format!(
                        "'{}' tags depend on '{}', which is not applied",
                        self.class_name(),
                        self.catalog.display_name(tag_id)
                    ),
                )
                .with_affected(tag_id.clone())
                .with_affected_ids(self.member_ids()),
            );
        }

        for tag_id in rule.enhances.iter().chain(&rule.enables) {
            if self.selection.has_tag(tag_id) {
                continue;
            }
            outcome.suggest(
                Suggestion::new(
                    SuggestionKind::Enhancement,
                    format!(
                        "Consider adding '{}' to complement your '{}' tags",
                        self.catalog.display_name(tag_id),
                        self.class_name()
                    ),
                )
                .with_target(tag_id.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_catalog::{PathwayItem, PlotBlock};
    use serde_json::json;

    fn pairing_catalog() -> Catalog {
        Catalog::new()
            .with_tag_class(TagClass::new("main-pairing", "Main Pairing").with_mutual_exclusion(
                MutualExclusionRule {
                    within_class: true,
                    ..Default::default()
                },
            ))
            .with_tag(Tag::new("harry-hermione", "Harry/Hermione", "relationship").with_class("main-pairing"))
            .with_tag(Tag::new("harry-ginny", "Harry/Ginny", "relationship").with_class("main-pairing"))
            .with_tag(Tag::new("angst", "Angst", "genre"))
    }

    fn run(catalog: &Catalog, items: &[PathwayItem]) -> RuleOutcome {
        run_with_metadata(catalog, items, &HashMap::new())
    }

    fn run_with_metadata(
        catalog: &Catalog,
        items: &[PathwayItem],
        metadata: &HashMap<String, Value>,
    ) -> RuleOutcome {
        let selection = Selection::resolve(items, catalog);
        TagClassValidator::new().validate(&selection, catalog, metadata)
    }

    #[test]
    fn test_within_class_exclusion() {
        let catalog = pairing_catalog();
        let outcome = run(
            &catalog,
            &[
                PathwayItem::tag("harry-hermione", 0),
                PathwayItem::tag("harry-ginny", 1),
            ],
        );

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, IssueKind::MutualExclusion);
        assert_eq!(outcome.errors[0].affected_ids.len(), 2);
        assert_eq!(outcome.rules_evaluated, 1);
    }

    #[test]
    fn test_single_member_passes() {
        let catalog = pairing_catalog();
        let outcome = run(&catalog, &[PathwayItem::tag("harry-hermione", 0)]);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_unreferenced_class_is_skipped() {
        let catalog = pairing_catalog();
        let outcome = run(&catalog, &[PathwayItem::tag("angst", 0)]);
        assert_eq!(outcome.rules_evaluated, 0);
    }

    #[test]
    fn test_conflicting_tags_and_classes() {
        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("fluff", "Fluff").with_mutual_exclusion(
                MutualExclusionRule {
                    within_class: false,
                    conflicting_tags: vec!["major-death".into()],
                    conflicting_classes: vec!["dark".into()],
                },
            ))
            .with_tag_class(TagClass::new("dark", "Dark"))
            .with_tag(Tag::new("cozy", "Cozy", "tone").with_class("fluff"))
            .with_tag(Tag::new("major-death", "Major Character Death", "warning"))
            .with_tag(Tag::new("torture", "Torture", "warning").with_class("dark"));

        let outcome = run(
            &catalog,
            &[
                PathwayItem::tag("cozy", 0),
                PathwayItem::tag("major-death", 1),
                PathwayItem::tag("torture", 2),
            ],
        );

        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].message.contains("Major Character Death"));
        assert!(outcome.errors[1].affected_ids.contains(&"torture".to_string()));
    }

    #[test]
    fn test_instance_limits() {
        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("trope", "Trope").with_instance_limits(InstanceLimitRule {
                max_instances: Some(1),
                min_instances: None,
                exact_instances: Some(1),
            }))
            .with_tag(Tag::new("a", "A", "trope").with_class("trope"))
            .with_tag(Tag::new("b", "B", "trope").with_class("trope"));

        let ok = run(&catalog, &[PathwayItem::tag("a", 0)]);
        assert!(ok.errors.is_empty());

        let over = run(&catalog, &[PathwayItem::tag("a", 0), PathwayItem::tag("b", 1)]);
        assert_eq!(over.errors.len(), 2);
        assert!(over.errors.iter().all(|e| e.kind == IssueKind::InstanceLimit));
    }

    #[test]
    fn test_min_instances() {
        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("setting", "Setting").with_instance_limits(InstanceLimitRule {
                min_instances: Some(2),
                ..Default::default()
            }))
            .with_tag(Tag::new("hogwarts", "Hogwarts", "place").with_class("setting"));

        let outcome = run(&catalog, &[PathwayItem::tag("hogwarts", 0)]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("at least 2"));
    }

    #[test]
    fn test_required_context() {
        let mut required_metadata = HashMap::new();
        required_metadata.insert("rating".to_string(), json!("explicit"));
        required_metadata.insert("era".to_string(), Value::Null);

        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("smut", "Smut").with_required_context(RequiredContextRule {
                required_tags: vec!["consent".into()],
                required_classes: vec!["pairing".into()],
                required_metadata,
            }))
            .with_tag(Tag::new("pwp", "PWP", "content").with_class("smut"))
            .with_tag(Tag::new("consent", "Consent", "content"));

        let outcome = run(&catalog, &[PathwayItem::tag("pwp", 0)]);
        // consent, pairing class, era, rating
        assert_eq!(outcome.errors.len(), 4);
        assert!(outcome.errors.iter().all(|e| e.kind == IssueKind::RequiredContext));

        let mut metadata = HashMap::new();
        metadata.insert("rating".to_string(), json!("teen"));
        metadata.insert("era".to_string(), json!("marauders"));
        let outcome = run_with_metadata(
            &catalog,
            &[PathwayItem::tag("pwp", 0), PathwayItem::tag("consent", 1)],
            &metadata,
        );
        // pairing class, rating mismatch
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[1].message.contains("found \"teen\""));
    }

    #[test]
    fn test_category_restrictions() {
        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("au", "Alternate Universe").with_category_restrictions(
                CategoryRestrictionRule {
                    applicable_categories: vec!["setting".into(), "premise".into()],
                    excluded_categories: vec!["premise".into()],
                    required_plot_blocks: vec!["worldbuilding".into()],
                },
            ))
            .with_tag(Tag::new("coffee-shop", "Coffee Shop AU", "setting").with_class("au"))
            .with_tag(Tag::new("soulmates", "Soulmates AU", "premise").with_class("au"))
            .with_tag(Tag::new("modern", "Modern AU", "era").with_class("au"))
            .with_plot_block(PlotBlock::new("worldbuilding", "Worldbuilding", "structure"));

        let outcome = run(
            &catalog,
            &[
                PathwayItem::tag("coffee-shop", 0),
                PathwayItem::tag("soulmates", 1),
                PathwayItem::tag("modern", 2),
            ],
        );

        // soulmates excluded, modern not applicable, worldbuilding missing
        assert_eq!(outcome.errors.len(), 3);
        assert!(outcome.errors[2].message.contains("Worldbuilding"));

        let outcome = run(
            &catalog,
            &[
                PathwayItem::tag("coffee-shop", 0),
                PathwayItem::plot_block("worldbuilding", 1),
            ],
        );
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_dependencies() {
        let catalog = Catalog::new()
            .with_tag_class(TagClass::new("time-travel", "Time Travel").with_dependencies(DependencyRule {
                requires: vec!["fix-it".into()],
                enhances: vec!["angst".into()],
                enables: vec!["second-chance".into()],
            }))
            .with_tag(Tag::new("time-turner", "Time Turner", "device").with_class("time-travel"))
            .with_tag(Tag::new("fix-it", "Fix-It", "trope"))
            .with_tag(Tag::new("angst", "Angst", "genre"));

        let outcome = run(&catalog, &[PathwayItem::tag("time-turner", 0), PathwayItem::tag("angst", 1)]);

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, IssueKind::MissingDependency);
        assert_eq!(outcome.suggestions.len(), 1);
        assert_eq!(outcome.suggestions[0].target_ids, vec!["second-chance".to_string()]);
    }

    #[test]
    fn test_missing_class_is_ignored() {
        let catalog = Catalog::new().with_tag(Tag::new("orphan", "Orphan", "x").with_class("nowhere"));
        let outcome = run(&catalog, &[PathwayItem::tag("orphan", 0)]);

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.rules_evaluated, 0);
    }
}
