//! Incremental feedback for a single item added to an existing pathway.
//!
//! Only the new item's direct relationships are checked, so the cost does not
//! grow with transitive structure. Findings are advisory: everything is a
//! warning or a suggestion, and a full [`PathwayValidator::validate`] is still
//! required before the pathway is committed.

use pathway_catalog::{Catalog, PathwayItem, PathwayItemType, PlotBlock, PlotBlockCondition, Tag};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

use super::{elapsed_ms, PathwayValidator, ValidationContext};
use crate::findings::{IssueKind, Severity, Suggestion, SuggestionKind, ValidationIssue};
use crate::rules::Selection;

/// Advisory findings for one new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalFeedback {
    pub item: PathwayItem,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<Suggestion>,
    pub rules_evaluated: usize,
    #[serde(rename = "validationTime")]
    pub validation_time_ms: f64,
}

impl IncrementalFeedback {
    fn new(item: PathwayItem) -> Self {
        Self {
            item,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            rules_evaluated: 0,
            validation_time_ms: 0.0,
        }
    }

    /// Whether adding the item would introduce a problem.
    pub fn has_concerns(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn warn(&mut self, kind: IssueKind, severity: Severity, message: String, other_id: Option<&str>) {
        let mut issue = ValidationIssue::new(kind, severity, message).with_affected(self.item.id.clone());
        if let Some(other) = other_id {
            issue = issue.with_affected(other);
        }
        self.warnings.push(issue);
    }
}

impl PathwayValidator {
    /// Check what adding `new_item` to the context's pathway would cause.
    #[instrument(
        skip(self, context, new_item),
        fields(fandom_id = %context.fandom_id, item = %new_item.id)
    )]
    pub fn validate_incremental(
        &self,
        context: &ValidationContext,
        new_item: &PathwayItem,
    ) -> IncrementalFeedback {
        let started = Instant::now();
        let catalog = context.catalog.as_ref();
        let mut feedback = IncrementalFeedback::new(new_item.clone());

        feedback.rules_evaluated += 1;
        if context.pathway.iter().any(|item| item.id == new_item.id) {
            feedback.warn(
                IssueKind::DuplicateItem,
                Severity::Medium,
                format!("'{}' is already in the pathway", catalog.display_name(&new_item.id)),
                None,
            );
            feedback.validation_time_ms = elapsed_ms(started);
            return feedback;
        }

        let selection = Selection::resolve(&context.pathway, catalog);
        let mut check = IncrementalCheck {
            catalog,
            selection: &selection,
            feedback: &mut feedback,
        };

        match new_item.item_type {
            PathwayItemType::Tag => match catalog.tag(&new_item.id) {
                Some(tag) => check.tag(tag),
                None => check.unresolved(new_item),
            },
            PathwayItemType::PlotBlock => match catalog.plot_block(&new_item.id) {
                Some(block) => check.plot_block(block),
                None => check.unresolved(new_item),
            },
            PathwayItemType::Condition => match catalog.condition(&new_item.id) {
                Some(condition) => check.condition(condition),
                None => check.unresolved(new_item),
            },
        }

        feedback.validation_time_ms = elapsed_ms(started);
        feedback
    }
}

struct IncrementalCheck<'a, 'f> {
    catalog: &'a Catalog,
    selection: &'a Selection<'a>,
    feedback: &'f mut IncrementalFeedback,
}

impl IncrementalCheck<'_, '_> {
    fn unresolved(&mut self, item: &PathwayItem) {
        self.feedback.rules_evaluated += 1;
        self.feedback.warn(
            IssueKind::UnresolvedReference,
            Severity::Low,
            format!("Unknown {} '{}'", item.item_type, item.id),
            None,
        );
    }

    fn tag(&mut self, tag: &Tag) {
        let class = tag
            .tag_class_id
            .as_deref()
            .and_then(|id| self.catalog.tag_class(id));

        self.feedback.rules_evaluated += 1;
        if let Some(class) = class {
            let exclusion = class.validation_rules.mutual_exclusion.as_ref();
            if exclusion.is_some_and(|rule| rule.within_class) {
                if let Some(existing) = self.selection.tags_in_class(&class.id).first() {
                    self.feedback.warn(
                        IssueKind::MutualExclusion,
                        Severity::Medium,
                        format!(
                            "'{}' is already selected from '{}', which allows only one",
                            existing.name,
                            class.display_name()
                        ),
                        Some(&existing.id),
                    );
                }
            }

            // Tags the new tag's own class forbids.
            if let Some(rule) = exclusion {
                for applied in &self.selection.tags {
                    if rule.conflicting_tags.contains(&applied.id) {
                        self.feedback.warn(
                            IssueKind::MutualExclusion,
                            Severity::Medium,
                            format!("'{}' cannot be combined with '{}'", tag.name, applied.name),
                            Some(&applied.id),
                        );
                    }
                }
            }
        }

        self.feedback.rules_evaluated += 1;
        for applied in &self.selection.tags {
            let forbids_new = applied
                .tag_class_id
                .as_deref()
                .and_then(|id| self.catalog.tag_class(id))
                .and_then(|c| c.validation_rules.mutual_exclusion.as_ref())
                .is_some_and(|rule| rule.conflicting_tags.contains(&tag.id));
            let already_reported = class
                .and_then(|c| c.validation_rules.mutual_exclusion.as_ref())
                .is_some_and(|rule| rule.conflicting_tags.contains(&applied.id));

            if forbids_new && !already_reported {
                self.feedback.warn(
                    IssueKind::MutualExclusion,
                    Severity::Medium,
                    format!("'{}' cannot be combined with '{}'", applied.name, tag.name),
                    Some(&applied.id),
                );
            }
        }

        self.feedback.rules_evaluated += 1;
        for required in &tag.requires {
            if !self.selection.has_tag(required) {
                self.feedback.warn(
                    IssueKind::MissingDependency,
                    Severity::Low,
                    format!(
                        "Tag '{}' usually requires '{}'",
                        tag.name,
                        self.catalog.display_name(required)
                    ),
                    Some(required),
                );
            }
        }
    }

    fn plot_block(&mut self, block: &PlotBlock) {
        self.feedback.rules_evaluated += 1;
        for selected in &self.selection.plot_blocks {
            if selected.id != block.id && selected.conflicts(block) {
                self.feedback.warn(
                    IssueKind::DirectExclusion,
                    Severity::High,
                    format!("'{}' conflicts with '{}'", block.name, selected.name),
                    Some(&selected.id),
                );
            }
        }
        for condition in &self.selection.conditions {
            if condition_clashes_with_block(condition, block) {
                self.feedback.warn(
                    IssueKind::ConditionConflict,
                    Severity::Medium,
                    format!(
                        "Condition '{}' conflicts with '{}'",
                        condition.display_name(),
                        block.name
                    ),
                    Some(&condition.id),
                );
            }
        }

        self.feedback.rules_evaluated += 1;
        for selected in &self.selection.plot_blocks {
            if block.excludes_category(&selected.category) {
                self.feedback.warn(
                    IssueKind::CategoryExclusion,
                    Severity::Medium,
                    format!(
                        "'{}' excludes '{}' blocks, but '{}' is selected",
                        block.name, selected.category, selected.name
                    ),
                    Some(&selected.id),
                );
            } else if selected.excludes_category(&block.category) {
                self.feedback.warn(
                    IssueKind::CategoryExclusion,
                    Severity::Medium,
                    format!(
                        "'{}' excludes '{}' blocks",
                        selected.name, block.category
                    ),
                    Some(&selected.id),
                );
            }
        }

        self.feedback.rules_evaluated += 1;
        let same_name: Vec<&PlotBlock> = self
            .selection
            .plot_blocks
            .iter()
            .copied()
            .filter(|b| b.name == block.name)
            .collect();
        let limit = same_name
            .iter()
            .filter_map(|b| b.max_instances)
            .chain(block.max_instances)
            .min();
        if let Some(limit) = limit {
            if same_name.len() + 1 > limit {
                self.feedback.warn(
                    IssueKind::InstanceLimit,
                    Severity::Medium,
                    format!(
                        "'{}' may appear at most {} time(s); this would make {}",
                        block.name,
                        limit,
                        same_name.len() + 1
                    ),
                    None,
                );
            }
        }

        self.feedback.rules_evaluated += 1;
        self.requirements(&block.name, &block.requires);
        for wanted in &block.soft_requires {
            if !self.selection.has_element(wanted) {
                self.feedback.suggestions.push(
                    Suggestion::new(
                        SuggestionKind::AddElement,
                        format!(
                            "'{}' works best with '{}'",
                            block.name,
                            self.catalog.display_name(wanted)
                        ),
                    )
                    .with_target(wanted.clone()),
                );
            }
        }
    }

    fn condition(&mut self, condition: &PlotBlockCondition) {
        self.feedback.rules_evaluated += 1;
        for selected in &self.selection.conditions {
            let clash = condition.conflicts_with.contains(&selected.id)
                || selected.conflicts_with.contains(&condition.id);
            if clash {
                self.feedback.warn(
                    IssueKind::ConditionConflict,
                    Severity::Medium,
                    format!(
                        "Condition '{}' conflicts with condition '{}'",
                        condition.display_name(),
                        selected.display_name()
                    ),
                    Some(&selected.id),
                );
            }
        }

        for block in &self.selection.plot_blocks {
            if condition_clashes_with_block(condition, block) {
                self.feedback.warn(
                    IssueKind::ConditionConflict,
                    Severity::Medium,
                    format!(
                        "Condition '{}' conflicts with '{}'",
                        condition.display_name(),
                        block.name
                    ),
                    Some(&block.id),
                );
            }
        }

        self.feedback.rules_evaluated += 1;
        self.requirements(condition.display_name(), &condition.requires);
    }

    fn requirements(&mut self, source_name: &str, requires: &[String]) {
        for missing in requires {
            if self.selection.has_element(missing) {
                continue;
            }
            self.feedback.warn(
                IssueKind::MissingRequirement,
                Severity::Medium,
                format!(
                    "'{}' requires '{}'",
                    source_name,
                    self.catalog.display_name(missing)
                ),
                Some(missing),
            );
        }
    }
}

fn condition_clashes_with_block(condition: &PlotBlockCondition, block: &PlotBlock) -> bool {
    condition.conflicts_with.contains(&block.id) || block.declares_conflict_with(&condition.id)
}
