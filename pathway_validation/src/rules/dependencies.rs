//! Dependency validation for plot blocks and tags.

use pathway_catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use super::Selection;
use crate::findings::{
    ErrorCategory, IssueKind, RuleOutcome, Severity, Suggestion, SuggestionKind, ValidationIssue,
};

/// One entry of a dependency chain: how many `requires` hops separate an id
/// from the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLevel {
    pub id: String,
    pub name: String,
    pub level: usize,
}

/// Reports unmet hard and soft dependencies.
///
/// Unmet hard requirements are warnings here; the blocking error for the same
/// fact comes from the conflict detector's missing-requirement pass.
#[derive(Debug, Clone, Default)]
pub struct DependencyValidator;

impl DependencyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, selection: &Selection<'_>, catalog: &Catalog) -> RuleOutcome {
        let mut outcome = RuleOutcome::new();

        for block in &selection.plot_blocks {
            outcome.evaluated();
            for required in &block.requires {
                if selection.has_element(required) {
                    continue;
                }
                outcome.warning(
                    ValidationIssue::new(
                        IssueKind::MissingDependency,
                        Severity::Medium,
                        format!(
                            "'{}' depends on '{}', which is not in the pathway",
                            block.name,
                            catalog.display_name(required)
                        ),
                    )
                    .with_category(ErrorCategory::PlotBlockConflict)
                    .with_affected(block.id.clone())
                    .with_affected(required.clone()),
                );
            }

            for wanted in &block.soft_requires {
                if selection.has_element(wanted) {
                    continue;
                }
                outcome.suggest(
                    Suggestion::new(
                        SuggestionKind::AddElement,
                        format!(
                            "'{}' works best with '{}'",
                            block.name,
                            catalog.display_name(wanted)
                        ),
                    )
                    .with_target(wanted.clone()),
                );
            }
        }

        for tag in &selection.tags {
            outcome.evaluated();
            for required in &tag.requires {
                if selection.has_tag(required) {
                    continue;
                }
                outcome.warning(
                    ValidationIssue::new(
                        IssueKind::MissingDependency,
                        Severity::Low,
                        format!(
                            "Tag '{}' usually requires '{}'",
                            tag.name,
                            catalog.display_name(required)
                        ),
                    )
                    .with_affected(tag.id.clone())
                    .with_affected(required.clone()),
                );
            }

            for enhancer in &tag.enhances {
                if selection.has_tag(enhancer) {
                    continue;
                }
                outcome.suggest(
                    Suggestion::new(
                        SuggestionKind::Enhancement,
                        format!(
                            "'{}' pairs well with '{}'",
                            tag.name,
                            catalog.display_name(enhancer)
                        ),
                    )
                    .with_target(enhancer.clone()),
                );
            }
        }

        outcome
    }

    /// Breadth-first walk over `requires`, starting from the selected plot blocks at level 0.
    ///
    /// Follows requirements into the catalog, so unselected dependencies show up
    /// too. Ids missing from the catalog appear once and are not expanded.
    pub fn dependency_chain(&self, selection: &Selection<'_>, catalog: &Catalog) -> Vec<DependencyLevel> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        let mut chain = Vec::new();

        for block in &selection.plot_blocks {
            if visited.insert(block.id.as_str()) {
                queue.push_back((block.id.as_str(), 0));
            }
        }

        while let Some((id, level)) = queue.pop_front() {
            chain.push(DependencyLevel {
                id: id.to_string(),
                name: catalog.display_name(id).to_string(),
                level,
            });

            let requires = catalog
                .plot_block(id)
                .map(|b| b.requires.as_slice())
                .or_else(|| catalog.condition(id).map(|c| c.requires.as_slice()))
                .unwrap_or(&[]);

            for next in requires {
                if visited.insert(next.as_str()) {
                    queue.push_back((next.as_str(), level + 1));
                }
            }
        }

        chain
    }
}
