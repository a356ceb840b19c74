//! Plot block conflict detection.
//!
//! Five independent passes over the selected plot blocks and conditions:
//!
//! 1. **Direct exclusion**: `conflicts_with` declared on either side of a pair
//! 2. **Category exclusion**: a block forbids another selected block's category
//! 3. **Instance limit**: too many same-named blocks
//! 4. **Condition conflict**: `conflicts_with` between a selected condition and
//!    another selected condition or plot block
//! 5. **Missing requirement**: `requires` pointing outside the selection
//!
//! Each pass deduplicates on a sorted pair key, so a conflict declared on both
//! sides (or found from both ends) is reported once.

use pathway_catalog::{Catalog, PlotBlock, PlotBlockCondition};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::Selection;
use crate::findings::{
    pair_key, Conflict, ConflictKind, ConflictResolution, ElementRef, FindingLevel,
    ResolutionAction, RuleOutcome, Severity,
};

/// Number of passes the detector runs.
const PASSES: usize = 5;

/// Detects conflicts between selected plot blocks and conditions.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    max_alternatives: usize,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(3)
    }
}

fn block_ref(block: &PlotBlock) -> ElementRef {
    ElementRef::new(block.id.clone(), block.name.clone())
}

fn condition_ref(condition: &PlotBlockCondition) -> ElementRef {
    ElementRef::new(condition.id.clone(), condition.display_name())
}

impl ConflictDetector {
    /// Create a detector that lists at most `max_alternatives` replacements per conflict.
    pub fn new(max_alternatives: usize) -> Self {
        Self { max_alternatives }
    }

    /// Run all passes and record the conflicts on a [`RuleOutcome`].
    pub fn validate(&self, selection: &Selection<'_>, catalog: &Catalog) -> RuleOutcome {
        let mut outcome = RuleOutcome::new();
        for conflict in self.detect(selection, catalog) {
            outcome.conflict(conflict);
        }
        outcome.rules_evaluated += PASSES;
        outcome
    }

    /// Run all passes. Errors come before warnings; otherwise insertion order is kept.
    pub fn detect(&self, selection: &Selection<'_>, catalog: &Catalog) -> Vec<Conflict> {
        for block in &selection.plot_blocks {
            if block.declares_conflict_with(&block.id) {
                debug!(block_id = %block.id, "Ignoring self-referential conflict");
            }
        }

        let mut conflicts = Vec::new();
        self.direct_exclusions(selection, catalog, &mut conflicts);
        self.category_exclusions(selection, catalog, &mut conflicts);
        self.instance_limits(selection, &mut conflicts);
        self.condition_conflicts(selection, &mut conflicts);
        self.missing_requirements(selection, catalog, &mut conflicts);

        conflicts.sort_by_key(|c| c.level);
        conflicts
    }

    fn direct_exclusions(
        &self,
        selection: &Selection<'_>,
        catalog: &Catalog,
        conflicts: &mut Vec<Conflict>,
    ) {
        let blocks = &selection.plot_blocks;
        let mut seen = HashSet::new();

        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                let (source, target) = if a.declares_conflict_with(&b.id) {
                    (*a, *b)
                } else if b.declares_conflict_with(&a.id) {
                    (*b, *a)
                } else {
                    continue;
                };

                let key = pair_key(&a.id, &b.id);
                if !seen.insert(key.clone()) {
                    continue;
                }

                let alternatives = self.alternatives(selection, catalog, source, target, |_| true);
                let resolution = replace_or_remove(
                    &target.id,
                    alternatives,
                    format!("'{}' cannot be combined with '{}'", target.name, source.name),
                );

                conflicts.push(
                    Conflict::new(
                        ConflictKind::DirectExclusion,
                        &key,
                        FindingLevel::Error,
                        Severity::High,
                        format!("'{}' conflicts with '{}'", source.name, target.name),
                        block_ref(source),
                    )
                    .with_target(block_ref(target))
                    .with_resolution(resolution),
                );
            }
        }
    }

    fn category_exclusions(
        &self,
        selection: &Selection<'_>,
        catalog: &Catalog,
        conflicts: &mut Vec<Conflict>,
    ) {
        let mut seen = HashSet::new();

        for source in &selection.plot_blocks {
            if source.excludes_categories.is_empty() {
                continue;
            }
            for target in &selection.plot_blocks {
                if target.id == source.id || !source.excludes_category(&target.category) {
                    continue;
                }

                let key = pair_key(&source.id, &target.id);
                if !seen.insert(key.clone()) {
                    continue;
                }

                let alternatives = self.alternatives(selection, catalog, source, target, |candidate| {
                    !source.excludes_category(&candidate.category)
                });
                let resolution = replace_or_remove(
                    &target.id,
                    alternatives,
                    format!(
                        "'{}' excludes the '{}' category",
                        source.name, target.category
                    ),
                );

                conflicts.push(
                    Conflict::new(
                        ConflictKind::CategoryExclusion,
                        &key,
                        FindingLevel::Error,
                        Severity::Medium,
                        format!(
                            "'{}' excludes '{}' blocks, but '{}' is selected",
                            source.name, target.category, target.name
                        ),
                        block_ref(source),
                    )
                    .with_target(block_ref(target))
                    .with_resolution(resolution),
                );
            }
        }
    }

    fn instance_limits(&self, selection: &Selection<'_>, conflicts: &mut Vec<Conflict>) {
        let mut groups: Vec<(&str, Vec<&PlotBlock>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for block in &selection.plot_blocks {
            match index.get(block.name.as_str()) {
                Some(&i) => groups[i].1.push(*block),
                None => {
                    index.insert(&block.name, groups.len());
                    groups.push((&block.name, vec![*block]));
                }
            }
        }

        for (name, group) in groups {
            let Some(limit) = group.iter().filter_map(|b| b.max_instances).min() else {
                continue;
            };
            if group.len() <= limit {
                continue;
            }

            let excess = &group[limit..];
            let mut conflict = Conflict::new(
                ConflictKind::InstanceLimit,
                name,
                FindingLevel::Error,
                Severity::Medium,
                format!(
                    "'{}' may appear at most {} time(s), but {} are selected",
                    name,
                    limit,
                    group.len()
                ),
                block_ref(group[0]),
            );
            for block in excess {
                conflict = conflict.with_target(block_ref(block));
            }
            let resolution = ConflictResolution::new(
                ResolutionAction::Remove,
                excess[0].id.clone(),
                format!("Only {} instance(s) of '{}' are allowed", limit, name),
            );

            conflicts.push(conflict.with_resolution(resolution));
        }
    }

    fn condition_conflicts(&self, selection: &Selection<'_>, conflicts: &mut Vec<Conflict>) {
        let conditions = &selection.conditions;
        let mut seen = HashSet::new();

        for (i, a) in conditions.iter().enumerate() {
            for b in &conditions[i + 1..] {
                let (source, target) = if condition_declares(a, b) {
                    (*a, *b)
                } else if condition_declares(b, a) {
                    (*b, *a)
                } else {
                    continue;
                };

                let key = pair_key(&a.id, &b.id);
                if !seen.insert(key.clone()) {
                    continue;
                }

                conflicts.push(
                    Conflict::new(
                        ConflictKind::ConditionConflict,
                        &key,
                        FindingLevel::Warning,
                        Severity::Medium,
                        format!(
                            "Condition '{}' conflicts with condition '{}'",
                            source.display_name(),
                            target.display_name()
                        ),
                        condition_ref(source),
                    )
                    .with_target(condition_ref(target))
                    .with_resolution(ConflictResolution::new(
                        ResolutionAction::Remove,
                        target.id.clone(),
                        format!("'{}' contradicts '{}'", target.display_name(), source.display_name()),
                    )),
                );
            }
        }

        for condition in conditions {
            for block in &selection.plot_blocks {
                let clash = condition.conflicts_with.iter().any(|id| *id == block.id)
                    || block.declares_conflict_with(&condition.id);
                if !clash {
                    continue;
                }

                let key = pair_key(&condition.id, &block.id);
                if !seen.insert(key.clone()) {
                    continue;
                }

                conflicts.push(
                    Conflict::new(
                        ConflictKind::ConditionConflict,
                        &key,
                        FindingLevel::Warning,
                        Severity::Medium,
                        format!(
                            "Condition '{}' conflicts with '{}'",
                            condition.display_name(),
                            block.name
                        ),
                        condition_ref(condition),
                    )
                    .with_target(block_ref(block))
                    .with_resolution(ConflictResolution::new(
                        ResolutionAction::Remove,
                        condition.id.clone(),
                        format!("'{}' contradicts '{}'", condition.display_name(), block.name),
                    )),
                );
            }
        }
    }

    fn missing_requirements(
        &self,
        selection: &Selection<'_>,
        catalog: &Catalog,
        conflicts: &mut Vec<Conflict>,
    ) {
        let mut seen = HashSet::new();
        let sources = selection
            .plot_blocks
            .iter()
            .map(|b| (block_ref(b), &b.requires))
            .chain(
                selection
                    .conditions
                    .iter()
                    .map(|c| (condition_ref(c), &c.requires)),
            );

        for (source, requires) in sources {
            for missing in requires {
                if selection.has_element(missing) {
                    continue;
                }
                let key = format!("{}->{}", source.id, missing);
                if !seen.insert(key.clone()) {
                    continue;
                }

                let missing_name = catalog.display_name(missing);
                let message = format!("'{}' requires '{}'", source.name, missing_name);
                let resolution = ConflictResolution::new(
                    ResolutionAction::Add,
                    missing.clone(),
                    format!("Add '{}' to satisfy '{}'", missing_name, source.name),
                );

                conflicts.push(
                    Conflict::new(
                        ConflictKind::MissingRequirement,
                        &key,
                        FindingLevel::Error,
                        Severity::High,
                        message,
                        source.clone(),
                    )
                    .with_target(ElementRef::new(missing.clone(), missing_name))
                    .with_resolution(resolution),
                );
            }
        }
    }

    /// Catalog blocks that could replace `removed` while keeping `kept`.
    ///
    /// Candidates in the removed block's category come first.
    fn alternatives<F>(
        &self,
        selection: &Selection<'_>,
        catalog: &Catalog,
        kept: &PlotBlock,
        removed: &PlotBlock,
        accept: F,
    ) -> Vec<String>
    where
        F: Fn(&PlotBlock) -> bool,
    {
        let mut candidates: Vec<&PlotBlock> = catalog
            .plot_blocks()
            .iter()
            .filter(|c| c.id != removed.id && c.id != kept.id)
            .filter(|c| !selection.has_plot_block(&c.id))
            .filter(|c| !kept.conflicts(c))
            .filter(|c| accept(*c))
            .collect();

        candidates.sort_by_key(|c| c.category != removed.category);
        candidates
            .into_iter()
            .take(self.max_alternatives)
            .map(|c| c.id.clone())
            .collect()
    }
}

fn condition_declares(source: &PlotBlockCondition, other: &PlotBlockCondition) -> bool {
    source.conflicts_with.iter().any(|id| *id == other.id)
}

fn replace_or_remove(target_id: &str, alternatives: Vec<String>, reason: String) -> ConflictResolution {
    let action = if alternatives.is_empty() {
        ResolutionAction::Remove
    } else {
        ResolutionAction::Replace
    };
    ConflictResolution::new(action, target_id, reason).with_alternatives(alternatives)
}
