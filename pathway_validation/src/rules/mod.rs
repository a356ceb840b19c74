//! Validators - the rules a pathway is checked against.
//!
//! Each validator reads a [`Selection`] (the pathway resolved against the catalog)
//! and reports findings. None of them fail on user data; only the circular
//! reference detector can return a [`crate::ValidationFault`], and only when its
//! own bookkeeping breaks.

mod circular;
mod conflicts;
mod dependencies;
mod tag_class;

pub use circular::*;
pub use conflicts::*;
pub use dependencies::*;
pub use tag_class::*;

use pathway_catalog::{Catalog, PathwayItem, PathwayItemType, PlotBlock, PlotBlockCondition, Tag};
use std::collections::HashSet;

/// A pathway resolved against a catalog.
///
/// Items are deduplicated by id (first occurrence wins) and keep pathway order.
/// Items whose ids are not in the catalog are kept aside in `unresolved`.
#[derive(Debug, Clone, Default)]
pub struct Selection<'a> {
    /// Ids of all applied tags, resolved or not.
    pub tag_ids: Vec<&'a str>,
    pub tags: Vec<&'a Tag>,
    pub plot_blocks: Vec<&'a PlotBlock>,
    pub conditions: Vec<&'a PlotBlockCondition>,
    pub unresolved: Vec<&'a PathwayItem>,

    tag_id_set: HashSet<&'a str>,
    plot_block_ids: HashSet<&'a str>,
    /// Ids of selected plot blocks and conditions.
    element_ids: HashSet<&'a str>,
}

impl<'a> Selection<'a> {
    /// Resolve pathway items against the catalog.
    pub fn resolve(items: &'a [PathwayItem], catalog: &'a Catalog) -> Self {
        let mut selection = Selection::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for item in items {
            if !seen.insert(item.id.as_str()) {
                continue;
            }
            match item.item_type {
                PathwayItemType::Tag => {
                    selection.tag_ids.push(&item.id);
                    selection.tag_id_set.insert(&item.id);
                    match catalog.tag(&item.id) {
                        Some(tag) => selection.tags.push(tag),
                        None => selection.unresolved.push(item),
                    }
                }
                PathwayItemType::PlotBlock => match catalog.plot_block(&item.id) {
                    Some(block) => {
                        selection.element_ids.insert(&block.id);
                        selection.plot_block_ids.insert(&block.id);
                        selection.plot_blocks.push(block);
                    }
                    None => selection.unresolved.push(item),
                },
                PathwayItemType::Condition => match catalog.condition(&item.id) {
                    Some(condition) => {
                        selection.element_ids.insert(&condition.id);
                        selection.conditions.push(condition);
                    }
                    None => selection.unresolved.push(item),
                },
            }
        }

        selection
    }

    /// Check whether a tag id is applied.
    pub fn has_tag(&self, id: &str) -> bool {
        self.tag_id_set.contains(id)
    }

    /// Check whether a plot block or condition id is selected.
    pub fn has_element(&self, id: &str) -> bool {
        self.element_ids.contains(id)
    }

    /// Check whether a plot block id is selected.
    pub fn has_plot_block(&self, id: &str) -> bool {
        self.plot_block_ids.contains(id)
    }

    /// Check whether any applied tag belongs to the given class.
    pub fn has_tag_in_class(&self, tag_class_id: &str) -> bool {
        self.tags.iter().any(|t| t.in_class(tag_class_id))
    }

    /// Applied tags belonging to the given class, in pathway order.
    pub fn tags_in_class(&self, tag_class_id: &str) -> Vec<&'a Tag> {
        self.tags
            .iter()
            .copied()
            .filter(|t| t.in_class(tag_class_id))
            .collect()
    }

    /// Number of distinct selected items, resolved or not.
    pub fn len(&self) -> usize {
        self.tag_ids.len()
            + self.plot_blocks.len()
            + self.conditions.len()
            + self
                .unresolved
                .iter()
                .filter(|i| i.item_type != PathwayItemType::Tag)
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
