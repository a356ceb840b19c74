//! Catalog - the loaded, indexed content a pathway is validated against.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::pathway::{PathwayItem, PathwayItemType};
use crate::plot_blocks::{PlotBlock, PlotBlockCondition};
use crate::tags::{Tag, TagClass};

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized shape of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    tag_classes: Vec<TagClass>,
    #[serde(default)]
    plot_blocks: Vec<PlotBlock>,
    #[serde(default)]
    conditions: Vec<PlotBlockCondition>,
}

/// Read-only collection of tags, tag classes, plot blocks and conditions.
///
/// Entries keep their insertion order for deterministic iteration and are
/// indexed by id for lookups. When two entries share an id the first one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogData", into = "CatalogData")]
pub struct Catalog {
    tags: Vec<Tag>,
    tag_classes: Vec<TagClass>,
    plot_blocks: Vec<PlotBlock>,
    conditions: Vec<PlotBlockCondition>,

    tag_index: HashMap<String, usize>,
    tag_class_index: HashMap<String, usize>,
    plot_block_index: HashMap<String, usize>,
    condition_index: HashMap<String, usize>,
}

fn insert_indexed<T>(
    entries: &mut Vec<T>,
    index: &mut HashMap<String, usize>,
    id: &str,
    entry: T,
) -> bool {
    if index.contains_key(id) {
        return false;
    }
    index.insert(id.to_string(), entries.len());
    entries.push(entry);
    true
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add a tag. Returns `false` if a tag with the same id already exists.
    pub fn add_tag(&mut self, tag: Tag) -> bool {
        let id = tag.id.clone();
        insert_indexed(&mut self.tags, &mut self.tag_index, &id, tag)
    }

    /// Add a tag class. Returns `false` if the id is taken.
    pub fn add_tag_class(&mut self, tag_class: TagClass) -> bool {
        let id = tag_class.id.clone();
        insert_indexed(&mut self.tag_classes, &mut self.tag_class_index, &id, tag_class)
    }

    /// Add a plot block. Returns `false` if the id is taken.
    pub fn add_plot_block(&mut self, block: PlotBlock) -> bool {
        let id = block.id.clone();
        insert_indexed(&mut self.plot_blocks, &mut self.plot_block_index, &id, block)
    }

    /// Add a condition. Returns `false` if the id is taken.
    pub fn add_condition(&mut self, condition: PlotBlockCondition) -> bool {
        let id = condition.id.clone();
        insert_indexed(&mut self.conditions, &mut self.condition_index, &id, condition)
    }

    /// Builder form of [`Catalog::add_tag`].
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.add_tag(tag);
        self
    }

    /// Builder form of [`Catalog::add_tag_class`].
    pub fn with_tag_class(mut self, tag_class: TagClass) -> Self {
        self.add_tag_class(tag_class);
        self
    }

    /// Builder form of [`Catalog::add_plot_block`].
    pub fn with_plot_block(mut self, block: PlotBlock) -> Self {
        self.add_plot_block(block);
        self
    }

    /// Builder form of [`Catalog::add_condition`].
    pub fn with_condition(mut self, condition: PlotBlockCondition) -> Self {
        self.add_condition(condition);
        self
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tag_index.get(id).and_then(|i| self.tags.get(*i))
    }

    pub fn tag_class(&self, id: &str) -> Option<&TagClass> {
        self.tag_class_index
            .get(id)
            .and_then(|i| self.tag_classes.get(*i))
    }

    pub fn plot_block(&self, id: &str) -> Option<&PlotBlock> {
        self.plot_block_index
            .get(id)
            .and_then(|i| self.plot_blocks.get(*i))
    }

    pub fn condition(&self, id: &str) -> Option<&PlotBlockCondition> {
        self.condition_index
            .get(id)
            .and_then(|i| self.conditions.get(*i))
    }

    /// All tags in catalog order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// All tag classes in catalog order.
    pub fn tag_classes(&self) -> &[TagClass] {
        &self.tag_classes
    }

    /// All plot blocks in catalog order.
    pub fn plot_blocks(&self) -> &[PlotBlock] {
        &self.plot_blocks
    }

    /// All conditions in catalog order.
    pub fn conditions(&self) -> &[PlotBlockCondition] {
        &self.conditions
    }

    /// Check whether a pathway item resolves to a catalog entry of its type.
    pub fn resolves(&self, item: &PathwayItem) -> bool {
        match item.item_type {
            PathwayItemType::Tag => self.tag(&item.id).is_some(),
            PathwayItemType::PlotBlock => self.plot_block(&item.id).is_some(),
            PathwayItemType::Condition => self.condition(&item.id).is_some(),
        }
    }

    /// Human-readable name for any id, falling back to the raw id.
    ///
    /// Plot blocks are looked up first, then conditions, then tags.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        if let Some(block) = self.plot_block(id) {
            &block.name
        } else if let Some(condition) = self.condition(id) {
            condition.display_name()
        } else if let Some(tag) = self.tag(id) {
            &tag.name
        } else {
            id
        }
    }

    /// Total number of entries across all collections.
    pub fn len(&self) -> usize {
        self.tags.len() + self.tag_classes.len() + self.plot_blocks.len() + self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<CatalogData> for Catalog {
    fn from(data: CatalogData) -> Self {
        let mut catalog = Catalog::new();
        for tag in data.tags {
            catalog.add_tag(tag);
        }
        for tag_class in data.tag_classes {
            catalog.add_tag_class(tag_class);
        }
        for block in data.plot_blocks {
            catalog.add_plot_block(block);
        }
        for condition in data.conditions {
            catalog.add_condition(condition);
        }
        catalog
    }
}

impl From<Catalog> for CatalogData {
    fn from(catalog: Catalog) -> Self {
        CatalogData {
            tags: catalog.tags,
            tag_classes: catalog.tag_classes,
            plot_blocks: catalog.plot_blocks,
            conditions: catalog.conditions,
        }
    }
}
