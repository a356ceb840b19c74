//! Pathway items - the ordered selection a user assembles.

use serde::{Deserialize, Serialize};

/// What kind of catalog entry a pathway item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathwayItemType {
    Tag,
    PlotBlock,
    Condition,
}

impl PathwayItemType {
    /// Stable string form used in signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            PathwayItemType::Tag => "tag",
            PathwayItemType::PlotBlock => "plot_block",
            PathwayItemType::Condition => "condition",
        }
    }
}

impl std::fmt::Display for PathwayItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a pathway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathwayItem {
    pub id: String,

    #[serde(rename = "type")]
    pub item_type: PathwayItemType,

    /// Position in the pathway as supplied by the caller.
    #[serde(default)]
    pub order: usize,
}

impl PathwayItem {
    /// Create a new pathway item.
    pub fn new(id: impl Into<String>, item_type: PathwayItemType, order: usize) -> Self {
        Self {
            id: id.into(),
            item_type,
            order,
        }
    }

    /// Create a tag item.
    pub fn tag(id: impl Into<String>, order: usize) -> Self {
        Self::new(id, PathwayItemType::Tag, order)
    }

    /// Create a plot block item.
    pub fn plot_block(id: impl Into<String>, order: usize) -> Self {
        Self::new(id, PathwayItemType::PlotBlock, order)
    }

    /// Create a condition item.
    pub fn condition(id: impl Into<String>, order: usize) -> Self {
        Self::new(id, PathwayItemType::Condition, order)
    }

    /// The `type:id` form of this item.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.item_type, self.id)
    }
}

/// Order-insensitive signature of a pathway: sorted `type:id` entries joined by commas.
pub fn pathway_signature(items: &[PathwayItem]) -> String {
    let mut signatures: Vec<String> = items.iter().map(PathwayItem::signature).collect();
    signatures.sort();
    signatures.join(",")
}
