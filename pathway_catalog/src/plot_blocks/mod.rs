//! Plot blocks - reusable narrative units and their conditions.

use serde::{Deserialize, Serialize};

/// A reusable narrative unit with declared relationships to other blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotBlock {
    pub id: String,

    /// Display name. Instance limits are counted per name, not per id.
    pub name: String,

    pub category: String,

    /// Block ids this block cannot be combined with. Checked in both directions.
    #[serde(default)]
    pub conflicts_with: Vec<String>,

    /// Hard requirements.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Blocks this one works best with.
    #[serde(default)]
    pub soft_requires: Vec<String>,

    #[serde(default)]
    pub enhances: Vec<String>,

    /// Categories that may not appear alongside this block.
    #[serde(default)]
    pub excludes_categories: Vec<String>,

    #[serde(default)]
    pub max_instances: Option<usize>,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub children: Vec<String>,
}

impl PlotBlock {
    /// Create a new plot block with no relationships.
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            conflicts_with: Vec::new(),
            requires: Vec::new(),
            soft_requires: Vec::new(),
            enhances: Vec::new(),
            excludes_categories: Vec::new(),
            max_instances: None,
            parent_id: None,
            children: Vec::new(),
        }
    }

    /// Declare a conflict with another block.
    pub fn with_conflict(mut self, block_id: impl Into<String>) -> Self {
        self.conflicts_with.push(block_id.into());
        self
    }

    /// Declare a hard requirement.
    pub fn with_requires(mut self, block_id: impl Into<String>) -> Self {
        self.requires.push(block_id.into());
        self
    }

    /// Declare a soft requirement.
    pub fn with_soft_requires(mut self, block_id: impl Into<String>) -> Self {
        self.soft_requires.push(block_id.into());
        self
    }

    /// Declare an enhancement.
    pub fn with_enhances(mut self, block_id: impl Into<String>) -> Self {
        self.enhances.push(block_id.into());
        self
    }

    /// Exclude a category.
    pub fn with_excluded_category(mut self, category: impl Into<String>) -> Self {
        self.excludes_categories.push(category.into());
        self
    }

    /// Set the maximum number of same-named blocks in one pathway.
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = Some(max);
        self
    }

    /// Set the parent block.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Add a child block.
    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        self.children.push(child_id.into());
        self
    }

    /// Check whether this block declares a conflict with `other_id`.
    pub fn declares_conflict_with(&self, other_id: &str) -> bool {
        self.conflicts_with.iter().any(|id| id == other_id)
    }

    /// Check whether either block declares a conflict with the other.
    pub fn conflicts(&self, other: &PlotBlock) -> bool {
        self.declares_conflict_with(&other.id) || other.declares_conflict_with(&self.id)
    }

    /// Check whether this block forbids the given category.
    pub fn excludes_category(&self, category: &str) -> bool {
        self.excludes_categories.iter().any(|c| c == category)
    }
}

impl std::fmt::Display for PlotBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A condition attached to a plot block (e.g. "set after book 5").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotBlockCondition {
    pub id: String,

    /// The plot block this condition belongs to.
    pub plot_block_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub conflicts_with: Vec<String>,

    #[serde(default)]
    pub requires: Vec<String>,
}

impl PlotBlockCondition {
    /// Create a new condition owned by `plot_block_id`.
    pub fn new(
        id: impl Into<String>,
        plot_block_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plot_block_id: plot_block_id.into(),
            name: name.into(),
            parent_id: None,
            conflicts_with: Vec::new(),
            requires: Vec::new(),
        }
    }

    /// Declare a conflict with another condition.
    pub fn with_conflict(mut self, condition_id: impl Into<String>) -> Self {
        self.conflicts_with.push(condition_id.into());
        self
    }

    /// Declare a hard requirement.
    pub fn with_requires(mut self, id: impl Into<String>) -> Self {
        self.requires.push(id.into());
        self
    }

    /// Set the parent condition.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
