//! Tag definitions - the narrative labels a pathway can apply.

mod tag_class;

pub use tag_class::*;

use serde::{Deserialize, Serialize};

/// A narrative tag (a pairing, a trope, a setting detail, ...).
///
/// Tags optionally belong to a single [`TagClass`], which carries the shared
/// validation rules for all of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,

    /// Display name.
    pub name: String,

    /// Free-form category (e.g. "relationship", "genre").
    pub category: String,

    /// Tag ids that must also be applied for this tag to make sense.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Tag ids that pair well with this tag.
    #[serde(default)]
    pub enhances: Vec<String>,

    /// Owning tag class, if any.
    #[serde(default)]
    pub tag_class_id: Option<String>,
}

impl Tag {
    /// Create a new tag without class membership or relationships.
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            requires: Vec::new(),
            enhances: Vec::new(),
            tag_class_id: None,
        }
    }

    /// Assign the tag to a class.
    pub fn with_class(mut self, tag_class_id: impl Into<String>) -> Self {
        self.tag_class_id = Some(tag_class_id.into());
        self
    }

    /// Add a required tag.
    pub fn with_requires(mut self, tag_id: impl Into<String>) -> Self {
        self.requires.push(tag_id.into());
        self
    }

    /// Add an enhancing tag.
    pub fn with_enhances(mut self, tag_id: impl Into<String>) -> Self {
        self.enhances.push(tag_id.into());
        self
    }

    /// Check whether this tag belongs to the given class.
    pub fn in_class(&self, tag_class_id: &str) -> bool {
        self.tag_class_id.as_deref() == Some(tag_class_id)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
