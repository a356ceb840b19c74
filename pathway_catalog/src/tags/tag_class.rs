//! Tag classes - groups of tags sharing validation constraints.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A group of tags that share validation rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagClass {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Null or malformed rules decode to an empty rule set.
    #[serde(default, deserialize_with = "lenient_rules")]
    pub validation_rules: TagClassRules,
}

impl TagClass {
    /// Create a tag class with no rules.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            validation_rules: TagClassRules::default(),
        }
    }

    /// Set the mutual exclusion rule.
    pub fn with_mutual_exclusion(mut self, rule: MutualExclusionRule) -> Self {
        self.validation_rules.mutual_exclusion = Some(rule);
        self
    }

    /// Set the instance limit rule.
    pub fn with_instance_limits(mut self, rule: InstanceLimitRule) -> Self {
        self.validation_rules.instance_limits = Some(rule);
        self
    }

    /// Set the required context rule.
    pub fn with_required_context(mut self, rule: RequiredContextRule) -> Self {
        self.validation_rules.required_context = Some(rule);
        self
    }

    /// Set the category restriction rule.
    pub fn with_category_restrictions(mut self, rule: CategoryRestrictionRule) -> Self {
        self.validation_rules.category_restrictions = Some(rule);
        self
    }

    /// Set the dependency rule.
    pub fn with_dependencies(mut self, rule: DependencyRule) -> Self {
        self.validation_rules.dependencies = Some(rule);
        self
    }

    /// The name, or the id when the class is unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Iterate over the rules this class actually declares.
    pub fn rules(&self) -> impl Iterator<Item = TagClassRule<'_>> {
        self.validation_rules.iter()
    }
}

/// The sparse rule set attached to a tag class.
///
/// Every sub-rule is optional. A sub-rule that is missing, or present but
/// malformed, deserializes to `None` and is not enforced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagClassRules {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mutual_exclusion: Option<MutualExclusionRule>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub instance_limits: Option<InstanceLimitRule>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub required_context: Option<RequiredContextRule>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category_restrictions: Option<CategoryRestrictionRule>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyRule>,
}

impl TagClassRules {
    /// Iterate over the declared rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = TagClassRule<'_>> {
        [
            self.mutual_exclusion.as_ref().map(TagClassRule::MutualExclusion),
            self.instance_limits.as_ref().map(TagClassRule::InstanceLimits),
            self.required_context.as_ref().map(TagClassRule::RequiredContext),
            self.category_restrictions
                .as_ref()
                .map(TagClassRule::CategoryRestrictions),
            self.dependencies.as_ref().map(TagClassRule::Dependencies),
        ]
        .into_iter()
        .flatten()
    }

    /// Check whether no rule is declared at all.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// A single declared rule, borrowed from its [`TagClassRules`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TagClassRule<'a> {
    MutualExclusion(&'a MutualExclusionRule),
    InstanceLimits(&'a InstanceLimitRule),
    RequiredContext(&'a RequiredContextRule),
    CategoryRestrictions(&'a CategoryRestrictionRule),
    Dependencies(&'a DependencyRule),
}

impl TagClassRule<'_> {
    /// Stable name of the rule kind.
    pub fn name(&self) -> &'static str {
        match self {
            TagClassRule::MutualExclusion(_) => "mutual_exclusion",
            TagClassRule::InstanceLimits(_) => "instance_limits",
            TagClassRule::RequiredContext(_) => "required_context",
            TagClassRule::CategoryRestrictions(_) => "category_restrictions",
            TagClassRule::Dependencies(_) => "dependencies",
        }
    }
}

/// Tags that may not be combined.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutualExclusionRule {
    /// At most one tag of this class may be applied.
    #[serde(default)]
    pub within_class: bool,

    /// Tag ids that may not be applied alongside this class.
    #[serde(default)]
    pub conflicting_tags: Vec<String>,

    /// Class ids whose tags may not be applied alongside this class.
    #[serde(default)]
    pub conflicting_classes: Vec<String>,
}

/// Bounds on how many tags of a class may be applied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceLimitRule {
    #[serde(default)]
    pub max_instances: Option<usize>,

    #[serde(default)]
    pub min_instances: Option<usize>,

    #[serde(default)]
    pub exact_instances: Option<usize>,
}

/// Context that must be present whenever a tag of the class is applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequiredContextRule {
    #[serde(default)]
    pub required_tags: Vec<String>,

    #[serde(default)]
    pub required_classes: Vec<String>,

    /// Metadata key to expected value. A `null` value only requires the key.
    #[serde(default)]
    pub required_metadata: HashMap<String, serde_json::Value>,
}

/// Restrictions on the categories of member tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryRestrictionRule {
    /// When non-empty, member tags must use one of these categories.
    #[serde(default)]
    pub applicable_categories: Vec<String>,

    #[serde(default)]
    pub excluded_categories: Vec<String>,

    /// Plot block ids that must be selected.
    #[serde(default)]
    pub required_plot_blocks: Vec<String>,
}

/// Relationships from the class to other tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyRule {
    /// Hard requirements; unmet entries are errors.
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub enhances: Vec<String>,

    #[serde(default)]
    pub enables: Vec<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_rules<'de, D>(deserializer: D) -> Result<TagClassRules, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_iterate_in_order() {
        let class = TagClass::new("pairing", "Pairing")
            .with_dependencies(DependencyRule::default())
            .with_mutual_exclusion(MutualExclusionRule {
                within_class: true,
                ..Default::default()
            });

        let names: Vec<_> = class.rules().map(|r| r.name()).collect();
        assert_eq!(names, vec!["mutual_exclusion", "dependencies"]);
    }

    #[test]
    fn test_empty_rules() {
        let class = TagClass::new("genre", "Genre");
        assert!(class.validation_rules.is_empty());
        assert_eq!(class.rules().count(), 0);
    }

    #[test]
    fn test_malformed_rule_is_absent() {
        let class: TagClass = serde_json::from_str(
            r#"{
                "id": "pairing",
                "validation_rules": {
                    "mutual_exclusion": "yes please",
                    "instance_limits": {"max_instances": 2}
                }
            }"#,
        )
        .unwrap();

        assert!(class.validation_rules.mutual_exclusion.is_none());
        assert_eq!(
            class.validation_rules.instance_limits,
            Some(InstanceLimitRule {
                max_instances: Some(2),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_missing_validation_rules() {
        let class: TagClass = serde_json::from_str(r#"{"id": "loose"}"#).unwrap();
        assert!(class.validation_rules.is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(TagClass::new("ship", "Ships").display_name(), "Ships");
        assert_eq!(TagClass::new("ship", "").display_name(), "ship");
    }

    #[test]
    fn test_null_validation_rules() {
        let class: TagClass =
            serde_json::from_str(r#"{"id": "c", "validation_rules": null}"#).unwrap();
        assert!(class.validation_rules.is_empty());
    }

    #[test]
    fn test_non_object_validation_rules() {
        for rules in [r#""bad""#, "42", r#"["mutual_exclusion"]"#] {
            let json = format!(r#"{{"id": "c", "name": "C", "validation_rules": {}}}"#, rules);
            let class: TagClass = serde_json::from_str(&json).unwrap();
            assert_eq!(class.name, "C");
            assert!(class.validation_rules.is_empty());
        }
    }

    #[test]
    fn test_partial_sub_rule() {
        let class: TagClass = serde_json::from_str(
            r#"{"id": "c", "validation_rules": {"required_context": {"required_tags": ["a"]}}}"#,
        )
        .unwrap();

        let context = class.validation_rules.required_context.unwrap();
        assert_eq!(context.required_tags, vec!["a".to_string()]);
        assert!(context.required_classes.is_empty());
        assert!(context.required_metadata.is_empty());
    }
}
