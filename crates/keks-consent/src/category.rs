//! Consent categories
//!
//! Categories are configured by the host, so they are kept as an ordered list
//! rather than fixed fields. Required categories are always granted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConsentError;
use crate::record::Categories;
use crate::Result;

/// Key of the conventional always-on category
pub const NECESSARY: &str = "necessary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub key: String,
    pub required: bool,
    /// Display name shown next to the checkbox
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryDefinition {
    pub fn new(key: impl Into<String>, required: bool) -> Self {
        Self {
            key: key.into(),
            required,
            name: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryModel {
    categories: Vec<CategoryDefinition>,
}

impl CategoryModel {
    /// Build a model from host-supplied definitions, keeping declaration order.
    ///
    /// Keys must be non-empty and unique. A category named `necessary` is
    /// always required, whatever the host sent.
    pub fn new(definitions: Vec<CategoryDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(definitions.len());

        for mut definition in definitions {
            let key = definition.key.trim();
            if key.is_empty() || key.chars().any(char::is_whitespace) {
                return Err(ConsentError::InvalidCategory(definition.key));
            }
            if !seen.insert(key.to_string()) {
                return Err(ConsentError::DuplicateCategory(key.to_string()));
            }

            definition.key = key.to_string();
            if definition.key == NECESSARY {
                definition.required = true;
            }
            categories.push(definition);
        }

        Ok(Self { categories })
    }

    /// necessary (required), statistics, marketing
    pub fn defaults() -> Self {
        Self {
            categories: vec![
                CategoryDefinition::new(NECESSARY, true),
                CategoryDefinition::new("statistics", false),
                CategoryDefinition::new("marketing", false),
            ],
        }
    }

    pub fn all_keys(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.key.as_str()).collect()
    }

    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn get(&self, key: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Unknown keys are not required
    pub fn is_required(&self, key: &str) -> bool {
        self.get(key).map(|c| c.required).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn accept_all_selection(&self) -> Categories {
        self.categories
            .iter()
            .map(|c| (c.key.clone(), true))
            .collect()
    }

    pub fn reject_all_selection(&self) -> Categories {
        self.categories
            .iter()
            .map(|c| (c.key.clone(), c.required))
            .collect()
    }

    /// Force every required category to granted, leaving the rest untouched
    pub fn enforce_required(&self, mut selection: Categories) -> Categories {
        for category in self.categories.iter().filter(|c| c.required) {
            selection.insert(category.key.clone(), true);
        }
        selection
    }
}

impl Default for CategoryModel {
    fn default() -> Self {
        Self::defaults()
    }
}
