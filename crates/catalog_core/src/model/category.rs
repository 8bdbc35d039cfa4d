//! Category domain model.
//!
//! # Responsibility
//! - Define the self-referencing category tree node.
//!
//! # Invariants
//! - "No parent" is `None` in memory and `NULL` on disk; empty strings are
//!   never used as a root sentinel.
//! - A category cannot be its own parent.

use super::validation::{validate_identifier, validate_name, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Caller-assigned stable category identifier.
pub type CategoryId = String;

/// Category read model with the parent display name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: CategoryId,
    pub name: String,
    /// Parent category id. `None` means root.
    pub parent_uuid: Option<CategoryId>,
    /// Parent display name from the self-join. `None` for roots.
    pub parent_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    /// Returns whether this category is a tree root.
    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }
}

/// Mutable category fields supplied on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub category_id: CategoryId,
    pub name: String,
    pub parent_uuid: Option<CategoryId>,
}

impl CategoryInput {
    /// Creates a root category input.
    pub fn root(category_id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            name: name.into(),
            parent_uuid: None,
        }
    }

    /// Creates a child category input under `parent_uuid`.
    pub fn child(
        category_id: impl Into<CategoryId>,
        name: impl Into<String>,
        parent_uuid: impl Into<CategoryId>,
    ) -> Self {
        Self {
            category_id: category_id.into(),
            name: name.into(),
            parent_uuid: Some(parent_uuid.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_identifier("category.category_id", &self.category_id)?;
        validate_name("category.name", &self.name)?;
        if let Some(parent_uuid) = self.parent_uuid.as_deref() {
            validate_identifier("category.parent_uuid", parent_uuid)?;
            if parent_uuid == self.category_id {
                return Err(ModelValidationError::SelfParent(self.category_id.clone()));
            }
        }
        Ok(())
    }
}

/// Normalizes wire-level parent values: blank strings mean "no parent".
pub fn normalize_parent(value: Option<String>) -> Option<CategoryId> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
