//! Author domain model.

use super::book::AuthorId;
use super::validation::{validate_identifier, validate_name, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Author read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: AuthorId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Mutable author fields supplied on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInput {
    pub author_id: AuthorId,
    pub name: String,
}

impl AuthorInput {
    pub fn new(author_id: impl Into<AuthorId>, name: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_identifier("author.author_id", &self.author_id)?;
        validate_name("author.name", &self.name)
    }
}
