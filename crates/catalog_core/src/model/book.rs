//! Book domain model.
//!
//! # Responsibility
//! - Define the hydrated book read model and the caller-owned write input.
//!
//! # Invariants
//! - Every book references exactly one author and one active category.
//! - `created_at`/`updated_at` are assigned by storage, never by callers.

use super::category::CategoryId;
use super::validation::{validate_identifier, validate_name, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Caller-assigned stable book identifier.
pub type BookId = String;
/// Caller-assigned stable author identifier.
pub type AuthorId = String;

/// Book read model hydrated with its single category association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub name: String,
    pub author_id: AuthorId,
    pub price: f64,
    /// Category id from `book_categories`.
    pub category_id: CategoryId,
    /// Category display name resolved through the association join.
    pub category_name: String,
    /// UTC epoch milliseconds.
    pub created_at: i64,
    /// UTC epoch milliseconds.
    pub updated_at: i64,
}

/// Mutable book fields supplied on create and update.
///
/// Update is a full overwrite: every field is written, none is patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookInput {
    pub book_id: BookId,
    pub name: String,
    pub author_id: AuthorId,
    pub price: f64,
    pub category_id: CategoryId,
}

impl BookInput {
    pub fn new(
        book_id: impl Into<BookId>,
        name: impl Into<String>,
        author_id: impl Into<AuthorId>,
        price: f64,
        category_id: impl Into<CategoryId>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            name: name.into(),
            author_id: author_id.into(),
            price,
            category_id: category_id.into(),
        }
    }

    /// Checks identifier shapes, name and price before persistence.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_identifier("book.book_id", &self.book_id)?;
        validate_identifier("book.author_id", &self.author_id)?;
        validate_identifier("book.category_id", &self.category_id)?;
        validate_name("book.name", &self.name)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ModelValidationError::InvalidPrice(self.price));
        }
        Ok(())
    }
}
