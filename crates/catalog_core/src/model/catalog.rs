//! Composite catalog record returned by the filtered catalog listing.

use super::author::Author;
use super::book::Book;
use super::category::Category;
use serde::{Deserialize, Serialize};

/// One book with its author and every active category it is linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub book: Book,
    pub author: Author,
    /// Active categories ordered by `category_id ASC`.
    pub categories: Vec<Category>,
}
