//! Catalog core: books, authors and a category tree over SQLite.
//!
//! Repositories own persistence and invariants; `CatalogService` is the
//! request-scoped entry point for callers.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CatalogConfig, ConfigLoadError};
pub use context::{ContextError, RequestContext};
pub use db::{open_db, open_db_in_memory, DbError, DbPool, PoolOptions};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::author::{Author, AuthorInput};
pub use model::book::{AuthorId, Book, BookId, BookInput};
pub use model::catalog::CatalogEntry;
pub use model::category::{Category, CategoryId, CategoryInput};
pub use model::validation::ModelValidationError;
pub use repo::author_repo::{AuthorRepository, SqliteAuthorRepository};
pub use repo::book_repo::{BookRepository, SqliteBookRepository};
pub use repo::catalog_query::{
    CatalogFilter, CatalogQuery, CatalogRepository, SqliteCatalogRepository,
};
pub use repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
pub use repo::error::{EntityKind, RepoError, RepoResult};
pub use repo::pagination::{ListPage, PageRequest, MAX_PAGE_LIMIT};
pub use service::catalog_service::{
    CatalogService, CreateAuthorRequest, CreateBookRequest, CreateCategoryRequest, ServiceError,
    ServiceResult, StatusKind,
};

/// Liveness check.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
