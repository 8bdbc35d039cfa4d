//! Catalog use-case facade.
//!
//! # Responsibility
//! - Provide stable entry points for books, authors, categories and the
//!   filtered catalog listing.
//! - Generate identifiers for creates and normalize wire-level input.
//! - Borrow one pooled connection per call and bind it to the request.
//! - Translate repository failures into transport-neutral status kinds.
//!
//! # Invariants
//! - Inputs are validated before a connection is checked out.
//! - Log lines carry operation metadata only, never names or prices.
//! - Status mapping lives here; repositories never see `StatusKind`.

use crate::context::{ContextError, RequestContext};
use crate::db::DbPool;
use crate::model::author::{Author, AuthorInput};
use crate::model::book::{AuthorId, Book, BookInput};
use crate::model::catalog::CatalogEntry;
use crate::model::category::{normalize_parent, Category, CategoryId, CategoryInput};
use crate::repo::author_repo::{AuthorRepository, SqliteAuthorRepository};
use crate::repo::book_repo::{BookRepository, SqliteBookRepository};
use crate::repo::catalog_query::{CatalogQuery, CatalogRepository, SqliteCatalogRepository};
use crate::repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::pagination::{ListPage, PageRequest};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Transport-neutral outcome category for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    Cancelled,
    DeadlineExceeded,
    Unavailable,
    Internal,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::FailedPrecondition => "failed_precondition",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

/// Error returned by every [`CatalogService`] operation.
#[derive(Debug)]
pub struct ServiceError {
    pub kind: StatusKind,
    pub message: String,
    source: Option<RepoError>,
}

impl ServiceError {
    /// Underlying repository error, when the failure came from storage.
    pub fn repo_error(&self) -> Option<&RepoError> {
        self.source.as_ref()
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| err as &(dyn Error + 'static))
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        let kind = match &value {
            RepoError::NotFound { .. } => StatusKind::NotFound,
            RepoError::InvalidArgument(_) | RepoError::Validation(_) => {
                StatusKind::InvalidArgument
            }
            RepoError::HasChildren { .. }
            | RepoError::CategoryInUse { .. }
            | RepoError::ConstraintViolation(_) => StatusKind::FailedPrecondition,
            RepoError::Cancelled => StatusKind::Cancelled,
            RepoError::DeadlineExceeded => StatusKind::DeadlineExceeded,
            RepoError::Db(_) => StatusKind::Unavailable,
            RepoError::InvalidData(_)
            | RepoError::UninitializedConnection { .. }
            | RepoError::MissingRequiredTable(_)
            | RepoError::MissingRequiredColumn { .. } => StatusKind::Internal,
        };
        Self {
            kind,
            message: value.to_string(),
            source: Some(value),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Create payload for a book; the id is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBookRequest {
    pub name: String,
    pub author_id: AuthorId,
    pub price: f64,
    pub category_id: CategoryId,
}

/// Create payload for an author; the id is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAuthorRequest {
    pub name: String,
}

/// Create payload for a category; the id is generated.
///
/// A blank `parent_uuid` creates a root category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_uuid: Option<String>,
}

/// Request-scoped facade over the catalog repositories.
#[derive(Debug, Clone)]
pub struct CatalogService {
    pool: DbPool,
}

impl CatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn create_book(
        &self,
        ctx: &RequestContext,
        request: &CreateBookRequest,
    ) -> ServiceResult<Book> {
        let input = BookInput::new(
            new_id(),
            request.name.as_str(),
            request.author_id.as_str(),
            request.price,
            request.category_id.as_str(),
        );
        let prepared = input.validate().map(|()| input).map_err(RepoError::from);
        self.run(ctx, "book_create", prepared, |conn, input| {
            SqliteBookRepository::new(conn)
                .with_context(ctx)
                .create_book(&input)
        })
    }

    pub fn get_book(&self, ctx: &RequestContext, book_id: &str) -> ServiceResult<Book> {
        self.run(ctx, "book_get", Ok(()), |conn, ()| {
            SqliteBookRepository::new(conn)
                .with_context(ctx)
                .get_book(book_id)
        })
    }

    pub fn list_books(
        &self,
        ctx: &RequestContext,
        page: i64,
        limit: i64,
    ) -> ServiceResult<ListPage<Book>> {
        self.run(ctx, "book_list", PageRequest::new(page, limit), |conn, page| {
            SqliteBookRepository::new(conn)
                .with_context(ctx)
                .list_books(&page)
        })
    }

    pub fn update_book(&self, ctx: &RequestContext, input: &BookInput) -> ServiceResult<Book> {
        let prepared = input.validate().map_err(RepoError::from);
        self.run(ctx, "book_update", prepared, |conn, ()| {
            SqliteBookRepository::new(conn)
                .with_context(ctx)
                .update_book(input)
        })
    }

    pub fn delete_book(&self, ctx: &RequestContext, book_id: &str) -> ServiceResult<()> {
        self.run(ctx, "book_delete", Ok(()), |conn, ()| {
            SqliteBookRepository::new(conn)
                .with_context(ctx)
                .delete_book(book_id)
        })
    }

    pub fn create_author(
        &self,
        ctx: &RequestContext,
        request: &CreateAuthorRequest,
    ) -> ServiceResult<Author> {
        let input = AuthorInput::new(new_id(), request.name.as_str());
        let prepared = input.validate().map(|()| input).map_err(RepoError::from);
        self.run(ctx, "author_create", prepared, |conn, input| {
            SqliteAuthorRepository::new(conn)
                .with_context(ctx)
                .create_author(&input)
        })
    }

    pub fn get_author(&self, ctx: &RequestContext, author_id: &str) -> ServiceResult<Author> {
        self.run(ctx, "author_get", Ok(()), |conn, ()| {
            SqliteAuthorRepository::new(conn)
                .with_context(ctx)
                .get_author(author_id)
        })
    }

    pub fn list_authors(
        &self,
        ctx: &RequestContext,
        page: i64,
        limit: i64,
    ) -> ServiceResult<ListPage<Author>> {
        self.run(ctx, "author_list", PageRequest::new(page, limit), |conn, page| {
            SqliteAuthorRepository::new(conn)
                .with_context(ctx)
                .list_authors(&page)
        })
    }

    pub fn update_author(
        &self,
        ctx: &RequestContext,
        input: &AuthorInput,
    ) -> ServiceResult<Author> {
        let prepared = input.validate().map_err(RepoError::from);
        self.run(ctx, "author_update", prepared, |conn, ()| {
            SqliteAuthorRepository::new(conn)
                .with_context(ctx)
                .update_author(input)
        })
    }

    pub fn delete_author(&self, ctx: &RequestContext, author_id: &str) -> ServiceResult<()> {
        self.run(ctx, "author_delete", Ok(()), |conn, ()| {
            SqliteAuthorRepository::new(conn)
                .with_context(ctx)
                .delete_author(author_id)
        })
    }

    pub fn create_category(
        &self,
        ctx: &RequestContext,
        request: &CreateCategoryRequest,
    ) -> ServiceResult<Category> {
        let input = CategoryInput {
            category_id: new_id(),
            name: request.name.clone(),
            parent_uuid: normalize_parent(request.parent_uuid.clone()),
        };
        let prepared = input.validate().map(|()| input).map_err(RepoError::from);
        self.run(ctx, "category_create", prepared, |conn, input| {
            SqliteCategoryRepository::new(conn)
                .with_context(ctx)
                .create_category(&input)
        })
    }

    pub fn get_category(
        &self,
        ctx: &RequestContext,
        category_id: &str,
    ) -> ServiceResult<Category> {
        self.run(ctx, "category_get", Ok(()), |conn, ()| {
            SqliteCategoryRepository::new(conn)
                .with_context(ctx)
                .get_category(category_id)
        })
    }

    pub fn list_categories(
        &self,
        ctx: &RequestContext,
        page: i64,
        limit: i64,
    ) -> ServiceResult<ListPage<Category>> {
        self.run(
            ctx,
            "category_list",
            PageRequest::new(page, limit),
            |conn, page| {
                SqliteCategoryRepository::new(conn)
                    .with_context(ctx)
                    .list_categories(&page)
            },
        )
    }

    /// Direct active children of one category.
    pub fn list_child_categories(
        &self,
        ctx: &RequestContext,
        parent_id: &str,
    ) -> ServiceResult<Vec<Category>> {
        self.run(ctx, "category_children", Ok(()), |conn, ()| {
            SqliteCategoryRepository::new(conn)
                .with_context(ctx)
                .list_children(parent_id)
        })
    }

    /// Overwrites name and parent; a blank parent turns the category into a root.
    pub fn update_category(
        &self,
        ctx: &RequestContext,
        input: &CategoryInput,
    ) -> ServiceResult<Category> {
        let input = CategoryInput {
            parent_uuid: normalize_parent(input.parent_uuid.clone()),
            ..input.clone()
        };
        let prepared = input.validate().map(|()| input).map_err(RepoError::from);
        self.run(ctx, "category_update", prepared, |conn, input| {
            SqliteCategoryRepository::new(conn)
                .with_context(ctx)
                .update_category(&input)
        })
    }

    pub fn delete_category(&self, ctx: &RequestContext, category_id: &str) -> ServiceResult<()> {
        self.run(ctx, "category_delete", Ok(()), |conn, ()| {
            SqliteCategoryRepository::new(conn)
                .with_context(ctx)
                .delete_category(category_id)
        })
    }

    /// Filtered catalog listing.
    ///
    /// Recognized filter keys are `authors` and `categories`, each holding a
    /// comma-separated id list.
    pub fn list_catalog(
        &self,
        ctx: &RequestContext,
        page: i64,
        limit: i64,
        filters: &HashMap<String, String>,
    ) -> ServiceResult<ListPage<CatalogEntry>> {
        let prepared = CatalogQuery::from_raw(page, limit, filters);
        self.run(ctx, "catalog_list", prepared, |conn, query| {
            SqliteCatalogRepository::new(conn)
                .with_context(ctx)
                .list_catalog(&query)
        })
    }

    /// Runs `op` on a pooled connection once `prepared` input is valid and
    /// the context is still active.
    fn run<P, T>(
        &self,
        ctx: &RequestContext,
        event: &'static str,
        prepared: RepoResult<P>,
        op: impl FnOnce(&Connection, P) -> RepoResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        let result = prepared.and_then(|prepared| {
            ctx.check()?;
            let conn = self.pool.get(ctx)?;
            op(&*conn, prepared)
        });

        let duration_ms = started_at.elapsed().as_millis();
        match result {
            Ok(value) => {
                info!("event={event} module=service status=ok duration_ms={duration_ms}");
                Ok(value)
            }
            Err(err) => {
                let err = refine_interrupt(ctx, err);
                warn!(
                    "event={event} module=service status=error duration_ms={duration_ms} error_code={}",
                    err.code()
                );
                Err(ServiceError::from(err))
            }
        }
    }
}

/// SQLite reports every interrupt the same way; the context knows whether
/// the cause was a cancel or an expired deadline.
fn refine_interrupt(ctx: &RequestContext, err: RepoError) -> RepoError {
    match err {
        RepoError::Cancelled if ctx.check() == Err(ContextError::DeadlineExceeded) => {
            RepoError::DeadlineExceeded
        }
        other => other,
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::{refine_interrupt, ServiceError, StatusKind};
    use crate::context::RequestContext;
    use crate::model::validation::ModelValidationError;
    use crate::repo::error::{EntityKind, RepoError};
    use std::time::Instant;

    #[test]
    fn repo_errors_map_to_status_kinds() {
        let cases = [
            (
                RepoError::not_found(EntityKind::Book, "b1"),
                StatusKind::NotFound,
            ),
            (
                RepoError::InvalidArgument("page".to_string()),
                StatusKind::InvalidArgument,
            ),
            (
                RepoError::Validation(ModelValidationError::InvalidPrice(-1.0)),
                StatusKind::InvalidArgument,
            ),
            (
                RepoError::HasChildren {
                    category_id: "c1".to_string(),
                    children: 2,
                },
                StatusKind::FailedPrecondition,
            ),
            (
                RepoError::CategoryInUse {
                    category_id: "c1".to_string(),
                    books: 3,
                },
                StatusKind::FailedPrecondition,
            ),
            (
                RepoError::ConstraintViolation("fk".to_string()),
                StatusKind::FailedPrecondition,
            ),
            (RepoError::Cancelled, StatusKind::Cancelled),
            (RepoError::DeadlineExceeded, StatusKind::DeadlineExceeded),
            (
                RepoError::InvalidData("price".to_string()),
                StatusKind::Internal,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ServiceError::from(err).kind, expected);
        }
    }

    #[test]
    fn interrupt_after_deadline_is_reported_as_deadline() {
        let expired = RequestContext::with_deadline(Instant::now());
        assert!(matches!(
            refine_interrupt(&expired, RepoError::Cancelled),
            RepoError::DeadlineExceeded
        ));

        let cancelled = RequestContext::background();
        cancelled.cancel();
        assert!(matches!(
            refine_interrupt(&cancelled, RepoError::Cancelled),
            RepoError::Cancelled
        ));
    }
}
