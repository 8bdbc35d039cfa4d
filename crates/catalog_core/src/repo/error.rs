//! Error taxonomy shared by every catalog repository.
//!
//! # Invariants
//! - Repositories surface the specific failure kind and never retry.
//! - Transport status semantics are not encoded here; see
//!   `service::catalog_service` for that mapping.

use crate::context::ContextError;
use crate::db::DbError;
use crate::model::category::CategoryId;
use crate::model::validation::ModelValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity kind named by [`RepoError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Book,
    BookCategory,
    Author,
    Category,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::BookCategory => "book category association",
            Self::Author => "author",
            Self::Category => "category",
        }
    }
}

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// A targeted get/update/delete matched zero non-deleted rows.
    NotFound { entity: EntityKind, id: String },
    /// Store-level foreign key / uniqueness / not-null rule rejected a write.
    ConstraintViolation(String),
    /// Category delete blocked because active children still point to it.
    HasChildren {
        category_id: CategoryId,
        children: u64,
    },
    /// Category delete blocked because active books are still filed under it.
    CategoryInUse {
        category_id: CategoryId,
        books: u64,
    },
    /// Caller input outside the accepted domain (pagination, filters).
    InvalidArgument(String),
    /// Write input failed model validation.
    Validation(ModelValidationError),
    /// Request context was cancelled.
    Cancelled,
    /// Request context deadline passed.
    DeadlineExceeded,
    /// Connection or statement failure unrelated to the data itself.
    Db(DbError),
    /// Persisted row cannot be mapped into a read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub(crate) fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::HasChildren { .. } => "has_children",
            Self::CategoryInUse { .. } => "category_in_use",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Validation(_) => "validation_failed",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Db(_) => "store_unavailable",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::HasChildren {
                category_id,
                children,
            } => write!(
                f,
                "category {category_id} has {children} active subcategories"
            ),
            Self::CategoryInUse { category_id, books } => {
                write!(f, "category {category_id} is used by {books} active books")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::DeadlineExceeded => write!(f, "operation deadline exceeded"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "catalog repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ContextError> for RepoError {
    fn from(value: ContextError) -> Self {
        match value {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation(value.to_string()),
            Some(ErrorCode::OperationInterrupted) => Self::Cancelled,
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}
