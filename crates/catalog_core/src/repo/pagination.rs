//! Shared pagination arithmetic and active-row counting.
//!
//! # Invariants
//! - `page` is 1-indexed; `offset = (page - 1) * limit`.
//! - Non-positive `page`/`limit` never reach the store.
//! - Counts always come from a separate `COUNT(*)` over non-deleted rows,
//!   never from the fetched page size.

use super::error::{RepoError, RepoResult};
use rusqlite::Connection;

/// Largest page size accepted by list operations.
pub const MAX_PAGE_LIMIT: i64 = 1_000;

/// Validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    limit: i64,
    offset: i64,
}

impl PageRequest {
    /// Validates a 1-indexed page and a page size.
    pub fn new(page: i64, limit: i64) -> RepoResult<Self> {
        if page <= 0 {
            return Err(RepoError::InvalidArgument(format!(
                "page must be >= 1, got {page}"
            )));
        }
        if limit <= 0 {
            return Err(RepoError::InvalidArgument(format!(
                "limit must be >= 1, got {limit}"
            )));
        }
        if limit > MAX_PAGE_LIMIT {
            return Err(RepoError::InvalidArgument(format!(
                "limit must be <= {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
            RepoError::InvalidArgument(format!("page {page} with limit {limit} overflows offset"))
        })?;
        Ok(Self {
            page,
            limit,
            offset,
        })
    }

    /// First page of `limit` rows.
    pub fn first(limit: i64) -> RepoResult<Self> {
        Self::new(1, limit)
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// One page of items plus the total number of matching active rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub count: u64,
}

/// Tables whose active rows can be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountTarget {
    Books,
    Authors,
    Categories,
}

impl CountTarget {
    fn sql(self) -> &'static str {
        match self {
            Self::Books => "SELECT COUNT(*) FROM books WHERE deleted_at IS NULL;",
            Self::Authors => "SELECT COUNT(*) FROM authors WHERE deleted_at IS NULL;",
            Self::Categories => "SELECT COUNT(*) FROM categories WHERE deleted_at IS NULL;",
        }
    }
}

/// Counts non-deleted rows of `target`.
pub fn count_active(conn: &Connection, target: CountTarget) -> RepoResult<u64> {
    let count: i64 = conn.query_row(target.sql(), [], |row| row.get(0))?;
    u64::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
}
