//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define per-entity data access contracts (books, authors, categories)
//!   and the filtered catalog listing.
//! - Isolate SQLite query details from the service facade.
//!
//! # Invariants
//! - Every read filters `deleted_at IS NULL`; no repository removes rows.
//! - Write paths validate inputs before SQL mutations.
//! - Multi-statement writes run inside one IMMEDIATE transaction and roll
//!   back on any failing step.
//! - Zero rows affected on a targeted update/delete is `NotFound`, never a
//!   silent no-op.

use crate::db::migrations::latest_version;
use rusqlite::Connection;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod author_repo;
pub mod book_repo;
pub mod catalog_query;
pub mod category_repo;
pub mod error;
pub mod pagination;

use error::{RepoError, RepoResult};

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "books",
        &[
            "book_id",
            "name",
            "author_id",
            "price",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    (
        "authors",
        &["author_id", "name", "created_at", "updated_at", "deleted_at"],
    ),
    (
        "categories",
        &[
            "category_id",
            "name",
            "parent_uuid",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    ),
    ("book_categories", &["book_id", "category_id"]),
];

/// Current UTC wall clock in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Foreign rows that writes may reference.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reference {
    Author,
    Category,
}

/// Rejects references to missing or soft-deleted rows.
///
/// The schema's foreign keys only see physical rows; this closes the gap for
/// tombstoned ones.
pub(crate) fn ensure_reference_active(
    conn: &Connection,
    reference: Reference,
    id: &str,
) -> RepoResult<()> {
    let (sql, label) = match reference {
        Reference::Author => (
            "SELECT EXISTS(
                SELECT 1 FROM authors WHERE author_id = ?1 AND deleted_at IS NULL
            );",
            "author",
        ),
        Reference::Category => (
            "SELECT EXISTS(
                SELECT 1 FROM categories WHERE category_id = ?1 AND deleted_at IS NULL
            );",
            "category",
        ),
    };
    let exists: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::ConstraintViolation(format!(
            "{label} `{id}` does not exist or is deleted"
        )))
    }
}

/// Verifies a caller-provided connection carries the migrated catalog schema.
pub(crate) fn ensure_catalog_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
