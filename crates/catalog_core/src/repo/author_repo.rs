//! Author repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Same CRUD shape as books, without an association table.
//! - Update/delete only match active rows.

use super::error::{EntityKind, RepoError, RepoResult};
use super::pagination::{count_active, CountTarget, ListPage, PageRequest};
use super::{ensure_catalog_connection_ready, now_epoch_ms};
use crate::context::RequestContext;
use crate::model::author::{Author, AuthorInput};
use rusqlite::{params, Connection, Row};

const AUTHOR_SELECT_SQL: &str = "SELECT
    author_id,
    name,
    created_at,
    updated_at
FROM authors";

/// Repository interface for author CRUD operations.
pub trait AuthorRepository {
    fn create_author(&self, input: &AuthorInput) -> RepoResult<Author>;
    fn get_author(&self, author_id: &str) -> RepoResult<Author>;
    fn list_authors(&self, page: &PageRequest) -> RepoResult<ListPage<Author>>;
    fn update_author(&self, input: &AuthorInput) -> RepoResult<Author>;
    fn delete_author(&self, author_id: &str) -> RepoResult<()>;
}

/// SQLite-backed author repository.
pub struct SqliteAuthorRepository<'conn> {
    conn: &'conn Connection,
    ctx: RequestContext,
}

impl<'conn> SqliteAuthorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ctx: RequestContext::background(),
        }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self::new(conn))
    }

    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.ctx = ctx.clone();
        self
    }
}

impl AuthorRepository for SqliteAuthorRepository<'_> {
    fn create_author(&self, input: &AuthorInput) -> RepoResult<Author> {
        input.validate()?;
        self.ctx.check()?;

        self.conn.execute(
            "INSERT INTO authors (author_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3);",
            params![input.author_id.as_str(), input.name.as_str(), now_epoch_ms()],
        )?;
        load_author(self.conn, &input.author_id)
    }

    fn get_author(&self, author_id: &str) -> RepoResult<Author> {
        self.ctx.check()?;
        load_author(self.conn, author_id)
    }

    fn list_authors(&self, page: &PageRequest) -> RepoResult<ListPage<Author>> {
        self.ctx.check()?;
        let mut stmt = self.conn.prepare(&format!(
            "{AUTHOR_SELECT_SQL}
             WHERE deleted_at IS NULL
             ORDER BY author_id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![page.limit(), page.offset()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_author_row(row)?);
        }

        self.ctx.check()?;
        let count = count_active(self.conn, CountTarget::Authors)?;
        Ok(ListPage { items, count })
    }

    fn update_author(&self, input: &AuthorInput) -> RepoResult<Author> {
        input.validate()?;
        self.ctx.check()?;

        let changed = self.conn.execute(
            "UPDATE authors
             SET
                name = ?2,
                updated_at = MAX(?3, updated_at + 1)
             WHERE author_id = ?1
               AND deleted_at IS NULL;",
            params![input.author_id.as_str(), input.name.as_str(), now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Author, &input.author_id));
        }
        load_author(self.conn, &input.author_id)
    }

    fn delete_author(&self, author_id: &str) -> RepoResult<()> {
        self.ctx.check()?;
        let changed = self.conn.execute(
            "UPDATE authors
             SET deleted_at = ?2,
                 updated_at = MAX(?2, updated_at + 1)
             WHERE author_id = ?1
               AND deleted_at IS NULL;",
            params![author_id, now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Author, author_id));
        }
        Ok(())
    }
}

fn load_author(conn: &Connection, author_id: &str) -> RepoResult<Author> {
    let mut stmt = conn.prepare(&format!(
        "{AUTHOR_SELECT_SQL}
         WHERE author_id = ?1
           AND deleted_at IS NULL;"
    ))?;
    let mut rows = stmt.query([author_id])?;
    if let Some(row) = rows.next()? {
        return parse_author_row(row);
    }
    Err(RepoError::not_found(EntityKind::Author, author_id))
}

fn parse_author_row(row: &Row<'_>) -> RepoResult<Author> {
    Ok(Author {
        author_id: row.get("author_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
