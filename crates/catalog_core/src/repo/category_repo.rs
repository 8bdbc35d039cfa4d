//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the self-referencing `categories` tree.
//! - Resolve parent display names with a left self-join.
//! - Guard the hierarchy: categories with active children or active books
//!   cannot be deleted.
//!
//! # Invariants
//! - Root categories persist `parent_uuid` as `NULL`, never `''`.
//! - Parents must be active on create/update, and an update may not move a
//!   category under its own subtree.
//! - Child/book-count checks and tombstone write share one IMMEDIATE
//!   transaction, so a concurrent insert cannot slip between them.
//! - An active book never points at a deleted category.

use super::error::{EntityKind, RepoError, RepoResult};
use super::pagination::{count_active, CountTarget, ListPage, PageRequest};
use super::{
    ensure_catalog_connection_ready, ensure_reference_active, now_epoch_ms, Reference,
};
use crate::context::RequestContext;
use crate::model::category::{Category, CategoryInput};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

pub(crate) const CATEGORY_SELECT_SQL: &str = "SELECT
    cat.category_id AS category_id,
    cat.name AS name,
    cat.parent_uuid AS parent_uuid,
    parent.name AS parent_name,
    cat.created_at AS created_at,
    cat.updated_at AS updated_at
FROM categories cat
LEFT JOIN categories parent ON parent.category_id = cat.parent_uuid";

/// Repository interface for category tree operations.
pub trait CategoryRepository {
    /// Inserts a root or child category and returns the read-back row.
    fn create_category(&self, input: &CategoryInput) -> RepoResult<Category>;
    /// Loads one active category with its parent name.
    fn get_category(&self, category_id: &str) -> RepoResult<Category>;
    /// Lists active categories by `category_id ASC` plus the active count.
    fn list_categories(&self, page: &PageRequest) -> RepoResult<ListPage<Category>>;
    /// Lists direct active children of one active category.
    fn list_children(&self, parent_id: &str) -> RepoResult<Vec<Category>>;
    /// Overwrites name and parent; `None` parent makes the category a root.
    fn update_category(&self, input: &CategoryInput) -> RepoResult<Category>;
    /// Soft-deletes one leaf category that no active book is filed under.
    fn delete_category(&self, category_id: &str) -> RepoResult<()>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
    ctx: RequestContext,
}

impl<'conn> SqliteCategoryRepository<'conn> {
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

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn create_category(&self, input: &CategoryInput) -> RepoResult<Category> {
        input.validate()?;
        self.ctx.check()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(parent_uuid) = input.parent_uuid.as_deref() {
            ensure_reference_active(&tx, Reference::Category, parent_uuid)?;
        }

        tx.execute(
            "INSERT INTO categories (
                category_id,
                name,
                parent_uuid,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                input.category_id.as_str(),
                input.name.as_str(),
                input.parent_uuid.as_deref(),
                now_epoch_ms(),
            ],
        )?;

        let category = load_category(&tx, &input.category_id)?;
        tx.commit()?;
        Ok(category)
    }

    fn get_category(&self, category_id: &str) -> RepoResult<Category> {
        self.ctx.check()?;
        load_category(self.conn, category_id)
    }

    fn list_categories(&self, page: &PageRequest) -> RepoResult<ListPage<Category>> {
        self.ctx.check()?;
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE cat.deleted_at IS NULL
             ORDER BY cat.category_id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![page.limit(), page.offset()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_category_row(row)?);
        }

        self.ctx.check()?;
        let count = count_active(self.conn, CountTarget::Categories)?;
        Ok(ListPage { items, count })
    }

    fn list_children(&self, parent_id: &str) -> RepoResult<Vec<Category>> {
        self.ctx.check()?;
        load_category(self.conn, parent_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE cat.parent_uuid = ?1
               AND cat.deleted_at IS NULL
             ORDER BY cat.category_id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_category_row(row)?);
        }
        Ok(items)
    }

    fn update_category(&self, input: &CategoryInput) -> RepoResult<Category> {
        input.validate()?;
        self.ctx.check()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE categories
             SET
                name = ?2,
                parent_uuid = ?3,
                updated_at = MAX(?4, updated_at + 1)
             WHERE category_id = ?1
               AND deleted_at IS NULL;",
            params![
                input.category_id.as_str(),
                input.name.as_str(),
                input.parent_uuid.as_deref(),
                now_epoch_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                EntityKind::Category,
                &input.category_id,
            ));
        }

        if let Some(parent_uuid) = input.parent_uuid.as_deref() {
            ensure_reference_active(&tx, Reference::Category, parent_uuid)?;
            if parent_chain_contains(&tx, parent_uuid, &input.category_id)? {
                return Err(RepoError::InvalidArgument(format!(
                    "moving category {} under {parent_uuid} would create a cycle",
                    input.category_id
                )));
            }
        }

        let category = load_category(&tx, &input.category_id)?;
        tx.commit()?;
        Ok(category)
    }

    fn delete_category(&self, category_id: &str) -> RepoResult<()> {
        self.ctx.check()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let children: i64 = tx.query_row(
            "SELECT COUNT(*)
             FROM categories
             WHERE parent_uuid = ?1
               AND deleted_at IS NULL;",
            [category_id],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Err(RepoError::HasChildren {
                category_id: category_id.to_string(),
                children: children.unsigned_abs(),
            });
        }

        let books: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT bc.book_id)
             FROM book_categories bc
             INNER JOIN books b ON b.book_id = bc.book_id
             WHERE bc.category_id = ?1
               AND b.deleted_at IS NULL;",
            [category_id],
            |row| row.get(0),
        )?;
        if books > 0 {
            return Err(RepoError::CategoryInUse {
                category_id: category_id.to_string(),
                books: books.unsigned_abs(),
            });
        }

        self.ctx.check()?;
        let changed = tx.execute(
            "UPDATE categories
             SET deleted_at = ?2,
                 updated_at = MAX(?2, updated_at + 1)
             WHERE category_id = ?1
               AND deleted_at IS NULL;",
            params![category_id, now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Category, category_id));
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_category(conn: &Connection, category_id: &str) -> RepoResult<Category> {
    let mut stmt = conn.prepare(&format!(
        "{CATEGORY_SELECT_SQL}
         WHERE cat.category_id = ?1
           AND cat.deleted_at IS NULL;"
    ))?;
    let mut rows = stmt.query([category_id])?;
    if let Some(row) = rows.next()? {
        return parse_category_row(row);
    }
    Err(RepoError::not_found(EntityKind::Category, category_id))
}

/// Walks up from `start` through `parent_uuid` links looking for `target`.
fn parent_chain_contains(conn: &Connection, start: &str, target: &str) -> RepoResult<bool> {
    let found: i64 = conn.query_row(
        "WITH RECURSIVE ancestors(category_id) AS (
            SELECT ?1
            UNION
            SELECT c.parent_uuid
            FROM categories c
            INNER JOIN ancestors a ON c.category_id = a.category_id
            WHERE c.parent_uuid IS NOT NULL
        )
        SELECT EXISTS(SELECT 1 FROM ancestors WHERE category_id = ?2);",
        params![start, target],
        |row| row.get(0),
    )?;
    Ok(found == 1)
}

pub(crate) fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    Ok(Category {
        category_id: row.get("category_id")?,
        name: row.get("name")?,
        parent_uuid: row.get("parent_uuid")?,
        parent_name: row.get("parent_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
