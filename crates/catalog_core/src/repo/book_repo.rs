//! Book repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and paginated listing over `books` plus its single
//!   `book_categories` association.
//!
//! # Invariants
//! - Book row and association row are written in one transaction.
//! - Update overwrites the association's category id instead of inserting a
//!   second association.
//! - Reads hydrate the category through an inner join on the association.

use super::error::{EntityKind, RepoError, RepoResult};
use super::pagination::{count_active, CountTarget, ListPage, PageRequest};
use super::{
    ensure_catalog_connection_ready, ensure_reference_active, now_epoch_ms, Reference,
};
use crate::context::RequestContext;
use crate::model::book::{Book, BookInput};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

// `MIN(c.category_id)` keeps one row per book even if several associations
// exist; SQLite takes the bare `c.name` from that same row.
const BOOK_SELECT_SQL: &str = "SELECT
    b.book_id AS book_id,
    b.name AS name,
    b.author_id AS author_id,
    b.price AS price,
    MIN(c.category_id) AS category_id,
    c.name AS category_name,
    b.created_at AS created_at,
    b.updated_at AS updated_at
FROM books b
INNER JOIN book_categories bc ON bc.book_id = b.book_id
INNER JOIN categories c ON c.category_id = bc.category_id";

/// Repository interface for book CRUD operations.
pub trait BookRepository {
    /// Inserts book + association and returns the read-back book.
    fn create_book(&self, input: &BookInput) -> RepoResult<Book>;
    /// Loads one active book with its category.
    fn get_book(&self, book_id: &str) -> RepoResult<Book>;
    /// Lists active books by `book_id ASC` plus the total active count.
    fn list_books(&self, page: &PageRequest) -> RepoResult<ListPage<Book>>;
    /// Overwrites mutable fields and the association; returns read-back.
    fn update_book(&self, input: &BookInput) -> RepoResult<Book>;
    /// Soft-deletes one active book.
    fn delete_book(&self, book_id: &str) -> RepoResult<()>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
    ctx: RequestContext,
}

impl<'conn> SqliteBookRepository<'conn> {
    /// Wraps an already migrated connection (e.g. one from `DbPool`).
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ctx: RequestContext::background(),
        }
    }

    /// Wraps a caller-provided connection after verifying its schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self::new(conn))
    }

    /// Binds request cancellation/deadline checks to this repository.
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.ctx = ctx.clone();
        self
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn create_book(&self, input: &BookInput) -> RepoResult<Book> {
        input.validate()?;
        self.ctx.check()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_reference_active(&tx, Reference::Author, &input.author_id)?;
        ensure_reference_active(&tx, Reference::Category, &input.category_id)?;

        let now = now_epoch_ms();
        tx.execute(
            "INSERT INTO books (
                book_id,
                name,
                author_id,
                price,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
            params![
                input.book_id.as_str(),
                input.name.as_str(),
                input.author_id.as_str(),
                input.price,
                now,
            ],
        )?;

        self.ctx.check()?;
        tx.execute(
            "INSERT INTO book_categories (book_id, category_id) VALUES (?1, ?2);",
            params![input.book_id.as_str(), input.category_id.as_str()],
        )?;

        let book = load_book(&tx, &input.book_id)?;
        tx.commit()?;
        Ok(book)
    }

    fn get_book(&self, book_id: &str) -> RepoResult<Book> {
        self.ctx.check()?;
        load_book(self.conn, book_id)
    }

    fn list_books(&self, page: &PageRequest) -> RepoResult<ListPage<Book>> {
        self.ctx.check()?;
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             WHERE b.deleted_at IS NULL
             GROUP BY b.book_id
             ORDER BY b.book_id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;

        let mut rows = stmt.query(params![page.limit(), page.offset()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_book_row(row)?);
        }

        self.ctx.check()?;
        let count = count_active(self.conn, CountTarget::Books)?;
        Ok(ListPage { items, count })
    }

    fn update_book(&self, input: &BookInput) -> RepoResult<Book> {
        input.validate()?;
        self.ctx.check()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE books
             SET
                name = ?2,
                author_id = ?3,
                price = ?4,
                updated_at = MAX(?5, updated_at + 1)
             WHERE book_id = ?1
               AND deleted_at IS NULL;",
            params![
                input.book_id.as_str(),
                input.name.as_str(),
                input.author_id.as_str(),
                input.price,
                now_epoch_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Book, &input.book_id));
        }

        ensure_reference_active(&tx, Reference::Author, &input.author_id)?;
        ensure_reference_active(&tx, Reference::Category, &input.category_id)?;

        self.ctx.check()?;
        let changed = tx.execute(
            "UPDATE book_categories SET category_id = ?2 WHERE book_id = ?1;",
            params![input.book_id.as_str(), input.category_id.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                EntityKind::BookCategory,
                &input.book_id,
            ));
        }

        let book = load_book(&tx, &input.book_id)?;
        tx.commit()?;
        Ok(book)
    }

    fn delete_book(&self, book_id: &str) -> RepoResult<()> {
        self.ctx.check()?;
        let changed = self.conn.execute(
            "UPDATE books
             SET deleted_at = ?2,
                 updated_at = MAX(?2, updated_at + 1)
             WHERE book_id = ?1
               AND deleted_at IS NULL;",
            params![book_id, now_epoch_ms()],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Book, book_id));
        }
        Ok(())
    }
}

fn load_book(conn: &Connection, book_id: &str) -> RepoResult<Book> {
    let mut stmt = conn.prepare(&format!(
        "{BOOK_SELECT_SQL}
         WHERE b.book_id = ?1
           AND b.deleted_at IS NULL
         GROUP BY b.book_id;"
    ))?;
    let mut rows = stmt.query([book_id])?;
    if let Some(row) = rows.next()? {
        return parse_book_row(row);
    }
    Err(RepoError::not_found(EntityKind::Book, book_id))
}

pub(crate) fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let price: f64 = row.get("price")?;
    if !price.is_finite() {
        let book_id: String = row.get("book_id")?;
        return Err(RepoError::InvalidData(format!(
            "non-finite price in books.price for `{book_id}`"
        )));
    }

    Ok(Book {
        book_id: row.get("book_id")?,
        name: row.get("name")?,
        author_id: row.get("author_id")?,
        price,
        category_id: row.get("category_id")?,
        category_name: row.get("category_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
