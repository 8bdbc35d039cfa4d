//! Filtered catalog listing across books, categories and authors.
//!
//! # Responsibility
//! - Translate typed filter dimensions into bound SQL predicates.
//! - Join association, book, category and author rows into one composite
//!   record per book, then attach every active category of that book.
//!
//! # Invariants
//! - Filters are ANDed; values within one filter are ORed (`IN`).
//! - A present filter with an empty id set matches nothing; an absent filter
//!   matches everything.
//! - Only validated identifiers are ever bound; no filter text is spliced
//!   into SQL.
//! - Results are grouped per book and ordered by `book_id ASC`.
//! - Deleted books, books of deleted authors and deleted categories never
//!   appear, neither as a match nor as a book's primary category.

use super::book_repo::parse_book_row;
use super::category_repo::{parse_category_row, CATEGORY_SELECT_SQL};
use super::ensure_catalog_connection_ready;
use super::error::{RepoError, RepoResult};
use super::pagination::{ListPage, PageRequest};
use crate::context::RequestContext;
use crate::model::author::Author;
use crate::model::book::AuthorId;
use crate::model::catalog::CatalogEntry;
use crate::model::category::{Category, CategoryId};
use crate::model::validation::is_valid_identifier;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::{BTreeSet, HashMap};

/// Raw filter key selecting books by author ids.
pub const AUTHORS_FILTER_KEY: &str = "authors";
/// Raw filter key selecting books by category ids.
pub const CATEGORIES_FILTER_KEY: &str = "categories";

const FILTER_DELIMITER: char = ',';

const CATALOG_FROM_SQL: &str = "FROM book_categories bc
INNER JOIN books b ON b.book_id = bc.book_id
INNER JOIN categories c ON c.category_id = bc.category_id
INNER JOIN authors a ON a.author_id = b.author_id";

const CATALOG_SELECT_SQL: &str = "SELECT
    b.book_id AS book_id,
    b.name AS name,
    b.author_id AS author_id,
    b.price AS price,
    MIN(c.category_id) AS category_id,
    c.name AS category_name,
    b.created_at AS created_at,
    b.updated_at AS updated_at,
    a.name AS author_name,
    a.created_at AS author_created_at,
    a.updated_at AS author_updated_at";

/// One supported filter dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogFilter {
    ByAuthors(BTreeSet<AuthorId>),
    ByCategories(BTreeSet<CategoryId>),
}

impl CatalogFilter {
    /// Parses one raw `key=value` pair, where value is a comma list of ids.
    ///
    /// Blank tokens are dropped, so `""` yields an empty set (matches
    /// nothing). Any token with an invalid identifier shape is rejected.
    pub fn parse(key: &str, raw: &str) -> RepoResult<Self> {
        match key {
            AUTHORS_FILTER_KEY => Ok(Self::ByAuthors(parse_id_set(key, raw)?)),
            CATEGORIES_FILTER_KEY => Ok(Self::ByCategories(parse_id_set(key, raw)?)),
            other => Err(RepoError::InvalidArgument(format!(
                "unknown catalog filter `{other}`; expected {AUTHORS_FILTER_KEY}|{CATEGORIES_FILTER_KEY}"
            ))),
        }
    }

    /// Parses a string-keyed filter map in a deterministic order.
    pub fn parse_map(filters: &HashMap<String, String>) -> RepoResult<Vec<Self>> {
        let mut keys: Vec<&String> = filters.keys().collect();
        keys.sort();

        let mut parsed = Vec::with_capacity(keys.len());
        for key in keys {
            parsed.push(Self::parse(key, &filters[key])?);
        }
        Ok(parsed)
    }

    fn column(&self) -> &'static str {
        match self {
            Self::ByAuthors(_) => "a.author_id",
            Self::ByCategories(_) => "c.category_id",
        }
    }

    fn ids(&self) -> &BTreeSet<String> {
        match self {
            Self::ByAuthors(ids) | Self::ByCategories(ids) => ids,
        }
    }

    /// SQL fragment plus its bind values.
    fn predicate(&self) -> (String, Vec<Value>) {
        let ids = self.ids();
        if ids.is_empty() {
            return ("1 = 0".to_string(), Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let values = ids.iter().map(|id| Value::Text(id.clone())).collect();
        (format!("{} IN ({placeholders})", self.column()), values)
    }
}

fn parse_id_set(key: &str, raw: &str) -> RepoResult<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    for token in raw.split(FILTER_DELIMITER).map(str::trim) {
        if token.is_empty() {
            continue;
        }
        if !is_valid_identifier(token) {
            return Err(RepoError::InvalidArgument(format!(
                "invalid identifier `{token}` in `{key}` filter"
            )));
        }
        ids.insert(token.to_string());
    }
    Ok(ids)
}

/// Page window plus filters for [`CatalogRepository::list_catalog`].
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub page: PageRequest,
    pub filters: Vec<CatalogFilter>,
}

impl CatalogQuery {
    /// Unfiltered query over all active books.
    pub fn new(page: PageRequest) -> Self {
        Self {
            page,
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: CatalogFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Builds a query from raw pagination numbers and a string-keyed map.
    pub fn from_raw(page: i64, limit: i64, filters: &HashMap<String, String>) -> RepoResult<Self> {
        Ok(Self {
            page: PageRequest::new(page, limit)?,
            filters: CatalogFilter::parse_map(filters)?,
        })
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "WHERE b.deleted_at IS NULL AND a.deleted_at IS NULL AND c.deleted_at IS NULL",
        );
        let mut values = Vec::new();
        for filter in &self.filters {
            let (fragment, bind) = filter.predicate();
            sql.push_str(" AND ");
            sql.push_str(&fragment);
            values.extend(bind);
        }
        (sql, values)
    }
}

/// Repository interface for the filtered catalog listing.
pub trait CatalogRepository {
    /// Lists composite book/author/categories records matching `query`.
    ///
    /// `count` is the number of distinct books matching the same filters,
    /// independent of the page window.
    fn list_catalog(&self, query: &CatalogQuery) -> RepoResult<ListPage<CatalogEntry>>;
}

/// SQLite-backed catalog composer.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
    ctx: RequestContext,
}

impl<'conn> SqliteCatalogRepository<'conn> {
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

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn list_catalog(&self, query: &CatalogQuery) -> RepoResult<ListPage<CatalogEntry>> {
        self.ctx.check()?;
        let (where_sql, where_values) = query.where_clause();

        let mut page_values = where_values.clone();
        page_values.push(Value::Integer(query.page.limit()));
        page_values.push(Value::Integer(query.page.offset()));

        let mut stmt = self.conn.prepare(&format!(
            "{CATALOG_SELECT_SQL}
             {CATALOG_FROM_SQL}
             {where_sql}
             GROUP BY b.book_id, a.author_id
             ORDER BY b.book_id ASC
             LIMIT ? OFFSET ?;"
        ))?;
        let mut rows = stmt.query(params_from_iter(page_values))?;
        let mut heads = Vec::new();
        while let Some(row) = rows.next()? {
            heads.push((parse_book_row(row)?, parse_joined_author(row)?));
        }
        drop(rows);

        let mut items = Vec::with_capacity(heads.len());
        for (book, author) in heads {
            self.ctx.check()?;
            let categories = load_active_categories_for_book(self.conn, &book.book_id)?;
            items.push(CatalogEntry {
                book,
                author,
                categories,
            });
        }

        self.ctx.check()?;
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(DISTINCT b.book_id) {CATALOG_FROM_SQL} {where_sql};"),
            params_from_iter(where_values),
            |row| row.get(0),
        )?;
        let count = u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative catalog count {total}")))?;

        Ok(ListPage { items, count })
    }
}

fn parse_joined_author(row: &Row<'_>) -> RepoResult<Author> {
    Ok(Author {
        author_id: row.get("author_id")?,
        name: row.get("author_name")?,
        created_at: row.get("author_created_at")?,
        updated_at: row.get("author_updated_at")?,
    })
}

fn load_active_categories_for_book(conn: &Connection, book_id: &str) -> RepoResult<Vec<Category>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{CATEGORY_SELECT_SQL}
         INNER JOIN book_categories bc ON bc.category_id = cat.category_id
         WHERE bc.book_id = ?1
           AND cat.deleted_at IS NULL
         ORDER BY cat.category_id ASC;"
    ))?;
    let mut rows = stmt.query([book_id])?;
    let mut categories = Vec::new();
    while let Some(row) = rows.next()? {
        categories.push(parse_category_row(row)?);
    }
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::{CatalogFilter, CatalogQuery, AUTHORS_FILTER_KEY, CATEGORIES_FILTER_KEY};
    use crate::repo::error::RepoError;
    use crate::repo::pagination::PageRequest;
    use std::collections::{BTreeSet, HashMap};

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_splits_trims_and_dedups() {
        let filter = CatalogFilter::parse(AUTHORS_FILTER_KEY, " A2 ,A1,,A2 ").unwrap();
        assert_eq!(filter, CatalogFilter::ByAuthors(ids(&["A1", "A2"])));
    }

    #[test]
    fn empty_value_parses_to_empty_set() {
        let filter = CatalogFilter::parse(CATEGORIES_FILTER_KEY, "").unwrap();
        assert_eq!(filter, CatalogFilter::ByCategories(BTreeSet::new()));
    }

    #[test]
    fn malformed_identifier_and_unknown_key_are_rejected() {
        assert!(matches!(
            CatalogFilter::parse(AUTHORS_FILTER_KEY, "A1,'; DROP TABLE books;--"),
            Err(RepoError::InvalidArgument(_))
        ));
        assert!(matches!(
            CatalogFilter::parse("publishers", "P1"),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parse_map_orders_filters_by_key() {
        let mut raw = HashMap::new();
        raw.insert(CATEGORIES_FILTER_KEY.to_string(), "C1".to_string());
        raw.insert(AUTHORS_FILTER_KEY.to_string(), "A1".to_string());

        let filters = CatalogFilter::parse_map(&raw).unwrap();
        assert_eq!(
            filters,
            vec![
                CatalogFilter::ByAuthors(ids(&["A1"])),
                CatalogFilter::ByCategories(ids(&["C1"])),
            ]
        );
    }

    #[test]
    fn where_clause_binds_ids_and_blocks_empty_sets() {
        let query = CatalogQuery::new(PageRequest::first(10).unwrap())
            .with_filter(CatalogFilter::ByAuthors(ids(&["A1", "A2"])))
            .with_filter(CatalogFilter::ByCategories(BTreeSet::new()));

        let (sql, values) = query.where_clause();
        assert_eq!(
            sql,
            "WHERE b.deleted_at IS NULL AND a.deleted_at IS NULL AND c.deleted_at IS NULL \
             AND a.author_id IN (?, ?) AND 1 = 0"
        );
        assert_eq!(values.len(), 2);
    }
}
