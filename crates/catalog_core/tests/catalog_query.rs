use catalog_core::db::open_db_in_memory;
use catalog_core::{
    AuthorInput, AuthorRepository, BookInput, BookRepository, CatalogFilter, CatalogQuery,
    CatalogRepository, CategoryInput, CategoryRepository, PageRequest, RepoError,
    SqliteAuthorRepository, SqliteBookRepository, SqliteCatalogRepository,
    SqliteCategoryRepository,
};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};

/// Authors a1..a3, categories c1 (root) and c2 (child of c1), and
/// b1(a1,c1) b2(a2,c2) b3(a3,c1) b4(a1,c2).
fn seed(conn: &Connection) {
    let authors = SqliteAuthorRepository::try_new(conn).unwrap();
    for (id, name) in [("a1", "Le Guin"), ("a2", "Herbert"), ("a3", "Lem")] {
        authors.create_author(&AuthorInput::new(id, name)).unwrap();
    }

    let categories = SqliteCategoryRepository::try_new(conn).unwrap();
    categories
        .create_category(&CategoryInput::root("c1", "Fiction"))
        .unwrap();
    categories
        .create_category(&CategoryInput::child("c2", "Science Fiction", "c1"))
        .unwrap();

    let books = SqliteBookRepository::try_new(conn).unwrap();
    for (id, author, category) in [
        ("b1", "a1", "c1"),
        ("b2", "a2", "c2"),
        ("b3", "a3", "c1"),
        ("b4", "a1", "c2"),
    ] {
        books
            .create_book(&BookInput::new(id, format!("Book {id}"), author, 10.0, category))
            .unwrap();
    }
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn book_ids(query: &CatalogQuery, conn: &Connection) -> (Vec<String>, u64) {
    let page = SqliteCatalogRepository::try_new(conn)
        .unwrap()
        .list_catalog(query)
        .unwrap();
    let ids = page
        .items
        .into_iter()
        .map(|entry| entry.book.book_id)
        .collect();
    (ids, page.count)
}

fn first_page() -> PageRequest {
    PageRequest::first(50).unwrap()
}

#[test]
fn no_filters_lists_every_active_book() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let (ids, count) = book_ids(&CatalogQuery::new(first_page()), &conn);
    assert_eq!(ids, vec!["b1", "b2", "b3", "b4"]);
    assert_eq!(count, 4);
}

#[test]
fn author_filter_matches_any_listed_author() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let query = CatalogQuery::new(first_page())
        .with_filter(CatalogFilter::ByAuthors(ids(&["a1", "a2"])));
    let (ids, count) = book_ids(&query, &conn);
    assert_eq!(ids, vec!["b1", "b2", "b4"]);
    assert_eq!(count, 3);
}

#[test]
fn category_filter_matches_any_listed_category() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let query =
        CatalogQuery::new(first_page()).with_filter(CatalogFilter::ByCategories(ids(&["c1"])));
    let (ids, count) = book_ids(&query, &conn);
    assert_eq!(ids, vec!["b1", "b3"]);
    assert_eq!(count, 2);
}

#[test]
fn combined_filters_intersect() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let query = CatalogQuery::new(first_page())
        .with_filter(CatalogFilter::ByAuthors(ids(&["a1"])))
        .with_filter(CatalogFilter::ByCategories(ids(&["c2"])));
    let (ids, count) = book_ids(&query, &conn);
    assert_eq!(ids, vec!["b4"]);
    assert_eq!(count, 1);
}

#[test]
fn present_but_empty_filter_matches_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let mut raw = HashMap::new();
    raw.insert("authors".to_string(), " , ".to_string());
    let query = CatalogQuery::from_raw(1, 50, &raw).unwrap();
    let (ids, count) = book_ids(&query, &conn);
    assert!(ids.is_empty());
    assert_eq!(count, 0);
}

#[test]
fn raw_filters_are_parsed_from_comma_lists() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let mut raw = HashMap::new();
    raw.insert("authors".to_string(), "a2, a3".to_string());
    raw.insert("categories".to_string(), "c1".to_string());
    let query = CatalogQuery::from_raw(1, 50, &raw).unwrap();
    let (ids, count) = book_ids(&query, &conn);
    assert_eq!(ids, vec!["b3"]);
    assert_eq!(count, 1);
}

#[test]
fn unknown_filter_key_and_bad_pagination_are_invalid_arguments() {
    let mut raw = HashMap::new();
    raw.insert("publishers".to_string(), "p1".to_string());
    assert!(matches!(
        CatalogQuery::from_raw(1, 10, &raw),
        Err(RepoError::InvalidArgument(_))
    ));

    assert!(matches!(
        CatalogQuery::from_raw(0, 10, &HashMap::new()),
        Err(RepoError::InvalidArgument(_))
    ));
}

#[test]
fn deleted_books_and_books_of_deleted_authors_are_excluded() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    SqliteBookRepository::new(&conn).delete_book("b2").unwrap();
    SqliteAuthorRepository::new(&conn).delete_author("a3").unwrap();

    let (ids, count) = book_ids(&CatalogQuery::new(first_page()), &conn);
    assert_eq!(ids, vec!["b1", "b4"]);
    assert_eq!(count, 2);
}

#[test]
fn filter_on_deleted_category_matches_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn.execute(
        "UPDATE categories SET deleted_at = 1 WHERE category_id = 'c2';",
        [],
    )
    .unwrap();

    let query = CatalogQuery::new(first_page())
        .with_filter(CatalogFilter::ByCategories(ids(&["c2"])));
    let (matched, count) = book_ids(&query, &conn);
    assert!(matched.is_empty());
    assert_eq!(count, 0);

    let either = CatalogQuery::new(first_page())
        .with_filter(CatalogFilter::ByCategories(ids(&["c1", "c2"])));
    let (matched, count) = book_ids(&either, &conn);
    assert_eq!(matched, vec!["b1", "b3"]);
    assert_eq!(count, 2);
}

#[test]
fn deleted_category_never_becomes_primary_category() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    SqliteCategoryRepository::new(&conn)
        .create_category(&CategoryInput::root("c0", "Gone"))
        .unwrap();
    conn.execute(
        "INSERT INTO book_categories (book_id, category_id) VALUES ('b1', 'c0');",
        [],
    )
    .unwrap();
    conn.execute(
        "UPDATE categories SET deleted_at = 1 WHERE category_id = 'c0';",
        [],
    )
    .unwrap();

    let page = SqliteCatalogRepository::try_new(&conn)
        .unwrap()
        .list_catalog(&CatalogQuery::new(first_page()))
        .unwrap();
    assert_eq!(page.count, 4);

    let entry = &page.items[0];
    assert_eq!(entry.book.book_id, "b1");
    assert_eq!(entry.book.category_id, "c1");
    assert_eq!(entry.book.category_name, "Fiction");
    let categories: Vec<&str> = entry
        .categories
        .iter()
        .map(|category| category.category_id.as_str())
        .collect();
    assert_eq!(categories, vec!["c1"]);
}

#[test]
fn pagination_windows_results_but_count_covers_all_matches() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let query = CatalogQuery::new(PageRequest::new(2, 3).unwrap());
    let (ids, count) = book_ids(&query, &conn);
    assert_eq!(ids, vec!["b4"]);
    assert_eq!(count, 4);
}

#[test]
fn entries_carry_author_and_all_active_categories() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    SqliteCategoryRepository::new(&conn)
        .create_category(&CategoryInput::root("c3", "Classics"))
        .unwrap();
    conn.execute(
        "INSERT INTO book_categories (book_id, category_id) VALUES ('b1', 'c2'), ('b1', 'c3');",
        [],
    )
    .unwrap();
    conn.execute(
        "UPDATE categories SET deleted_at = 1 WHERE category_id = 'c3';",
        [],
    )
    .unwrap();

    let page = SqliteCatalogRepository::try_new(&conn)
        .unwrap()
        .list_catalog(&CatalogQuery::new(first_page()))
        .unwrap();
    assert_eq!(page.items.len(), 4);
    assert_eq!(page.count, 4);

    let entry = &page.items[0];
    assert_eq!(entry.book.book_id, "b1");
    assert_eq!(entry.book.category_id, "c1");
    assert_eq!(entry.book.category_name, "Fiction");
    assert_eq!(entry.author.author_id, "a1");
    assert_eq!(entry.author.name, "Le Guin");

    let categories: Vec<(&str, Option<&str>)> = entry
        .categories
        .iter()
        .map(|category| {
            (
                category.category_id.as_str(),
                category.parent_name.as_deref(),
            )
        })
        .collect();
    assert_eq!(categories, vec![("c1", None), ("c2", Some("Fiction"))]);
}

#[test]
fn cancelled_context_short_circuits_listing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let ctx = catalog_core::RequestContext::background();
    ctx.cancel();

    let err = SqliteCatalogRepository::try_new(&conn)
        .unwrap()
        .with_context(&ctx)
        .list_catalog(&CatalogQuery::new(first_page()))
        .unwrap_err();
    assert!(matches!(err, RepoError::Cancelled));
}
