use catalog_core::db::open_db_in_memory;
use catalog_core::{
    AuthorInput, AuthorRepository, EntityKind, ModelValidationError, PageRequest, RepoError,
    SqliteAuthorRepository,
};

#[test]
fn create_get_update_delete_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuthorRepository::try_new(&conn).unwrap();

    let created = repo
        .create_author(&AuthorInput::new("a1", "Octavia Butler"))
        .unwrap();
    assert_eq!(repo.get_author("a1").unwrap(), created);

    let updated = repo
        .update_author(&AuthorInput::new("a1", "Octavia E. Butler"))
        .unwrap();
    assert_eq!(updated.name, "Octavia E. Butler");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    repo.delete_author("a1").unwrap();
    let (updated_at, deleted_at): (i64, i64) = conn
        .query_row(
            "SELECT updated_at, deleted_at FROM authors WHERE author_id = 'a1';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(updated_at > updated.updated_at);
    assert!(updated_at >= deleted_at);

    match repo.get_author("a1").unwrap_err() {
        RepoError::NotFound { entity, id } => {
            assert_eq!(entity, EntityKind::Author);
            assert_eq!(id, "a1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        repo.delete_author("a1"),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn list_orders_by_id_and_skips_deleted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuthorRepository::try_new(&conn).unwrap();
    for id in ["a3", "a1", "a4", "a2"] {
        repo.create_author(&AuthorInput::new(id, format!("Author {id}")))
            .unwrap();
    }
    repo.delete_author("a4").unwrap();

    let first = repo.list_authors(&PageRequest::new(1, 2).unwrap()).unwrap();
    let ids: Vec<&str> = first
        .items
        .iter()
        .map(|author| author.author_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a1", "a2"]);
    assert_eq!(first.count, 3);

    let second = repo.list_authors(&PageRequest::new(2, 2).unwrap()).unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].author_id, "a3");
}

#[test]
fn blank_or_oversized_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuthorRepository::try_new(&conn).unwrap();

    assert!(matches!(
        repo.create_author(&AuthorInput::new("a1", " \t ")),
        Err(RepoError::Validation(ModelValidationError::BlankName { .. }))
    ));
    assert!(matches!(
        repo.create_author(&AuthorInput::new("a1", "x".repeat(300))),
        Err(RepoError::Validation(ModelValidationError::NameTooLong { .. }))
    ));
}

#[test]
fn update_unknown_author_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuthorRepository::try_new(&conn).unwrap();

    assert!(matches!(
        repo.update_author(&AuthorInput::new("ghost", "Nobody")),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn author_serializes_with_field_names() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuthorRepository::try_new(&conn).unwrap();
    let author = repo
        .create_author(&AuthorInput::new("a1", "Stanislaw Lem"))
        .unwrap();

    let json = serde_json::to_value(&author).unwrap();
    assert_eq!(json["author_id"], "a1");
    assert_eq!(json["name"], "Stanislaw Lem");
    assert_eq!(json["created_at"], author.created_at);
}
