use contacts_core::db::open_db_in_memory;
use contacts_core::{
    ContactFilter, ContactPayload, ContactRepository, NameSearch, RepoError, RepositoryConfig,
    SqliteContactCollection, StoreErrorKind,
};

fn repository_with(config: RepositoryConfig) -> ContactRepository<SqliteContactCollection> {
    let conn = open_db_in_memory().unwrap();
    let collection = SqliteContactCollection::new(conn, config.collection.clone());
    ContactRepository::with_config(collection, config)
}

async fn seed(repo: &ContactRepository<SqliteContactCollection>, names: &[(&str, bool)]) {
    for (name, favorite) in names {
        repo.create(&ContactPayload::new().name(*name).favorite(*favorite))
            .await
            .unwrap();
    }
}

fn names(contacts: &[contacts_core::Contact]) -> Vec<&str> {
    contacts
        .iter()
        .filter_map(|contact| contact.name.as_deref())
        .collect()
}

#[tokio::test]
async fn find_by_name_is_case_insensitive_substring_match() {
    let repo = repository_with(RepositoryConfig::default());
    seed(
        &repo,
        &[("Ann", false), ("Joanne", false), ("ann", true), ("Bob", false)],
    )
    .await;

    let found = repo.find_by_name("ann").await.unwrap();
    assert_eq!(names(&found), vec!["Ann", "Joanne", "ann"]);
}

#[tokio::test]
async fn find_by_name_interprets_pattern_by_default() {
    let repo = repository_with(RepositoryConfig::default());
    seed(&repo, &[("Ann", false), ("Anna", false), ("Bob", false)]).await;

    let found = repo.find_by_name("^an+$").await.unwrap();
    assert_eq!(names(&found), vec!["Ann"]);
}

#[tokio::test]
async fn find_by_name_literal_mode_escapes_specials() {
    let repo =
        repository_with(RepositoryConfig::default().with_name_search(NameSearch::Literal));
    seed(&repo, &[("A.B Corp", false), ("AxB Corp", false)]).await;

    let found = repo.find_by_name("a.b").await.unwrap();
    assert_eq!(names(&found), vec!["A.B Corp"]);
}

#[tokio::test]
async fn find_by_name_skips_contacts_without_name() {
    let repo = repository_with(RepositoryConfig::default());
    repo.create(&ContactPayload::new().email("anon@example.com"))
        .await
        .unwrap();
    seed(&repo, &[("Ann", false)]).await;

    let found = repo.find_by_name("").await.unwrap();
    assert_eq!(names(&found), vec!["Ann"]);
}

#[tokio::test]
async fn find_by_name_with_invalid_pattern_surfaces_store_error() {
    let repo = repository_with(RepositoryConfig::default());
    seed(&repo, &[("Ann", false)]).await;

    match repo.find_by_name("(ann").await {
        Err(RepoError::Store(err)) => assert_eq!(err.kind(), StoreErrorKind::InvalidPattern),
        other => panic!("expected store error, got {other:?}"),
    }
}

#[tokio::test]
async fn find_favorite_returns_only_strict_true() {
    let repo = repository_with(RepositoryConfig::default());
    seed(&repo, &[("Ann", true), ("Bob", false), ("Cid", true)]).await;
    repo.create(&ContactPayload::new().name("Dee").favorite("true"))
        .await
        .unwrap();

    let favorites = repo.find_favorite().await.unwrap();
    assert_eq!(names(&favorites), vec!["Ann", "Cid"]);
    assert!(favorites.iter().all(|contact| contact.favorite));
}

#[tokio::test]
async fn find_with_all_filter_returns_every_contact_in_insertion_order() {
    let repo = repository_with(RepositoryConfig::default().with_collection("people"));
    seed(&repo, &[("Ann", false), ("Bob", true)]).await;

    assert_eq!(repo.collection().name(), "people");
    let all = repo.find(&ContactFilter::All).await.unwrap();
    assert_eq!(names(&all), vec!["Ann", "Bob"]);
    assert!(repo.find(&ContactFilter::NoMatch).await.unwrap().is_empty());
}

#[tokio::test]
async fn find_reflects_updates_and_deletes() {
    let repo = repository_with(RepositoryConfig::default());
    seed(&repo, &[("Ann", false), ("Bob", false)]).await;
    let bob = repo.find_by_name("bob").await.unwrap().remove(0);

    repo.update(&bob.id.to_hex(), &ContactPayload::new().favorite(true))
        .await
        .unwrap();
    assert_eq!(names(&repo.find_favorite().await.unwrap()), vec!["Bob"]);

    repo.delete(&bob.id.to_hex()).await.unwrap();
    assert!(repo.find_favorite().await.unwrap().is_empty());
}
