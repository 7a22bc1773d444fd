use admin_api::{
    MemoryRepository, Repository,
    models::{ListQuery, OrderBy, PageWindow, Record, SoftDelete},
    repository::RepositoryError,
};
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn users() -> MemoryRepository {
    MemoryRepository::with_rows(
        "users",
        ["id", "name", "status", "verified"],
        vec![
            record(json!({ "id": 1, "name": "ana", "status": 1, "verified": true })),
            record(json!({ "id": 2, "name": "bo", "status": 0, "verified": false })),
            record(json!({ "id": 3, "name": "cy", "status": 1, "verified": true })),
        ],
    )
}

fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn test_fields_always_include_id() {
    let repo = MemoryRepository::new("tags", ["name"]);
    assert_eq!(repo.fields().await.unwrap(), vec!["id", "name"]);
    assert_eq!(repo.table(), "tags");
}

#[tokio::test]
async fn test_insert_assigns_ids_after_seeded_rows() {
    let repo = users();

    let id = repo.insert(record(json!({ "name": "di" }))).await.unwrap();
    assert_eq!(id, 4);

    let row = repo.find(4).await.unwrap().unwrap();
    assert_eq!(row["name"], "di");
    assert_eq!(row["status"], Value::Null);
}

#[tokio::test]
async fn test_insert_rejects_bad_payloads() {
    let repo = users();

    assert!(matches!(
        repo.insert(Record::new()).await,
        Err(RepositoryError::EmptyPayload)
    ));
    assert!(matches!(
        repo.insert(record(json!({ "nickname": "x" }))).await,
        Err(RepositoryError::UnknownField(field)) if field == "nickname"
    ));
    assert!(matches!(
        repo.insert(record(json!({ "id": 2, "name": "dup" }))).await,
        Err(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_insert_rejects_out_of_range_ids() {
    let repo = users();

    for id in [i64::MAX, 0, -4] {
        assert!(matches!(
            repo.insert(record(json!({ "id": id, "name": "edge" }))).await,
            Err(RepositoryError::InvalidIdentifier(_))
        ));
    }
    assert_eq!(repo.rows().await.len(), 3);

    // Generated ids are unaffected.
    assert_eq!(repo.insert(record(json!({ "name": "ed" }))).await.unwrap(), 4);
}

#[tokio::test]
async fn test_select_filters_on_text_form() {
    let repo = users();

    let query = ListQuery {
        filters: [("verified".to_string(), "true".to_string())].into(),
        order: vec![OrderBy::asc("id")],
        ..ListQuery::default()
    };
    assert_eq!(ids(&repo.select(&query).await.unwrap()), vec![1, 3]);

    let query = ListQuery {
        filters: [("status".to_string(), "0".to_string())].into(),
        ..ListQuery::default()
    };
    assert_eq!(ids(&repo.select(&query).await.unwrap()), vec![2]);
}

#[tokio::test]
async fn test_select_orders_by_multiple_keys() {
    let repo = users();

    let query = ListQuery {
        order: vec![OrderBy::desc("status"), OrderBy::asc("name")],
        ..ListQuery::default()
    };

    assert_eq!(ids(&repo.select(&query).await.unwrap()), vec![1, 3, 2]);
}

#[tokio::test]
async fn test_select_paginates_and_projects() {
    let repo = users();

    let query = ListQuery {
        order: vec![OrderBy::asc("id")],
        fields: Some(vec!["name".to_string()]),
        page: Some(PageWindow { offset: 1, limit: 1 }),
        ..ListQuery::default()
    };
    let rows = repo.select(&query).await.unwrap();

    assert_eq!(rows, vec![record(json!({ "name": "bo" }))]);
}

#[tokio::test]
async fn test_update_reports_matched_rows() {
    let repo = users();

    assert_eq!(
        repo.update(2, record(json!({ "name": "bob" }))).await.unwrap(),
        1
    );
    assert_eq!(repo.find(2).await.unwrap().unwrap()["name"], "bob");
    assert_eq!(
        repo.update(9, record(json!({ "name": "nobody" }))).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_soft_delete_outcomes() {
    let repo = users();

    assert_eq!(
        repo.soft_delete(1, "status", -1).await.unwrap(),
        SoftDelete::Deleted
    );
    assert_eq!(
        repo.soft_delete(1, "status", -1).await.unwrap(),
        SoftDelete::AlreadyDeleted
    );
    assert_eq!(
        repo.soft_delete(99, "status", -1).await.unwrap(),
        SoftDelete::NotFound
    );
    assert!(matches!(
        repo.soft_delete(1, "deleted", 1).await,
        Err(RepositoryError::UnknownField(_))
    ));

    // Rows are kept.
    let rows = repo.rows().await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["status"], json!(-1));
}
