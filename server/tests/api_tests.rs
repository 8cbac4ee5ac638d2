use async_trait::async_trait;
use booksync_server::{AppState, IsbnResponse, build_router};
use booksync_sync::{
    BookLookup, BookSync, CorrelationKey, DestinationError, DestinationResult, EngineConfig,
    FieldWrite, LookupError, LookupResult, MappingStore, RowWriter, SchemaSource,
    UpsertResponse,
};
use booksync_types::{
    BookRecord, DestinationField, FieldId, FieldMapping, FieldType, Isbn, RowId, Scope,
    SyncStatus, UpsertOperation,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

// ── Fakes ───────────────────────────────────────────────────────

struct Table {
    fields: DestinationResult<Vec<DestinationField>>,
}

#[async_trait]
impl SchemaSource for Table {
    async fn list_fields(&self) -> DestinationResult<Vec<DestinationField>> {
        self.fields.clone()
    }
}

#[async_trait]
impl RowWriter for Table {
    async fn upsert(
        &self,
        correlation: Option<&CorrelationKey>,
        _fields: &BTreeMap<FieldId, FieldWrite>,
    ) -> DestinationResult<UpsertResponse> {
        Ok(UpsertResponse {
            row_id: RowId::new("rec1"),
            operation: if correlation.is_some() {
                UpsertOperation::Updated
            } else {
                UpsertOperation::Created
            },
            rejected: BTreeMap::new(),
        })
    }
}

struct Books {
    result: LookupResult<BookRecord>,
}

#[async_trait]
impl BookLookup for Books {
    async fn fetch_by_isbn(&self, _isbn: &Isbn) -> LookupResult<BookRecord> {
        self.result.clone()
    }
}

fn dune() -> BookRecord {
    BookRecord::new("Dune")
        .unwrap()
        .with("author", "Herbert")
        .with("isbn", "9780441013593")
}

fn schema() -> Vec<DestinationField> {
    vec![
        DestinationField::new("fldA", "Title", FieldType::Text),
        DestinationField::new("fldB", "Cover", FieldType::Attachment),
    ]
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_with(
    fields: DestinationResult<Vec<DestinationField>>,
    lookup: LookupResult<BookRecord>,
) -> String {
    let table = Arc::new(Table { fields });
    let service = BookSync::new(
        table.clone(),
        table,
        Arc::new(Books { result: lookup }),
        MappingStore::open_in_memory().unwrap(),
        EngineConfig::default(),
    );
    let app = build_router(Arc::new(AppState {
        service,
        scope: Scope::new("tbl1"),
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

async fn spawn_test_server() -> String {
    spawn_with(Ok(schema()), Ok(dune())).await
}

async fn put_mapping(base: &str, mapping: &FieldMapping) {
    let resp = reqwest::Client::new()
        .put(format!("{}/api/v1/mapping", base))
        .json(mapping)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ── Banner ──────────────────────────────────────────────────────

#[tokio::test]
async fn index_returns_banner() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/", base)).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("/isbn?isbn="));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// ── /isbn ───────────────────────────────────────────────────────

#[tokio::test]
async fn isbn_missing_parameter_is_400() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/isbn", base)).await.unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], "missing isbn parameter");
}

#[tokio::test]
async fn isbn_invalid_is_400() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/isbn?isbn=12345", base)).await.unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["category"], "invalid_input");
}

#[tokio::test]
async fn isbn_not_found_is_404() {
    let base = spawn_with(
        Ok(schema()),
        Err(LookupError::NotFound("9780441013593".into())),
    )
    .await;
    let resp = reqwest::get(format!("{}/isbn?isbn=9780441013593", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn isbn_lookup_transport_error_is_502() {
    let base = spawn_with(Ok(schema()), Err(LookupError::Transport("reset".into()))).await;
    let resp = reqwest::get(format!("{}/isbn?isbn=9780441013593", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["category"], "network");
}

#[tokio::test]
async fn isbn_destination_auth_error_is_401() {
    let base = spawn_with(
        Err(DestinationError::Auth("bad secret".into())),
        Ok(dune()),
    )
    .await;
    let resp = reqwest::get(format!("{}/isbn?isbn=9780441013593", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn isbn_syncs_with_stored_mapping() {
    let base = spawn_test_server().await;
    put_mapping(&base, &FieldMapping::new().with("title", "fldA")).await;

    let resp = reqwest::get(format!("{}/isbn?isbn=9780441013593", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: IsbnResponse = resp.json().await.unwrap();
    assert_eq!(body.code, 200);
    assert_eq!(body.message, "book added");
    assert_eq!(body.book, dune());
    assert_eq!(body.result.status, SyncStatus::Succeeded);
    assert_eq!(body.result.destination_row_id, Some(RowId::new("rec1")));
}

#[tokio::test]
async fn isbn_without_mapping_explains_nothing_to_sync() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/isbn?isbn=9780441013593", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: IsbnResponse = resp.json().await.unwrap();
    assert_eq!(body.result.status, SyncStatus::Failed);
    assert!(body.message.contains("nothing to sync"), "{}", body.message);
}

// ── Schema and mapping ──────────────────────────────────────────

#[tokio::test]
async fn schema_endpoint_lists_fields() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/api/v1/schema?refresh=true", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Vec<DestinationField> = resp.json().await.unwrap();
    assert_eq!(body, schema());
}

#[tokio::test]
async fn mapping_put_then_get() {
    let base = spawn_test_server().await;
    let mapping = FieldMapping::new().with("title", "fldA").with("isbn", "fldI");
    put_mapping(&base, &mapping).await;

    let resp = reqwest::get(format!("{}/api/v1/mapping", base)).await.unwrap();
    let body: FieldMapping = resp.json().await.unwrap();
    assert_eq!(body, mapping);
}

#[tokio::test]
async fn mapping_patch_applies_edits() {
    let base = spawn_test_server().await;
    put_mapping(&base, &FieldMapping::new().with("title", "fldA").with("author", "fldB")).await;

    let resp = reqwest::Client::new()
        .patch(format!("{}/api/v1/mapping", base))
        .json(&json!([
            {"op": "clear", "key": "author"},
            {"op": "assign", "key": "isbn", "field_id": "fldI"}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"isbn": "fldI", "title": "fldA"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mapping_patches_are_all_kept() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..64)
        .map(|i| {
            let client = client.clone();
            let url = format!("{}/api/v1/mapping", base);
            tokio::spawn(async move {
                client
                    .patch(url)
                    .json(&json!([{"op": "assign", "key": format!("k{i}"), "field_id": "fldA"}]))
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), 200);
    }

    let resp = reqwest::get(format!("{}/api/v1/mapping", base)).await.unwrap();
    let body: FieldMapping = resp.json().await.unwrap();
    assert_eq!(body.len(), 64);
}

#[tokio::test]
async fn validate_reports_per_key_status() {
    let base = spawn_test_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/validate", base))
        .json(&json!({
            "record": dune(),
            "mapping": {"title": "fldA", "author": "fldB"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["mapped_count"], 1);
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["keys"]["title"]["status"]["status"], "mapped");
    assert_eq!(body["keys"]["author"]["status"]["status"], "broken_reference");
    assert_eq!(body["keys"]["author"]["status"]["reason"], "unselectable");
    assert_eq!(body["failures"], json!([]));
}

#[tokio::test]
async fn sync_endpoint_uses_stored_mapping_by_default() {
    let base = spawn_test_server().await;
    put_mapping(&base, &FieldMapping::new().with("title", "fldA")).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/sync", base))
        .json(&json!({ "record": dune() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["per_field_outcomes"]["title"]["outcome"], "written");
    assert_eq!(body["per_field_outcomes"]["author"]["outcome"], "skipped");
}
