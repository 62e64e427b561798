//! Integration tests for the HTTP transport.
//!
//! Each test starts a small fake of the key-value map API on a local port.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use kvsync::{
    Entry, Error, HttpMapClient, MapProvision, MapRef, MapStore, ReconcileOptions, Reconciler,
    Snapshot,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::trace::TraceLayer;

const TOKEN: &str = "test-token";
const SLOW_MAP: &str = "slow";

#[derive(Default)]
struct FakeApi {
    maps: Mutex<HashMap<String, BTreeMap<String, String>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeApi {
    fn seed(&self, map: &str, entries: &[(&str, &str)]) {
        let contents = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.maps.lock().unwrap().insert(map.to_string(), contents);
    }

    fn contents(&self, map: &str) -> Option<BTreeMap<String, String>> {
        self.maps.lock().unwrap().get(map).cloned()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| !r.starts_with("GET "))
            .collect()
    }

    /// Record the request and check its bearer credential.
    fn admit(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Option<Response> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, uri));

        let expected = format!("Bearer {}", TOKEN);
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => None,
            _ => Some((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
        }
    }
}

type Shared = Arc<FakeApi>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page_size: Option<usize>,
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct WriteBody {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct CreateMapBody {
    name: String,
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"code": 404, "message": format!("{} not found", what)}})),
    )
        .into_response()
}

async fn list_entries(
    State(api): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((_org, _env, map)): Path<(String, String, String)>,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Some(denied) = api.admit(&method, &uri, &headers) {
        return denied;
    }
    if map == SLOW_MAP {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let Some(contents) = api.contents(&map) else {
        return not_found(&format!("map {}", map));
    };

    let lower = match query.page_token.filter(|t| !t.is_empty()) {
        Some(token) => Bound::Excluded(token),
        None => Bound::Unbounded,
    };
    let mut remaining = contents.range((lower, Bound::Unbounded));
    let page: Vec<_> = remaining
        .by_ref()
        .take(query.page_size.unwrap_or(100))
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();

    let next_token = match (remaining.next(), page.last()) {
        (Some(_), Some(last)) => last["name"].clone(),
        _ => json!(null),
    };
    Json(json!({"keyValueEntries": page, "nextPageToken": next_token})).into_response()
}

async fn create_entry(
    State(api): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((_org, _env, map)): Path<(String, String, String)>,
    Json(body): Json<WriteBody>,
) -> Response {
    if let Some(denied) = api.admit(&method, &uri, &headers) {
        return denied;
    }
    let mut maps = api.maps.lock().unwrap();
    let Some(contents) = maps.get_mut(&map) else {
        return not_found(&format!("map {}", map));
    };
    if contents.contains_key(&body.name) {
        return (StatusCode::CONFLICT, "entry exists").into_response();
    }
    contents.insert(body.name.clone(), body.value.clone());
    (
        StatusCode::CREATED,
        Json(json!({"name": body.name, "value": body.value})),
    )
        .into_response()
}

async fn update_entry(
    State(api): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((_org, _env, map, name)): Path<(String, String, String, String)>,
    Json(body): Json<WriteBody>,
) -> Response {
    if let Some(denied) = api.admit(&method, &uri, &headers) {
        return denied;
    }
    let mut maps = api.maps.lock().unwrap();
    let Some(contents) = maps.get_mut(&map) else {
        return not_found(&format!("map {}", map));
    };
    match contents.get_mut(&name) {
        Some(value) => {
            *value = body.value.clone();
            Json(json!({"name": name, "value": body.value})).into_response()
        }
        None => not_found(&format!("entry {}", name)),
    }
}

async fn delete_entry(
    State(api): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((_org, _env, map, name)): Path<(String, String, String, String)>,
) -> Response {
    if let Some(denied) = api.admit(&method, &uri, &headers) {
        return denied;
    }
    let mut maps = api.maps.lock().unwrap();
    let Some(contents) = maps.get_mut(&map) else {
        return not_found(&format!("map {}", map));
    };
    match contents.remove(&name) {
        Some(value) => Json(json!({"name": name, "value": value})).into_response(),
        None => not_found(&format!("entry {}", name)),
    }
}

async fn create_map(
    State(api): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<CreateMapBody>,
) -> Response {
    if let Some(denied) = api.admit(&method, &uri, &headers) {
        return denied;
    }
    let mut maps = api.maps.lock().unwrap();
    if maps.contains_key(&body.name) {
        return (
            StatusCode::CONFLICT,
            format!("map {} already exists", body.name),
        )
            .into_response();
    }
    maps.insert(body.name.clone(), BTreeMap::new());
    (StatusCode::CREATED, Json(json!({"name": body.name}))).into_response()
}

/// Start the fake API and return its base URL.
async fn spawn_api(api: Shared) -> String {
    let app = Router::new()
        .route(
            "/v1/organizations/{org}/environments/{env}/keyvaluemaps",
            post(create_map),
        )
        .route(
            "/v1/organizations/{org}/environments/{env}/keyvaluemaps/{map}/entries",
            post(create_entry).get(list_entries),
        )
        .route(
            "/v1/organizations/{org}/environments/{env}/keyvaluemaps/{map}/entries/{name}",
            put(update_entry).delete(delete_entry),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/v1", addr)
}

fn client(base: &str) -> HttpMapClient {
    HttpMapClient::new(base, TOKEN, Duration::from_secs(5)).unwrap()
}

fn map(name: &str) -> MapRef {
    MapRef::new("acme", "test", name)
}

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn follows_page_tokens() {
        let api = Shared::default();
        api.seed(
            "settings",
            &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")],
        );
        let base = spawn_api(api.clone()).await;
        let client = client(&base).with_page_size(2);

        let first = client.list_entries(&map("settings"), "").await.unwrap();
        assert_eq!(first.entries, vec![Entry::new("a", "1"), Entry::new("b", "2")]);
        assert_eq!(first.next_cursor, "b");

        let result = kvsync::materialize(&client, &map("settings"), 100)
            .await
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.pages, 3);
        assert_eq!(result.snapshot.len(), 5);

        let requests = api.requests();
        assert!(requests[0].ends_with("/keyvaluemaps/settings/entries?pageSize=2"));
        assert!(requests
            .iter()
            .any(|r| r.ends_with("/entries?pageSize=2&pageToken=d")));
    }

    #[tokio::test]
    async fn surfaces_status_and_body() {
        let api = Shared::default();
        let base = spawn_api(api).await;

        let err = client(&base)
            .list_entries(&map("missing"), "")
            .await
            .unwrap_err();

        match err {
            Error::Remote { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("map missing not found"), "body: {}", body);
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let api = Shared::default();
        api.seed("settings", &[]);
        let base = spawn_api(api).await;
        let client = HttpMapClient::new(&base, "stale", Duration::from_secs(5)).unwrap();

        let err = client.list_entries(&map("settings"), "").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("unauthorized"));
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let api = Shared::default();
        api.seed(SLOW_MAP, &[]);
        let base = spawn_api(api).await;
        let client = HttpMapClient::new(&base, TOKEN, Duration::from_millis(200)).unwrap();

        let err = client.list_entries(&map(SLOW_MAP), "").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}/v1", addr));
        let err = client.list_entries(&map("settings"), "").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {:?}", err);
    }
}

mod write_tests {
    use super::*;

    #[tokio::test]
    async fn put_falls_back_to_create() {
        let api = Shared::default();
        api.seed("settings", &[("a", "1")]);
        let base = spawn_api(api.clone()).await;
        let client = client(&base);

        client
            .put_entry(&map("settings"), &Entry::new("a", 2))
            .await
            .unwrap();
        client
            .put_entry(&map("settings"), &Entry::new("b", true))
            .await
            .unwrap();

        let contents = api.contents("settings").unwrap();
        assert_eq!(contents["a"], "2");
        assert_eq!(contents["b"], "true");

        let writes = api.writes();
        assert_eq!(writes.len(), 3);
        assert!(writes[0].starts_with("PUT ") && writes[0].ends_with("/entries/a"));
        assert!(writes[1].starts_with("PUT ") && writes[1].ends_with("/entries/b"));
        assert!(writes[2].starts_with("POST ") && writes[2].ends_with("/entries"));
    }

    #[tokio::test]
    async fn names_with_reserved_characters_round_trip() {
        let api = Shared::default();
        api.seed("settings", &[]);
        let base = spawn_api(api.clone()).await;
        let client = client(&base);

        let name = "path/to key?x";
        client
            .put_entry(&map("settings"), &Entry::new(name, "v"))
            .await
            .unwrap();
        client
            .put_entry(&map("settings"), &Entry::new(name, "w"))
            .await
            .unwrap();
        assert_eq!(api.contents("settings").unwrap()[name], "w");

        client.delete_entry(&map("settings"), name).await.unwrap();
        assert!(api.contents("settings").unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_entry_is_404() {
        let api = Shared::default();
        api.seed("settings", &[]);
        let base = spawn_api(api).await;

        let err = client(&base)
            .delete_entry(&map("settings"), "ghost")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn ensure_map_tolerates_existing_map() {
        let api = Shared::default();
        let base = spawn_api(api.clone()).await;
        let client = client(&base);
        let reconciler = Reconciler::new(&client, ReconcileOptions::default());

        let first = reconciler.ensure_map(&map("fresh"), true).await.unwrap();
        let second = reconciler.ensure_map(&map("fresh"), true).await.unwrap();

        assert_eq!(first, MapProvision::Created);
        assert_eq!(second, MapProvision::AlreadyExists);
        assert!(api.contents("fresh").is_some());

        let err = client.create_map(&map("fresh"), false).await.unwrap_err();
        assert!(err.is_already_exists());
    }
}

mod reconcile_tests {
    use super::*;

    #[tokio::test]
    async fn reconciles_over_http() {
        let api = Shared::default();
        api.seed("settings", &[("a", "1"), ("b", "2")]);
        let base = spawn_api(api.clone()).await;
        let client = client(&base).with_page_size(1);
        let reconciler = Reconciler::new(&client, ReconcileOptions::default());

        let desired =
            Snapshot::from_desired(vec![Entry::new("b", 3), Entry::new("c", 4)]).unwrap();
        let first = reconciler
            .reconcile(&map("settings"), &desired)
            .await
            .unwrap()
            .result;

        assert_eq!((first.created, first.updated, first.deleted), (1, 1, 1));
        assert!(first.errors.is_empty());

        let contents = api.contents("settings").unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents["b"], "3");
        assert_eq!(contents["c"], "4");

        let second = reconciler
            .reconcile(&map("settings"), &desired)
            .await
            .unwrap()
            .result;
        assert_eq!(second.total_changes(), 0);
        assert!(second.is_converged());
    }

    #[tokio::test]
    async fn dry_run_sends_no_writes() {
        let api = Shared::default();
        api.seed("settings", &[("a", "1")]);
        let base = spawn_api(api.clone()).await;
        let client = client(&base);
        let reconciler = Reconciler::new(&client, ReconcileOptions::default().dry_run(true));

        let desired = Snapshot::from_desired(vec![Entry::new("z", 1)]).unwrap();
        let outcome = reconciler
            .reconcile(&map("settings"), &desired)
            .await
            .unwrap();

        assert_eq!(outcome.result.created, 1);
        assert_eq!(outcome.result.deleted, 1);
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn missing_map_fails_before_any_write() {
        let api = Shared::default();
        api.seed("settings", &[("a", "1")]);
        let base = spawn_api(api.clone()).await;
        let client = client(&base);
        let reconciler = Reconciler::new(&client, ReconcileOptions::default());

        let desired = Snapshot::from_desired(vec![Entry::new("a", 1)]).unwrap();
        let err = reconciler
            .reconcile(&map("other"), &desired)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(api.writes().is_empty());
    }
}
