//! End-to-end tests driving the composed router.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Router,
};
use json_mock_server::{
    build_router, AppState, Document, Middleware, Pipeline, ResourceOptions, RouteRewriter, ServerBuilder,
    ServerConfig, SharedRewriter, Source, Store,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

fn blog() -> Value {
    json!({
        "posts": [{"id": 1, "title": "hello", "views": 10}, {"id": 2, "title": "world", "views": 20}],
        "comments": [{"id": 1, "body": "nice", "post_id": 1}, {"id": 2, "body": "meh", "post_id": 2}],
        "profile": {"name": "typicode"}
    })
}

fn state_for(doc: Value, options: ResourceOptions) -> AppState {
    AppState {
        store: Arc::new(Store::in_memory(Document::from_value(doc).unwrap(), options)),
        rewriter: SharedRewriter::default(),
    }
}

fn app_with(doc: Value, config: ServerConfig) -> (Router, AppState) {
    let state = state_for(doc, config.resource.clone());
    (build_router(&config, state.clone(), &Pipeline::new()), state)
}

fn app() -> (Router, AppState) {
    app_with(blog(), ServerConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, value)
}

#[tokio::test]
async fn create_read_update_delete() {
    let (app, _) = app();

    let (status, headers, created) = send(&app, "POST", "/posts", Some(json!({"title": "new"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], 3);
    assert_eq!(headers["location"], "/posts/3");

    let (status, _, read) = send(&app, "GET", "/posts/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read, created);

    let (_, _, first) = send(&app, "PUT", "/posts/3", Some(json!({"title": "replaced"}))).await;
    let (_, _, second) = send(&app, "PUT", "/posts/3", Some(json!({"title": "replaced"}))).await;
    assert_eq!(first, second);
    assert_eq!(first, json!({"title": "replaced", "id": 3}));

    let (_, _, patched) = send(&app, "PATCH", "/posts/3", Some(json!({"views": 1}))).await;
    assert_eq!(patched["title"], "replaced");
    assert_eq!(patched["views"], 1);

    let (status, _, deleted) = send(&app, "DELETE", "/posts/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], 3);
    let (status, _, body) = send(&app, "GET", "/posts/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn rejects_bad_bodies_and_duplicate_ids() {
    let (app, state) = app();
    let req = axum::http::Request::post("/posts")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, "POST", "/posts", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&app, "POST", "/posts", Some(json!({"id": 1, "title": "dup"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(state.store.read("posts").len(), 2);
}

#[tokio::test]
async fn lists_with_filters_and_page_headers() {
    let (app, _) = app();

    let (_, _, found) = send(&app, "GET", "/posts?views_gte=15", None).await;
    assert_eq!(found, json!([{"id": 2, "title": "world", "views": 20}]));

    let (_, _, found) = send(&app, "GET", "/posts?title_like=%5Ehel", None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (_, _, sorted) = send(&app, "GET", "/posts?_sort=views&_order=desc", None).await;
    assert_eq!(sorted[0]["id"], 2);

    let (status, headers, page) = send(&app, "GET", "/posts?_page=1&_limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(headers["x-total-count"], "2");
    let link = headers["link"].to_str().unwrap();
    assert!(link.contains("rel=\"next\""));
    assert!(link.contains("_page=2>; rel=\"last\""));
}

#[tokio::test]
async fn unknown_collection_lists_empty_but_items_are_missing() {
    let (app, _) = app();
    let (status, headers, body) = send(&app, "GET", "/nothing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    assert_eq!(headers["x-total-count"], "0");
    let (status, _, _) = send(&app, "GET", "/nothing/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_routes_follow_naming_convention() {
    let doc = json!({
        "posts": [{"_id": 1}, {"_id": 2}],
        "comments": [{"_id": 1, "post_id": 1}, {"_id": 2, "post_id": 2}]
    });
    let config = ServerConfig {
        resource: ResourceOptions {
            id_field: "_id".into(),
            ..ResourceOptions::default()
        },
        ..ServerConfig::default()
    };
    let (app, _) = app_with(doc, config);

    let (status, _, comments) = send(&app, "GET", "/posts/1/comments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments, json!([{"_id": 1, "post_id": 1}]));

    let (status, _, created) = send(&app, "POST", "/posts/2/comments", Some(json!({"body": "x"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["post_id"], 2);
    assert_eq!(created["_id"], 3);

    let (status, _, orphans) = send(&app, "GET", "/posts/9/comments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orphans, json!([]));

    let (status, _, _) = send(&app, "GET", "/posts/1/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_route_filters_without_requiring_the_parent() {
    let doc = json!({
        "posts": [{"id": 1}, {"_id": 2}],
        "comments": [{"id": 1, "post_id": 1}]
    });
    let config = ServerConfig {
        resource: ResourceOptions {
            id_field: "_id".into(),
            foreign_key_suffix: "_id".into(),
            ..ResourceOptions::default()
        },
        ..ServerConfig::default()
    };
    let (app, _) = app_with(doc, config);

    let (status, headers, comments) = send(&app, "GET", "/posts/1/comments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments, json!([{"id": 1, "post_id": 1}]));
    assert_eq!(headers["x-total-count"], "1");
}

#[tokio::test]
async fn embeds_and_expands() {
    let (app, _) = app();
    let (_, _, post) = send(&app, "GET", "/posts/1?_embed=comments", None).await;
    assert_eq!(post["comments"], json!([{"id": 1, "body": "nice", "post_id": 1}]));

    let (_, _, comment) = send(&app, "GET", "/comments/2?_expand=post", None).await;
    assert_eq!(comment["post"]["title"], "world");
}

#[tokio::test]
async fn delete_cascades_to_children() {
    let (app, _) = app();
    let (status, _, _) = send(&app, "DELETE", "/posts/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, "GET", "/comments/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&app, "GET", "/comments/2", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn singleton_resources() {
    let (app, _) = app();
    let (_, _, profile) = send(&app, "GET", "/profile", None).await;
    assert_eq!(profile, json!({"name": "typicode"}));

    let (_, _, merged) = send(&app, "PATCH", "/profile", Some(json!({"age": 3}))).await;
    assert_eq!(merged, json!({"name": "typicode", "age": 3}));

    let (_, _, replaced) = send(&app, "PUT", "/profile", Some(json!({"name": "x"}))).await;
    assert_eq!(replaced, json!({"name": "x"}));

    let (status, _, _) = send(&app, "PUT", "/posts", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rewritten_writes_are_rejected_in_read_only_mode() {
    let config = ServerConfig {
        read_only: true,
        ..ServerConfig::default()
    };
    let state = state_for(blog(), config.resource.clone());
    state
        .rewriter
        .replace(RouteRewriter::compile(&[("/api/*".to_string(), "/$1".to_string())]).unwrap());
    let app = build_router(&config, state.clone(), &Pipeline::new());

    let (status, _, posts) = send(&app, "GET", "/api/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 2);

    let (status, _, body) = send(&app, "POST", "/api/posts", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
    assert_eq!(state.store.read("posts").len(), 2);

    let (_, _, rules) = send(&app, "GET", "/__rules", None).await;
    assert_eq!(rules, json!([{"from": "/api/*", "to": "/$1"}]));
}

#[tokio::test]
async fn delay_does_not_serialize_requests() {
    let config = ServerConfig {
        delay: Some(1000),
        ..ServerConfig::default()
    };
    let (app, _) = app_with(blog(), config);
    let started = Instant::now();
    let (a, b) = tokio::join!(send(&app, "GET", "/posts", None), send(&app, "GET", "/profile", None));
    let elapsed = started.elapsed();
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(1900));
}

struct EchoTitle;

#[async_trait::async_trait]
impl Middleware for EchoTitle {
    async fn handle(&self, req: Request, next: Next) -> Response {
        let mut res = next.run(req).await;
        res.headers_mut().insert("x-seen", "1".parse().unwrap());
        res
    }
}

#[tokio::test]
async fn custom_units_wrap_every_route() {
    let config = ServerConfig::default();
    let state = state_for(blog(), config.resource.clone());
    let mut units = Pipeline::new();
    units.push(EchoTitle);
    let app = build_router(&config, state, &units);
    let (_, headers, db) = send(&app, "GET", "/db", None).await;
    assert_eq!(headers["x-seen"], "1");
    assert_eq!(db, blog());
}

#[tokio::test]
async fn missing_source_file_is_created_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let server = ServerBuilder::new(ServerConfig::default(), Source::File(path.clone()))
        .build()
        .await
        .unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({}));

    let (status, _, body) = send(&server.router(), "GET", "/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn mutations_reach_the_backing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    std::fs::write(&path, blog().to_string()).unwrap();
    let server = ServerBuilder::new(ServerConfig::default(), Source::File(path.clone()))
        .build()
        .await
        .unwrap();

    let (status, _, _) = send(&server.router(), "POST", "/posts", Some(json!({"title": "persisted"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut persisted = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let text = std::fs::read_to_string(&path).unwrap();
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            if value["posts"].as_array().map(|p| p.len()) == Some(3) {
                assert_eq!(value["posts"][2]["title"], "persisted");
                persisted = true;
                break;
            }
        }
    }
    assert!(persisted);
}

#[tokio::test]
async fn read_only_never_touches_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let original = blog().to_string();
    std::fs::write(&path, &original).unwrap();
    let config = ServerConfig {
        read_only: true,
        ..ServerConfig::default()
    };
    let server = ServerBuilder::new(config, Source::File(path.clone())).build().await.unwrap();

    for (method, uri) in [("POST", "/posts"), ("PUT", "/posts/1"), ("PATCH", "/profile"), ("DELETE", "/posts/1")] {
        let (status, _, _) = send(&server.router(), method, uri, Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn invalid_source_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    std::fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(ServerBuilder::new(ServerConfig::default(), Source::File(path))
        .build()
        .await
        .is_err());
}

#[tokio::test]
async fn static_files_are_served_before_resources() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Hello</h1>").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
    let config = ServerConfig {
        static_dir: Some(dir.path().to_path_buf()),
        ..ServerConfig::default()
    };
    let (app, _) = app_with(blog(), config);

    let res = app
        .clone()
        .oneshot(axum::http::Request::get("/app.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"console.log(1)");

    let res = app
        .clone()
        .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>Hello</h1>");

    let (status, _, posts) = send(&app, "GET", "/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 2);
    let (status, _, _) = send(&app, "POST", "/posts", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::CREATED);
}
