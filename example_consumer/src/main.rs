//! Example consumer: embeds json-mock-server with a seed document and a custom unit.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Then: `curl -i -X POST localhost:3000/posts -H 'content-type: application/json' -d '{"name":"test"}'`

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use json_mock_server::{Document, Middleware, ServerBuilder, ServerConfig, Source, StaticSeed};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Reads the JSON body of a POST and echoes its `name` field back as a `name` header.
struct EchoName;

#[async_trait]
impl Middleware for EchoName {
    fn name(&self) -> String {
        "echo-name".into()
    }

    async fn handle(&self, req: Request, next: Next) -> Response {
        if req.method() != axum::http::Method::POST {
            return next.run(req).await;
        }
        let (parts, body) = req.into_parts();
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable body");
                return next.run(Request::from_parts(parts, Body::empty())).await;
            }
        };
        let name = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|v| v.get("name").and_then(Value::as_str).map(String::from));
        let mut res = next.run(Request::from_parts(parts, Body::from(bytes))).await;
        if let Some(v) = name.and_then(|n| HeaderValue::from_str(&n).ok()) {
            res.headers_mut().insert("name", v);
        }
        res
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("json_mock_server=info,example_consumer=info")),
        )
        .init();

    let seed = Document::from_value(json!({
        "posts": [{"id": 1, "title": "json-mock-server", "author": "typicode"}],
        "comments": [{"id": 1, "body": "some comment", "post_id": 1}],
        "profile": {"name": "typicode"}
    }))
    .ok_or("seed must be a JSON object")?;

    let server = ServerBuilder::new(ServerConfig::default(), Source::File("db.json".into()))
        .seed(Arc::new(StaticSeed(seed)))
        .middleware(EchoName)
        .build()
        .await?;
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    server
        .serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
