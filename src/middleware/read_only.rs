use super::Middleware;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Rejects every request that could change data with 403, before it reaches the store.
pub struct ReadOnly;

#[async_trait]
impl Middleware for ReadOnly {
    fn name(&self) -> String {
        "read-only".into()
    }

    async fn handle(&self, req: Request, next: Next) -> Response {
        if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
            return next.run(req).await;
        }
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "rejected in read-only mode");
        AppError::Forbidden(format!("{} not allowed in read-only mode", req.method())).into_response()
    }
}
