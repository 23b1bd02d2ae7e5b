use super::Middleware;
use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Duration;

/// Waits a fixed time before passing the request on. The wait yields to the runtime,
/// so other requests keep being served.
pub struct Delay(pub Duration);

impl Delay {
    pub fn from_millis(ms: u64) -> Self {
        Delay(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Middleware for Delay {
    fn name(&self) -> String {
        format!("delay({}ms)", self.0.as_millis())
    }

    async fn handle(&self, req: Request, next: Next) -> Response {
        tokio::time::sleep(self.0).await;
        next.run(req).await
    }
}
