//! Request-handling units that run before the resource router.
//! A unit may inspect or change the request and response; it calls `next` once,
//! or returns its own response to stop the chain.

mod delay;
mod headers;
mod read_only;

pub use delay::Delay;
pub use headers::{HeaderUnit, HeaderUnitSpec};
pub use read_only::ReadOnly;

use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response, Router};
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    async fn handle(&self, req: Request, next: Next) -> Response;
}

/// Ordered chain of units; the first unit sees the request first.
#[derive(Clone, Default)]
pub struct Pipeline {
    units: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { units: Vec::new() }
    }

    pub fn push<M: Middleware>(&mut self, unit: M) -> &mut Self {
        self.units.push(Arc::new(unit));
        self
    }

    pub fn push_arc(&mut self, unit: Arc<dyn Middleware>) -> &mut Self {
        self.units.push(unit);
        self
    }

    pub fn units(&self) -> &[Arc<dyn Middleware>] {
        &self.units
    }

    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Wrap `router` (routes and fallback already added). Layers added last run first,
    /// so units are layered in reverse.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.units.iter().rev().fold(router, |router, unit| {
            let unit = unit.clone();
            router.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
                let unit = unit.clone();
                async move { unit.handle(req, next).await }
            }))
        })
    }
}
