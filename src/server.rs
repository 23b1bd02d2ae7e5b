//! Assembles the application: load the source, build the store, compose the router with its
//! middleware stack, start the watcher, serve.
//!
//! Layering, outermost first: trace, CORS, gzip, body limit, URI rewrite, static files, then
//! the middleware pipeline (delay, read-only, user units) around the resource routes.

use crate::config::{load_routes, ServerConfig};
use crate::error::StartupError;
use crate::middleware::{Delay, HeaderUnit, Middleware, Pipeline, ReadOnly};
use crate::persistence::{self, load_seed, FileSink, SeedProvider, Source};
use crate::rewrite::{rewrite_uri, RouteRewriter, SharedRewriter};
use crate::routes::{common_routes, resource_routes};
use crate::snapshot::SnapshotService;
use crate::state::AppState;
use crate::store::Store;
use crate::watcher::{spawn_watcher, FileWatcher};
use axum::{extract::DefaultBodyLimit, http::HeaderName, Router};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir,
    trace::TraceLayer,
};

/// Largest accepted request body.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Compose the full router for `state`. `units` run after the built-in delay and
/// read-only units, in order.
pub fn build_router(config: &ServerConfig, state: AppState, units: &Pipeline) -> Router {
    let mut pipeline = Pipeline::new();
    if let Some(ms) = config.delay.filter(|ms| *ms > 0) {
        pipeline.push(Delay::from_millis(ms));
    }
    if config.read_only {
        pipeline.push(ReadOnly);
    }
    for unit in units.units() {
        pipeline.push_arc(unit.clone());
    }

    let api = pipeline.apply(
        Router::new()
            .merge(common_routes(state.clone()))
            .merge(resource_routes(state.clone())),
    );
    // Static files win over resources; anything not on disk falls through to the API.
    let inner = match &config.static_dir {
        Some(dir) => Router::new().fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(api),
        ),
        None => api,
    };

    // The rewrite runs on an outer router so the inner one routes on the rewritten URI.
    let mut app = Router::new()
        .fallback_service(inner)
        .layer(axum::middleware::from_fn_with_state(state.rewriter.clone(), rewrite_uri))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));
    if config.gzip {
        app = app.layer(CompressionLayer::new());
    }
    if config.cors {
        app = app.layer(CorsLayer::very_permissive().expose_headers([
            HeaderName::from_static(crate::response::TOTAL_COUNT_HEADER),
            axum::http::header::LINK,
            axum::http::header::LOCATION,
        ]));
    }
    app.layer(TraceLayer::new_for_http())
}

pub struct ServerBuilder {
    config: ServerConfig,
    source: Source,
    seed: Option<Arc<dyn SeedProvider>>,
    units: Pipeline,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig, source: Source) -> Self {
        ServerBuilder {
            config,
            source,
            seed: None,
            units: Pipeline::new(),
        }
    }

    /// Append a unit after those loaded from `config.middlewares`.
    pub fn middleware<M: Middleware>(mut self, unit: M) -> Self {
        self.units.push(unit);
        self
    }

    /// Take the initial document from `provider` instead of the source. Nothing is persisted.
    pub fn seed(mut self, provider: Arc<dyn SeedProvider>) -> Self {
        self.seed = Some(provider);
        self
    }

    pub async fn build(self) -> Result<Server, StartupError> {
        let ServerBuilder {
            config,
            source,
            seed,
            units,
        } = self;
        let options = config.resource.clone();

        let store = match (&seed, &source) {
            (Some(provider), _) => Store::in_memory(load_seed(provider.as_ref()).await?, options),
            (None, Source::File(path)) => {
                let doc = persistence::load(&source).await?;
                let sink = FileSink::spawn(path.clone(), Arc::new(doc.clone()));
                Store::with_sink(doc, options, sink)
            }
            (None, _) => {
                let doc = persistence::load(&source).await?;
                tracing::info!(source = %source.name(), "changes will not be persisted");
                Store::in_memory(doc, options)
            }
        };
        let store = Arc::new(store);

        let rewriter = match &config.routes {
            Some(path) => {
                let rules = load_routes(path).await?;
                tracing::info!(path = %path.display(), rules = rules.len(), "loaded routes");
                SharedRewriter::new(RouteRewriter::compile(&rules)?)
            }
            None => SharedRewriter::default(),
        };

        let mut pipeline = Pipeline::new();
        for path in &config.middlewares {
            pipeline.push(HeaderUnit::load(path).await?);
        }
        for unit in units.units() {
            pipeline.push_arc(unit.clone());
        }

        let watcher = if config.watch {
            let database = match seed {
                Some(_) => None,
                None => source.file_path().map(Path::to_path_buf),
            };
            let routes = config.routes.clone().map(|p| (p, rewriter.clone()));
            Some(spawn_watcher(
                store.clone(),
                database,
                routes,
                Duration::from_millis(config.watch_debounce_ms),
            )?)
        } else {
            None
        };

        let state = AppState { store, rewriter };
        let router = build_router(&config, state.clone(), &pipeline);
        tracing::debug!(middlewares = ?pipeline.names(), "router built");
        Ok(Server {
            snapshots: SnapshotService::new(config.snapshots.clone()),
            config,
            state,
            router,
            _watcher: watcher,
        })
    }
}

pub struct Server {
    config: ServerConfig,
    state: AppState,
    router: Router,
    snapshots: SnapshotService,
    _watcher: Option<FileWatcher>,
}

impl Server {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn snapshots(&self) -> &SnapshotService {
        &self.snapshots
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve on `listener` until `shutdown` resolves, then write the document one last time.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(shutdown)
            .await?;
        if let Err(e) = self.state.store.flush().await {
            tracing::error!(error = %e, "final flush failed");
        }
        Ok(())
    }
}
