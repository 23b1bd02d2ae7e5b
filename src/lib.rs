//! JSON mock server: a full REST API over a single JSON document.
//!
//! Every top-level key of the document becomes a resource: arrays are collections with
//! CRUD, filtering, sorting, pagination and relationship expansion; other values are
//! singletons. Mutations are written back to the source file.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod inflect;
pub mod middleware;
pub mod persistence;
pub mod relations;
pub mod response;
pub mod rewrite;
pub mod routes;
pub mod server;
pub mod service;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod watcher;

pub use config::{CascadeMode, ResourceOptions, ServerConfig};
pub use document::{Document, Record};
pub use error::{AppError, ConfigError, PersistError, SourceError, StartupError};
pub use middleware::{Middleware, Pipeline};
pub use persistence::{SeedProvider, Source, StaticSeed};
pub use rewrite::{RouteRewriter, SharedRewriter};
pub use routes::{common_routes, resource_routes};
pub use server::{build_router, Server, ServerBuilder};
pub use service::CrudService;
pub use snapshot::SnapshotService;
pub use state::AppState;
pub use store::Store;
