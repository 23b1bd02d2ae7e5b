//! Shared application state for all routes. Both members are swapped in place by the watcher.

use crate::rewrite::SharedRewriter;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    /// Reloaded when the routes file changes, without restart.
    pub rewriter: SharedRewriter,
}
