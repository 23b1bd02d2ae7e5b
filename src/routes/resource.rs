//! Resource routes. Every top-level key of the document is served under `/:name`; a
//! collection also gets `/:name/:id` and nested `/:name/:id/:relation`.

use crate::handlers::resource::{
    create, create_related, delete as delete_handler, list, list_related, patch, patch_singleton, read,
    replace_singleton, update,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/:name",
            get(list).post(create).put(replace_singleton).patch(patch_singleton),
        )
        .route(
            "/:name/:id",
            get(read).put(update).patch(patch).delete(delete_handler),
        )
        .route("/:name/:id/:relation", get(list_related).post(create_related))
        .with_state(state)
}
