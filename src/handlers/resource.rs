//! Resource handlers: collection list/create, item read/update/delete, nested relations
//! and singleton resources.

use crate::document::{value_to_text, Record};
use crate::error::AppError;
use crate::response::{created, success_many, success_one_ok};
use crate::service::{CrudService, ListQuery};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::Uri,
    response::Response,
    Json,
};
use serde_json::Value;

type Params = Query<Vec<(String, String)>>;

fn body_to_record(body: Result<Json<Value>, JsonRejection>) -> Result<Record, AppError> {
    match body? {
        Json(Value::Object(m)) => Ok(m),
        Json(_) => Err(AppError::MalformedBody("body must be a JSON object".into())),
    }
}

fn location(collection: &str, record: &Record, id_field: &str) -> String {
    match record.get(id_field).and_then(value_to_text) {
        Some(id) => format!("/{}/{}", collection, id),
        None => format!("/{}", collection),
    }
}

/// GET /:name: filtered list of a collection, or the value of a singleton.
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Params,
    uri: Uri,
) -> Result<Response, AppError> {
    let doc = state.store.snapshot();
    if let Some(value) = CrudService::singleton(&doc, &name) {
        return Ok(success_one_ok(value));
    }
    let query = ListQuery::from_params(&params)?;
    let page = CrudService::list(&doc, state.store.options(), &name, &query);
    Ok(success_many(page, &uri))
}

/// POST /:name: create a record (201 + Location), or replace a singleton.
pub async fn create(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    if state.store.snapshot().is_singleton(&name) {
        let value = state.store.write_singleton(&name, Value::Object(record), false).await?;
        return Ok(success_one_ok(value));
    }
    let saved = state.store.create(&name, record).await?;
    let loc = location(&name, &saved, &state.store.options().id_field);
    Ok(created(&loc, saved))
}

/// PUT /:name on a singleton.
pub async fn replace_singleton(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    let value = state.store.write_singleton(&name, Value::Object(record), false).await?;
    Ok(success_one_ok(value))
}

/// PATCH /:name on a singleton.
pub async fn patch_singleton(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    let value = state.store.write_singleton(&name, Value::Object(record), true).await?;
    Ok(success_one_ok(value))
}

/// GET /:name/:id, honouring `_embed` and `_expand`.
pub async fn read(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Query(params): Params,
) -> Result<Response, AppError> {
    let query = ListQuery::from_params(&params)?;
    let doc = state.store.snapshot();
    let record = CrudService::read_with_includes(&doc, state.store.options(), &name, &id, &query.embed, &query.expand)
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", name, id)))?;
    Ok(success_one_ok(record))
}

pub async fn update(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    let saved = state.store.update(&name, &id, record, false).await?;
    Ok(success_one_ok(saved))
}

pub async fn patch(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    let saved = state.store.update(&name, &id, record, true).await?;
    Ok(success_one_ok(saved))
}

/// DELETE /:name/:id: 200 with the removed record. Dependents go per the cascade mode.
pub async fn delete(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let removed = state.store.delete(&name, &id).await?;
    Ok(success_one_ok(removed))
}

/// GET /:name/:id/:relation: children whose foreign key points at the parent.
pub async fn list_related(
    State(state): State<AppState>,
    Path((name, id, relation)): Path<(String, String, String)>,
    Query(params): Params,
    uri: Uri,
) -> Result<Response, AppError> {
    let query = ListQuery::from_params(&params)?;
    let doc = state.store.snapshot();
    let page = CrudService::list_related(&doc, state.store.options(), &name, &id, &relation, &query)?;
    Ok(success_many(page, &uri))
}

/// POST /:name/:id/:relation: create a child with its foreign key preset.
pub async fn create_related(
    State(state): State<AppState>,
    Path((name, id, relation)): Path<(String, String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let record = body_to_record(body)?;
    let saved = state
        .store
        .mutate(|doc, opts| CrudService::create_related(doc, opts, &name, &id, &relation, record))
        .await?;
    let loc = location(&relation, &saved, &state.store.options().id_field);
    Ok(created(&loc, saved))
}
