//! CRUD over an in-memory document. Pure functions: the caller owns locking and persistence.

use crate::config::{CascadeMode, ResourceOptions};
use crate::document::{id_matches, value_to_text, Document, Record};
use crate::error::AppError;
use crate::relations::{children_of, embed_spec, expand_spec, IncludeDirection, IncludeSpec};
use crate::service::query::{Filter, FilterOp, ListQuery, Page};
use serde_json::Value;
use std::collections::HashSet;

pub struct CrudService;

fn find_index(items: &[Value], id_field: &str, id: &str) -> Option<usize> {
    items
        .iter()
        .position(|v| v.get(id_field).map(|x| id_matches(x, id)).unwrap_or(false))
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (value_to_text(a), value_to_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Next id for a collection: `max + 1` while every id is an integer (and that does not
/// overflow), otherwise a random 8-character token not yet used in the collection.
pub fn generate_id(items: &[Value], id_field: &str) -> Value {
    let ids: Vec<&Value> = items.iter().filter_map(|v| v.get(id_field)).collect();
    if ids.iter().all(|v| v.is_i64()) {
        let max = ids.iter().filter_map(|v| v.as_i64()).max().unwrap_or(0);
        if let Some(next) = max.checked_add(1) {
            return Value::Number(next.into());
        }
    }
    loop {
        let token: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        if !ids.iter().any(|v| id_matches(v, &token)) {
            return Value::String(token);
        }
    }
}

impl CrudService {
    /// Filtered, sorted and paginated records of a collection, with includes attached.
    /// An unknown collection lists as empty.
    pub fn list(doc: &Document, opts: &ResourceOptions, collection: &str, query: &ListQuery) -> Page {
        let mut page = query.apply(doc.records(collection));
        for record in page.items.iter_mut() {
            Self::attach_includes(doc, opts, collection, record, &query.embed, &query.expand);
        }
        page
    }

    pub fn read(doc: &Document, opts: &ResourceOptions, collection: &str, id: &str) -> Option<Record> {
        doc.records(collection)
            .find(|r| r.get(&opts.id_field).map(|v| id_matches(v, id)).unwrap_or(false))
            .cloned()
    }

    /// One record with `_embed` / `_expand` includes attached.
    pub fn read_with_includes(
        doc: &Document,
        opts: &ResourceOptions,
        collection: &str,
        id: &str,
        embed: &[String],
        expand: &[String],
    ) -> Option<Record> {
        let mut record = Self::read(doc, opts, collection, id)?;
        Self::attach_includes(doc, opts, collection, &mut record, embed, expand);
        Some(record)
    }

    /// Records of `relation` whose foreign key points at `collection/id`. The parent itself
    /// need not exist; only an unknown `relation` is a 404.
    pub fn list_related(
        doc: &Document,
        opts: &ResourceOptions,
        collection: &str,
        id: &str,
        relation: &str,
        query: &ListQuery,
    ) -> Result<Page, AppError> {
        if !doc.is_collection(relation) {
            return Err(AppError::NotFound(format!("{}/{}/{}", collection, id, relation)));
        }
        let fk = crate::inflect::foreign_key(collection, &opts.foreign_key_suffix);
        let mut scoped = query.clone();
        scoped.filters.push(Filter::new(&fk, FilterOp::Eq, id)?);
        Ok(Self::list(doc, opts, relation, &scoped))
    }

    pub fn create(doc: &mut Document, opts: &ResourceOptions, collection: &str, mut body: Record) -> Result<Record, AppError> {
        let items = doc
            .collection_mut(collection)
            .ok_or_else(|| AppError::BadRequest(format!("{} is not a collection", collection)))?;
        match body.get(&opts.id_field) {
            Some(Value::Null) | None => {
                let id = generate_id(items, &opts.id_field);
                body.insert(opts.id_field.clone(), id);
            }
            Some(id) => {
                if items
                    .iter()
                    .filter_map(|v| v.get(&opts.id_field))
                    .any(|existing| same_key(existing, id))
                {
                    return Err(AppError::Conflict(format!(
                        "{} {} already exists in {}",
                        opts.id_field, id, collection
                    )));
                }
            }
        }
        items.push(Value::Object(body.clone()));
        Ok(body)
    }

    /// Create a child of `collection/id` in `relation`, presetting the foreign key.
    pub fn create_related(
        doc: &mut Document,
        opts: &ResourceOptions,
        collection: &str,
        id: &str,
        relation: &str,
        mut body: Record,
    ) -> Result<Record, AppError> {
        let parent = Self::read(doc, opts, collection, id)
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;
        let parent_id = parent.get(&opts.id_field).cloned().unwrap_or(Value::Null);
        body.insert(crate::inflect::foreign_key(collection, &opts.foreign_key_suffix), parent_id);
        Self::create(doc, opts, relation, body)
    }

    /// Replace (`merge = false`) or shallow-merge a record. The id from the path is kept either way.
    pub fn update(
        doc: &mut Document,
        opts: &ResourceOptions,
        collection: &str,
        id: &str,
        body: Record,
        merge: bool,
    ) -> Result<Record, AppError> {
        let not_found = || AppError::NotFound(format!("{}/{}", collection, id));
        if !doc.is_collection(collection) {
            return Err(not_found());
        }
        let items = doc.collection_mut(collection).ok_or_else(not_found)?;
        let index = find_index(items, &opts.id_field, id).ok_or_else(not_found)?;
        let existing = items[index].as_object().cloned().unwrap_or_default();
        let current_id = existing.get(&opts.id_field).cloned().unwrap_or(Value::Null);

        let mut next = if merge { existing } else { Record::new() };
        if !merge {
            // Keep the id as the first key so replaced records read like created ones.
            next.insert(opts.id_field.clone(), current_id.clone());
        }
        for (k, v) in body {
            if k != opts.id_field {
                next.insert(k, v);
            }
        }
        next.insert(opts.id_field.clone(), current_id);
        items[index] = Value::Object(next.clone());
        Ok(next)
    }

    /// Remove a record and, depending on the cascade mode, the records referencing it.
    /// Returns the removed record and the number of cascaded removals.
    pub fn delete(doc: &mut Document, opts: &ResourceOptions, collection: &str, id: &str) -> Result<(Record, usize), AppError> {
        let not_found = || AppError::NotFound(format!("{}/{}", collection, id));
        if !doc.is_collection(collection) {
            return Err(not_found());
        }
        let items = doc.collection_mut(collection).ok_or_else(not_found)?;
        let index = find_index(items, &opts.id_field, id).ok_or_else(not_found)?;
        let removed = items.remove(index).as_object().cloned().unwrap_or_default();

        let cascaded = match opts.cascade {
            CascadeMode::Off => 0,
            CascadeMode::Direct => Self::remove_children(doc, opts, collection, &removed, false),
            CascadeMode::Transitive => Self::remove_children(doc, opts, collection, &removed, true),
        };
        Ok((removed, cascaded))
    }

    fn remove_children(doc: &mut Document, opts: &ResourceOptions, collection: &str, parent: &Record, transitive: bool) -> usize {
        let mut pending: Vec<(String, Value)> = match parent.get(&opts.id_field) {
            Some(id) => vec![(collection.to_string(), id.clone())],
            None => return 0,
        };
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut count = 0;
        while let Some((parent_collection, parent_id)) = pending.pop() {
            let key = (parent_collection.clone(), value_to_text(&parent_id).unwrap_or_default());
            if !visited.insert(key) {
                continue;
            }
            for relation in children_of(doc, &parent_collection, &opts.foreign_key_suffix) {
                let Some(items) = doc.collection_mut(&relation.child) else {
                    continue;
                };
                let mut kept = Vec::with_capacity(items.len());
                for item in items.drain(..) {
                    let references = item
                        .get(&relation.foreign_key)
                        .map(|fk| same_key(fk, &parent_id))
                        .unwrap_or(false);
                    if !references {
                        kept.push(item);
                        continue;
                    }
                    count += 1;
                    if transitive {
                        if let Some(child_id) = item.get(&opts.id_field) {
                            pending.push((relation.child.clone(), child_id.clone()));
                        }
                    }
                }
                *items = kept;
            }
        }
        if count > 0 {
            tracing::debug!(collection, removed = count, "cascade delete");
        }
        count
    }

    pub fn singleton(doc: &Document, name: &str) -> Option<Value> {
        doc.get(name).filter(|v| !v.is_array()).cloned()
    }

    /// Replace or shallow-merge a singleton resource.
    pub fn write_singleton(doc: &mut Document, name: &str, body: Value, merge: bool) -> Result<Value, AppError> {
        if !doc.is_singleton(name) {
            return Err(AppError::NotFound(name.to_string()));
        }
        let next = match (merge, doc.get(name), body) {
            (true, Some(Value::Object(current)), Value::Object(patch)) => {
                let mut merged = current.clone();
                merged.extend(patch);
                Value::Object(merged)
            }
            (_, _, body) => body,
        };
        doc.set(name, next.clone());
        Ok(next)
    }

    fn attach_includes(
        doc: &Document,
        opts: &ResourceOptions,
        collection: &str,
        record: &mut Record,
        embed: &[String],
        expand: &[String],
    ) {
        let specs = embed
            .iter()
            .filter_map(|child| embed_spec(doc, collection, child, &opts.id_field, &opts.foreign_key_suffix))
            .chain(
                expand
                    .iter()
                    .filter_map(|parent| expand_spec(doc, parent, &opts.id_field, &opts.foreign_key_suffix)),
            )
            .collect::<Vec<IncludeSpec>>();
        for spec in specs {
            let Some(key) = record.get(&spec.our_key).cloned() else {
                continue;
            };
            let mut related = doc.records(&spec.related_collection).filter(|r| {
                r.get(&spec.their_key)
                    .map(|v| same_key(v, &key))
                    .unwrap_or(false)
            });
            let value = match spec.direction {
                IncludeDirection::ToMany => Value::Array(related.map(|r| Value::Object(r.clone())).collect()),
                IncludeDirection::ToOne => match related.next() {
                    Some(r) => Value::Object(r.clone()),
                    None => continue,
                },
            };
            record.insert(spec.name.clone(), value);
        }
    }
}
