//! Relations inferred from field names: a `post_id` field on a comment points at `posts`.
//! Nothing here is stored; descriptors are computed from the current document per query.

use crate::document::Document;
use crate::inflect::{foreign_key, singularize};

/// Parent collection, child collection and the child's field holding the parent id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub parent: String,
    pub child: String,
    pub foreign_key: String,
}

/// Direction of an include: to_one (`_expand`, we hold the key) or to_many (`_embed`, they hold it).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// Resolved include for one request parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeSpec {
    /// Key the related data is stored under in the response (`comments`, `post`).
    pub name: String,
    pub direction: IncludeDirection,
    pub related_collection: String,
    /// Our field used in the join (our FK for to_one; our id for to_many).
    pub our_key: String,
    /// Their field used in the join (their id for to_one; their FK for to_many).
    pub their_key: String,
}

/// Every relation present in the document for the given foreign-key suffix.
/// A relation exists when at least one child record carries the parent's foreign key.
pub fn infer_relations(document: &Document, suffix: &str) -> Vec<Relation> {
    let collections: Vec<&str> = document.collection_names().collect();
    let mut relations = Vec::new();
    for parent in &collections {
        let fk = foreign_key(parent, suffix);
        for child in &collections {
            if document.records(child).any(|r| r.contains_key(&fk)) {
                relations.push(Relation {
                    parent: parent.to_string(),
                    child: child.to_string(),
                    foreign_key: fk.clone(),
                });
            }
        }
    }
    relations
}

/// Relations in which `parent` is the referenced side.
pub fn children_of(document: &Document, parent: &str, suffix: &str) -> Vec<Relation> {
    infer_relations(document, suffix)
        .into_iter()
        .filter(|r| r.parent == parent)
        .collect()
}

/// Collection whose singular name is `name` (`post` -> `posts`). Exact names also match.
pub fn collection_for_singular<'a>(document: &'a Document, name: &str) -> Option<&'a str> {
    document
        .collection_names()
        .find(|c| singularize(c) == name)
        .or_else(|| document.collection_names().find(|c| *c == name))
}

/// `_embed=<child collection>`: children of `collection` holding its foreign key.
pub fn embed_spec(document: &Document, collection: &str, child: &str, id_field: &str, suffix: &str) -> Option<IncludeSpec> {
    if !document.is_collection(child) {
        return None;
    }
    Some(IncludeSpec {
        name: child.to_string(),
        direction: IncludeDirection::ToMany,
        related_collection: child.to_string(),
        our_key: id_field.to_string(),
        their_key: foreign_key(collection, suffix),
    })
}

/// `_expand=<singular parent>`: the parent record referenced by our foreign key.
pub fn expand_spec(document: &Document, parent: &str, id_field: &str, suffix: &str) -> Option<IncludeSpec> {
    let related = collection_for_singular(document, parent)?;
    Some(IncludeSpec {
        name: parent.to_string(),
        direction: IncludeDirection::ToOne,
        related_collection: related.to_string(),
        our_key: foreign_key(related, suffix),
        their_key: id_field.to_string(),
    })
}
