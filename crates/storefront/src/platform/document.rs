//! Document store abstraction.
//!
//! Documents are addressed by slash-separated paths (`users/{uid}/cart/{item}`)
//! and carry JSON-shaped fields. Writes that must not disturb sibling data go
//! through [`DocumentStore::merge`] with an explicit [`FieldMask`]; only the
//! listed field paths are touched.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::PlatformError;

/// Field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Result delivered by a live subscription: the full current document set.
pub type Snapshot = Result<Vec<Document>, PlatformError>;

// =============================================================================
// Paths
// =============================================================================

/// Path to a collection (`food-items`, `users/{uid}/cart`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self(name.to_owned())
    }

    /// A document inside this collection.
    #[must_use]
    pub fn doc(&self, id: &str) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.to_owned(),
        }
    }

    /// Parent document for sub-collections, `None` for top-level collections.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Last path segment (the collection id).
    #[must_use]
    pub fn collection_id(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// A sub-collection nested under this document.
    #[must_use]
    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{name}", self.collection.0, self.id))
    }

    /// Collection containing this document.
    #[must_use]
    pub const fn parent(&self) -> &CollectionPath {
        &self.collection
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection.0, self.id)
    }
}

// =============================================================================
// Documents
// =============================================================================

/// A document read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id (last path segment).
    pub id: String,
    /// Document fields.
    pub fields: Fields,
}

impl Document {
    /// Deserialize the document fields into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidDocument` if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PlatformError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| PlatformError::InvalidDocument(format!("{}: {e}", self.id)))
    }

    /// Look up a value by dotted field path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.fields, path)
    }
}

/// Current time as stored in `createdAt` / `updatedAt` fields.
#[must_use]
pub fn timestamp_now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

// =============================================================================
// Queries
// =============================================================================

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A collection query: equality filters ANDed together, optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    /// Every document in a collection.
    #[must_use]
    pub const fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_owned(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// =============================================================================
// Field masks
// =============================================================================

/// The set of dotted field paths a merge write is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMask(Vec<String>);

impl FieldMask {
    #[must_use]
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Every leaf path of `fields`, so nested maps are merged key by key.
    ///
    /// Empty maps count as leaves and replace whatever is stored there.
    #[must_use]
    pub fn leaves(fields: &Fields) -> Self {
        let mut paths = Vec::new();
        collect_leaves(fields, "", &mut paths);
        Self(paths)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn collect_leaves(fields: &Fields, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in fields {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(map) if !map.is_empty() => collect_leaves(map, &path, out),
            _ => out.push(path),
        }
    }
}

/// Look up a value by dotted path.
#[must_use]
pub fn get_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a value by dotted path, creating (or replacing non-map) intermediates.
pub fn set_path(fields: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            let entry = fields
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Fields::new()));
            if !entry.is_object() {
                *entry = Value::Object(Fields::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove a value by dotted path. Missing paths are ignored.
pub fn remove_path(fields: &mut Fields, path: &str) {
    match path.split_once('.') {
        None => {
            fields.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = fields.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Apply a masked merge of `source` onto `target`.
///
/// Paths present in `source` are written; masked paths absent from `source`
/// are deleted. Paths outside the mask are never touched.
pub fn apply_merge(target: &mut Fields, source: &Fields, mask: &FieldMask) {
    for path in mask.iter() {
        match get_path(source, path) {
            Some(value) => set_path(target, path, value.clone()),
            None => remove_path(target, path),
        }
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// A cancellable live view of a collection.
///
/// Every delivered item is the full current document set. Dropping the
/// subscription (or calling [`Subscription::cancel`]) stops the background
/// listener.
pub struct Subscription {
    receiver: mpsc::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a snapshot channel and the task feeding it.
    #[must_use]
    pub const fn new(receiver: mpsc::Receiver<Snapshot>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Wait for the next snapshot. Returns `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Stop listening.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.task.as_ref().is_some_and(|t| !t.is_finished()))
            .finish()
    }
}

// =============================================================================
// DocumentStore
// =============================================================================

/// Operations the core needs from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by path. Missing documents are `Ok(None)`.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, PlatformError>;

    /// Run a query against one collection.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PlatformError>;

    /// Create a document that must not exist yet.
    ///
    /// Fails with `PlatformError::AlreadyExists` if it does.
    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), PlatformError>;

    /// Add a document with a store-generated id.
    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, PlatformError>;

    /// Write only the masked field paths, creating the document if needed.
    async fn merge(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mask: &FieldMask,
    ) -> Result<(), PlatformError>;

    /// Atomically add `by` to an integer field of an existing document.
    ///
    /// Fails with `PlatformError::NotFound` if the document is gone.
    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        by: i64,
    ) -> Result<(), PlatformError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocumentPath) -> Result<(), PlatformError>;

    /// Listen to a collection, receiving the full document set on every change.
    fn subscribe(&self, collection: &CollectionPath) -> Subscription;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_paths() {
        let cart = CollectionPath::root("users").doc("u1").collection("cart");
        assert_eq!(cart.as_str(), "users/u1/cart");
        assert_eq!(cart.parent(), Some("users/u1"));
        assert_eq!(cart.collection_id(), "cart");
        assert_eq!(cart.doc("jollof").to_string(), "users/u1/cart/jollof");
        assert_eq!(CollectionPath::root("food-items").parent(), None);
    }

    #[test]
    fn test_leaves_descend_into_maps() {
        let source = fields(json!({
            "savedPayment": { "method": "Card", "card": { "last4": "4242" }, "mobile": null },
            "updatedAt": "2025-01-01T00:00:00Z",
            "account": {}
        }));
        let mask = FieldMask::leaves(&source);
        let mut leaves: Vec<&str> = mask.iter().collect();
        leaves.sort_unstable();
        assert_eq!(
            leaves,
            [
                "account",
                "savedPayment.card.last4",
                "savedPayment.method",
                "savedPayment.mobile",
                "updatedAt"
            ]
        );
    }

    #[test]
    fn test_apply_merge_leaves_siblings_alone() {
        let mut stored = fields(json!({
            "savedPayment": { "method": "Card" },
            "preferences": { "promoCode": "JOLLOF10", "newsletterSubscribed": false }
        }));
        let update = fields(json!({ "preferences": { "newsletterSubscribed": true } }));

        apply_merge(&mut stored, &update, &FieldMask::leaves(&update));

        assert_eq!(
            Value::Object(stored),
            json!({
                "savedPayment": { "method": "Card" },
                "preferences": { "promoCode": "JOLLOF10", "newsletterSubscribed": true }
            })
        );
    }

    #[test]
    fn test_apply_merge_removes_masked_paths_missing_from_source() {
        let mut stored = fields(json!({ "a": { "b": 1, "c": 2 } }));
        apply_merge(&mut stored, &Fields::new(), &FieldMask::new(["a.b"]));
        assert_eq!(Value::Object(stored), json!({ "a": { "c": 2 } }));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut stored = fields(json!({ "card": null }));
        set_path(&mut stored, "card.last4", json!("4242"));
        assert_eq!(Value::Object(stored), json!({ "card": { "last4": "4242" } }));
    }

    #[test]
    fn test_query_builder() {
        let q = Query::collection(CollectionPath::root("orders"))
            .where_eq("uid", "u1")
            .order_by("createdAt", Direction::Descending)
            .limit(10);
        assert_eq!(q.filters, vec![("uid".to_string(), json!("u1"))]);
        assert_eq!(q.limit, Some(10));
    }
}
