//! Firestore REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::values::{decode_fields, encode_fields, encode_value, quote_field_path};
use super::{Session, read_body};
use crate::config::FirebaseConfig;
use crate::platform::{
    CollectionPath, Direction, Document, DocumentPath, DocumentStore, FieldMask, Fields,
    PlatformError, Query, Subscription,
};

/// Client for Firestore's `v1` REST API.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    http: reqwest::Client,
    /// `projects/{p}/databases/(default)/documents`
    root: String,
    session: Session,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RestDocument {
    fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit_once('/')
            .map_or(self.name.as_str(), |(_, id)| id)
            .to_owned();
        Document {
            id,
            fields: decode_fields(&self.fields),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    document: Option<RestDocument>,
}

impl FirestoreClient {
    pub(crate) fn new(http: reqwest::Client, config: &FirebaseConfig, session: Session) -> Self {
        Self {
            inner: Arc::new(FirestoreClientInner {
                http,
                root: format!(
                    "projects/{}/databases/(default)/documents",
                    config.project_id
                ),
                session,
                poll_interval: config.live_poll_interval,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("https://firestore.googleapis.com/v1/{}", self.inner.root)
        } else {
            format!(
                "https://firestore.googleapis.com/v1/{}/{path}",
                self.inner.root
            )
        }
    }

    /// Append the API key and any extra query parameters to a URL.
    fn with_params(&self, url: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{url}?key={}", urlencoding::encode(self.inner.session.api_key()));
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// Attach the user's ID token when signed in, then send.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, PlatformError> {
        let request = match self.inner.session.id_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        read_body(response).await
    }

    fn structured_query(query: &Query) -> Value {
        let mut structured = Map::new();
        structured.insert(
            "from".to_owned(),
            json!([{ "collectionId": query.collection.collection_id() }]),
        );

        let filters: Vec<Value> = query
            .filters
            .iter()
            .map(|(field, value)| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": quote_field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                })
            })
            .collect();
        let clause = match filters.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            _ => Some(json!({ "compositeFilter": { "op": "AND", "filters": filters } })),
        };
        if let Some(clause) = clause {
            structured.insert("where".to_owned(), clause);
        }

        if let Some((field, direction)) = &query.order_by {
            let direction = match direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            structured.insert(
                "orderBy".to_owned(),
                json!([{ "field": { "fieldPath": quote_field_path(field) }, "direction": direction }]),
            );
        }
        if let Some(limit) = query.limit {
            structured.insert("limit".to_owned(), json!(limit));
        }

        json!({ "structuredQuery": structured })
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, PlatformError> {
        let request = self
            .inner
            .http
            .get(self.with_params(&self.url(&path.to_string()), &[]));
        match self.send(request).await {
            Ok(body) => {
                let doc: RestDocument = serde_json::from_str(&body)?;
                Ok(Some(doc.into_document()))
            }
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(collection = %query.collection))]
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PlatformError> {
        let parent = query.collection.parent().unwrap_or_default();
        let url = self.with_params(&format!("{}:runQuery", self.url(parent)), &[]);
        let request = self
            .inner
            .http
            .post(url)
            .json(&Self::structured_query(query));

        let body = self.send(request).await?;
        let rows: Vec<RunQueryRow> = serde_json::from_str(&body)?;
        let docs: Vec<Document> = rows
            .into_iter()
            .filter_map(|row| row.document.map(RestDocument::into_document))
            .collect();

        debug!(count = docs.len(), "Firestore query returned");
        Ok(docs)
    }

    #[instrument(skip(self, fields), fields(path = %path))]
    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), PlatformError> {
        let request = self
            .inner
            .http
            .post(self.with_params(
                &self.url(path.parent().as_str()),
                &[("documentId", path.id().to_owned())],
            ))
            .json(&json!({ "fields": encode_fields(&fields) }));
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, PlatformError> {
        let request = self
            .inner
            .http
            .post(self.with_params(&self.url(collection.as_str()), &[]))
            .json(&json!({ "fields": encode_fields(&fields) }));
        let body = self.send(request).await?;
        let doc: RestDocument = serde_json::from_str(&body)?;
        let doc = doc.into_document();
        Ok(collection.doc(&doc.id))
    }

    #[instrument(skip(self, fields, mask), fields(path = %path, paths = mask.len()))]
    async fn merge(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mask: &FieldMask,
    ) -> Result<(), PlatformError> {
        let mask_params: Vec<(&str, String)> = mask
            .iter()
            .map(|p| ("updateMask.fieldPaths", quote_field_path(p)))
            .collect();
        let request = self
            .inner
            .http
            .patch(self.with_params(&self.url(&path.to_string()), &mask_params))
            .json(&json!({ "fields": encode_fields(&fields) }));
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        by: i64,
    ) -> Result<(), PlatformError> {
        let body = json!({
            "writes": [{
                "transform": {
                    "document": format!("{}/{path}", self.inner.root),
                    "fieldTransforms": [{
                        "fieldPath": quote_field_path(field),
                        "increment": encode_value(&Value::from(by)),
                    }],
                },
                "currentDocument": { "exists": true },
            }]
        });
        let request = self
            .inner
            .http
            .post(self.with_params(&format!("{}:commit", self.url("")), &[]))
            .json(&body);
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &DocumentPath) -> Result<(), PlatformError> {
        let request = self
            .inner
            .http
            .delete(self.with_params(&self.url(&path.to_string()), &[]));
        match self.send(request).await {
            Ok(_) | Err(PlatformError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self, collection: &CollectionPath) -> Subscription {
        let client = self.clone();
        let query = Query::collection(collection.clone());
        let (tx, rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(client.inner.poll_interval);
            let mut last: Option<Vec<Document>> = None;
            loop {
                interval.tick().await;
                let snapshot = match client.query(&query).await {
                    Ok(mut docs) => {
                        docs.sort_by(|a, b| a.id.cmp(&b.id));
                        docs
                    }
                    Err(e) => {
                        warn!(collection = %query.collection, error = %e, "Live poll failed");
                        if tx.send(Err(e)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };
                if last.as_ref() != Some(&snapshot) {
                    if tx.send(Ok(snapshot.clone())).await.is_err() {
                        break;
                    }
                    last = Some(snapshot);
                }
            }
        });

        Subscription::new(rx, task)
    }
}
