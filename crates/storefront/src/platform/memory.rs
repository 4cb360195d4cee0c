//! In-memory platform.
//!
//! Implements the three platform traits inside the process. Merge writes
//! apply the field mask explicitly (see [`apply_merge`]), live subscriptions
//! are driven by a revision counter, and failures can be injected per
//! operation and path so callers can exercise partial-failure handling.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use url::Url;

use bukka_core::{Email, UserId};

use super::PlatformError;
use super::auth::{AuthProvider, AuthUser};
use super::document::{
    CollectionPath, Direction, Document, DocumentPath, DocumentStore, FieldMask, Fields, Query,
    Subscription, apply_merge, get_path,
};
use super::storage::{ObjectStorage, StorageError};
use crate::services::auth::AuthError;

/// Minimum password length accepted by the provider itself.
const PROVIDER_MIN_PASSWORD: usize = 6;

/// All three in-memory collaborators.
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    pub documents: MemoryDocumentStore,
    pub auth: MemoryAuth,
    pub storage: MemoryObjectStorage,
}

impl MemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Document store
// =============================================================================

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Delete,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: Operation,
    path_prefix: String,
}

/// In-memory document store.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryDocuments>,
}

struct MemoryDocuments {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
    revision: watch::Sender<u64>,
    failures: Mutex<Vec<InjectedFailure>>,
    queries: AtomicUsize,
    next_id: AtomicU64,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemoryDocuments {
                collections: RwLock::new(BTreeMap::new()),
                revision,
                failures: Mutex::new(Vec::new()),
                queries: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl MemoryDocumentStore {
    /// Make every `operation` on paths starting with `path_prefix` fail.
    pub fn inject_failure(&self, operation: Operation, path_prefix: &str) {
        lock(&self.inner.failures).push(InjectedFailure {
            operation,
            path_prefix: path_prefix.to_owned(),
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        lock(&self.inner.failures).clear();
    }

    /// Number of queries executed so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Insert or replace a whole document without going through failure checks.
    pub fn seed(&self, path: &DocumentPath, fields: Fields) {
        self.inner.write_collection(path.parent(), |docs| {
            docs.insert(path.id().to_owned(), fields);
        });
    }

    /// Raw copy of a stored document, for assertions.
    #[must_use]
    pub fn raw(&self, path: &DocumentPath) -> Option<Fields> {
        self.inner.read_document(path)
    }

    fn check(&self, operation: Operation, path: &str) -> Result<(), PlatformError> {
        let failures = lock(&self.inner.failures);
        if failures
            .iter()
            .any(|f| f.operation == operation && path.starts_with(&f.path_prefix))
        {
            return Err(PlatformError::Unavailable(format!(
                "injected {operation:?} failure for {path}"
            )));
        }
        Ok(())
    }
}

impl MemoryDocuments {
    fn read_document(&self, path: &DocumentPath) -> Option<Fields> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .get(path.parent().as_str())
            .and_then(|docs| docs.get(path.id()))
            .cloned()
    }

    fn snapshot(&self, collection: &CollectionPath) -> Vec<Document> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .get(collection.as_str())
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn write_collection<R>(
        &self,
        collection: &CollectionPath,
        f: impl FnOnce(&mut BTreeMap<String, Fields>) -> R,
    ) -> R {
        let result = {
            let mut collections = self
                .collections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(collections.entry(collection.as_str().to_owned()).or_default())
        };
        self.revision.send_modify(|r| *r += 1);
        result
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering as O;
    match (a, b) {
        (None, None) => O::Equal,
        (None, Some(_)) => O::Less,
        (Some(_), None) => O::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(O::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, PlatformError> {
        self.check(Operation::Read, &path.to_string())?;
        Ok(self.inner.read_document(path).map(|fields| Document {
            id: path.id().to_owned(),
            fields,
        }))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, PlatformError> {
        self.check(Operation::Read, query.collection.as_str())?;
        self.inner.queries.fetch_add(1, Ordering::SeqCst);

        let mut docs: Vec<Document> = self
            .inner
            .snapshot(&query.collection)
            .into_iter()
            .filter(|doc| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| get_path(&doc.fields, field) == Some(value))
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            docs.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), PlatformError> {
        self.check(Operation::Write, &path.to_string())?;
        self.inner.write_collection(path.parent(), |docs| {
            if docs.contains_key(path.id()) {
                return Err(PlatformError::AlreadyExists(path.to_string()));
            }
            docs.insert(path.id().to_owned(), fields);
            Ok(())
        })
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentPath, PlatformError> {
        self.check(Operation::Write, collection.as_str())?;
        let id = format!(
            "{:08}-{}",
            self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            uuid::Uuid::new_v4().simple()
        );
        let path = collection.doc(&id);
        self.inner.write_collection(collection, |docs| {
            docs.insert(id, fields);
        });
        Ok(path)
    }

    async fn merge(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mask: &FieldMask,
    ) -> Result<(), PlatformError> {
        self.check(Operation::Write, &path.to_string())?;
        self.inner.write_collection(path.parent(), |docs| {
            let stored = docs.entry(path.id().to_owned()).or_default();
            apply_merge(stored, &fields, mask);
        });
        Ok(())
    }

    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        by: i64,
    ) -> Result<(), PlatformError> {
        self.check(Operation::Write, &path.to_string())?;
        self.inner.write_collection(path.parent(), |docs| {
            let stored = docs
                .get_mut(path.id())
                .ok_or_else(|| PlatformError::NotFound(path.to_string()))?;
            let current = stored.get(field).and_then(Value::as_i64).unwrap_or(0);
            stored.insert(field.to_owned(), Value::from(current + by));
            Ok(())
        })
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), PlatformError> {
        self.check(Operation::Delete, &path.to_string())?;
        self.inner.write_collection(path.parent(), |docs| {
            docs.remove(path.id());
        });
        Ok(())
    }

    fn subscribe(&self, collection: &CollectionPath) -> Subscription {
        let inner = Arc::clone(&self.inner);
        let collection = collection.clone();
        let mut revisions = inner.revision.subscribe();
        let (tx, rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Document>> = None;
            loop {
                let snapshot = inner.snapshot(&collection);
                if last.as_ref() != Some(&snapshot) {
                    if tx.send(Ok(snapshot.clone())).await.is_err() {
                        break;
                    }
                    last = Some(snapshot);
                }
                if revisions.changed().await.is_err() {
                    break;
                }
            }
        });

        Subscription::new(rx, task)
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    email: Email,
    password: String,
    display_name: Option<String>,
}

/// In-memory auth provider.
#[derive(Clone)]
pub struct MemoryAuth {
    inner: Arc<MemoryAuthInner>,
}

struct MemoryAuthInner {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<Option<AuthUser>>,
    rejections: Mutex<Vec<String>>,
    next_uid: AtomicU64,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(MemoryAuthInner {
                accounts: Mutex::new(HashMap::new()),
                state,
                rejections: Mutex::new(Vec::new()),
                next_uid: AtomicU64::new(1),
            }),
        }
    }
}

impl MemoryAuth {
    /// Fail the next provider call with the given provider error code
    /// (e.g. `"TOO_MANY_ATTEMPTS_TRY_LATER"`).
    pub fn reject_next(&self, code: &str) {
        lock(&self.inner.rejections).push(code.to_owned());
    }

    fn take_rejection(&self) -> Result<(), AuthError> {
        let mut rejections = lock(&self.inner.rejections);
        if rejections.is_empty() {
            return Ok(());
        }
        let code = rejections.remove(0);
        Err(AuthError::from_provider_code(&code))
    }

    fn key(email: &Email) -> String {
        email.as_str().to_lowercase()
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.inner.state.send_replace(user);
    }

    fn signed_in(&self) -> Result<AuthUser, AuthError> {
        self.inner
            .state
            .borrow()
            .clone()
            .ok_or(AuthError::NotSignedIn)
    }
}

impl From<&Account> for AuthUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        self.take_rejection()?;
        if password.expose_secret().len() < PROVIDER_MIN_PASSWORD {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {PROVIDER_MIN_PASSWORD} characters"
            )));
        }

        let user = {
            let mut accounts = lock(&self.inner.accounts);
            if accounts.contains_key(&Self::key(email)) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let uid = format!(
                "mem-uid-{}",
                self.inner.next_uid.fetch_add(1, Ordering::SeqCst)
            );
            let account = Account {
                id: UserId::parse(&uid).map_err(|e| AuthError::Provider(e.to_string()))?,
                email: email.clone(),
                password: password.expose_secret().to_owned(),
                display_name: None,
            };
            let user = AuthUser::from(&account);
            accounts.insert(Self::key(email), account);
            user
        };

        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        self.take_rejection()?;
        let user = {
            let accounts = lock(&self.inner.accounts);
            let account = accounts
                .get(&Self::key(email))
                .ok_or(AuthError::UserNotFound)?;
            if account.password != password.expose_secret() {
                return Err(AuthError::WrongPassword);
            }
            AuthUser::from(account)
        };
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.take_rejection()?;
        self.publish(None);
        Ok(())
    }

    async fn update_email(&self, email: &Email) -> Result<AuthUser, AuthError> {
        self.take_rejection()?;
        let current = self.signed_in()?;
        let user = {
            let mut accounts = lock(&self.inner.accounts);
            if Self::key(email) != Self::key(&current.email)
                && accounts.contains_key(&Self::key(email))
            {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let mut account = accounts
                .remove(&Self::key(&current.email))
                .ok_or(AuthError::UserNotFound)?;
            account.email = email.clone();
            let user = AuthUser::from(&account);
            accounts.insert(Self::key(email), account);
            user
        };
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn update_password(&self, password: &SecretString) -> Result<(), AuthError> {
        self.take_rejection()?;
        let current = self.signed_in()?;
        if password.expose_secret().len() < PROVIDER_MIN_PASSWORD {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {PROVIDER_MIN_PASSWORD} characters"
            )));
        }
        let mut accounts = lock(&self.inner.accounts);
        let account = accounts
            .get_mut(&Self::key(&current.email))
            .ok_or(AuthError::UserNotFound)?;
        password.expose_secret().clone_into(&mut account.password);
        Ok(())
    }

    async fn delete_account(&self) -> Result<(), AuthError> {
        self.take_rejection()?;
        let current = self.signed_in()?;
        lock(&self.inner.accounts)
            .remove(&Self::key(&current.email))
            .ok_or(AuthError::UserNotFound)?;
        self.publish(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.inner.state.borrow().clone()
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.state.subscribe()
    }
}

// =============================================================================
// Object storage
// =============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    generation: u64,
}

/// In-memory object storage.
#[derive(Clone)]
pub struct MemoryObjectStorage {
    inner: Arc<MemoryStorageInner>,
}

struct MemoryStorageInner {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
    generation: AtomicU64,
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self {
            inner: Arc::new(MemoryStorageInner {
                bucket: "bukka-memory".to_owned(),
                objects: Mutex::new(HashMap::new()),
                fail_uploads: AtomicBool::new(false),
                generation: AtomicU64::new(1),
            }),
        }
    }
}

impl MemoryObjectStorage {
    /// Make uploads fail (or succeed again).
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Stored bytes and content type, for assertions.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        lock(&self.inner.objects)
            .get(key)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.inner.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload {
                key: key.to_owned(),
                message: "injected upload failure".to_owned(),
            });
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.objects).insert(
            key.to_owned(),
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
                generation,
            },
        );
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<Url, StorageError> {
        let generation = lock(&self.inner.objects)
            .get(key)
            .map(|o| o.generation)
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))?;
        Ok(Url::parse(&format!(
            "memory://{}/{}?generation={generation}",
            self.inner.bucket,
            urlencoding::encode(key)
        ))?)
    }
}
