//! Catalog reader.
//!
//! Lists menu items by category and runs debounced name searches. The full
//! menu is fetched once and cached for the lifetime of the reader; category
//! listings read the store directly.
//!
//! Reads never fail from the caller's point of view: store errors are logged
//! and the caller sees an empty list.

mod cache;
mod debounce;

pub use cache::{CatalogKey, CatalogValue};
pub use debounce::{Debouncer, Ticket};

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, info, instrument, warn};

use bukka_core::{Category, CurrencyCode, ItemId};

use crate::config::ClientSettings;
use crate::models::{FoodItem, FoodItemRecord};
use crate::platform::{CollectionPath, Document, DocumentStore, FieldMask, PlatformError, Query};

/// Menu collection.
pub const FOOD_ITEMS: &str = "food-items";

/// Result of a debounced search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The search ran to completion and is still the latest input.
    Results(Vec<FoodItem>),
    /// A newer search was started; these results are discarded.
    Superseded,
}

impl SearchOutcome {
    /// The results, if this search was not superseded.
    #[must_use]
    pub fn into_results(self) -> Option<Vec<FoodItem>> {
        match self {
            Self::Results(items) => Some(items),
            Self::Superseded => None,
        }
    }
}

/// Read-only access to the menu.
#[derive(Clone)]
pub struct CatalogReader {
    inner: Arc<CatalogReaderInner>,
}

struct CatalogReaderInner {
    documents: Arc<dyn DocumentStore>,
    currency: CurrencyCode,
    cache: Cache<CatalogKey, CatalogValue>,
    debouncer: Debouncer,
}

impl CatalogReader {
    /// Create a catalog reader.
    ///
    /// The cache has no expiry; it lives as long as the reader.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, settings: &ClientSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.catalog_cache_capacity)
            .build();

        Self {
            inner: Arc::new(CatalogReaderInner {
                documents,
                currency: settings.currency,
                cache,
                debouncer: Debouncer::new(settings.search_debounce),
            }),
        }
    }

    fn collection() -> CollectionPath {
        CollectionPath::root(FOOD_ITEMS)
    }

    fn decode_all(&self, docs: &[Document]) -> Vec<FoodItem> {
        docs.iter()
            .filter_map(|doc| match FoodItem::from_document(doc, self.inner.currency) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(item_id = %doc.id, error = %e, "Skipping malformed menu item");
                    None
                }
            })
            .collect()
    }

    /// Items in a category. An unknown category has no items.
    #[instrument(skip(self), fields(category = %category))]
    pub async fn list_by_category(&self, category: &Category) -> Vec<FoodItem> {
        let query = Query::collection(Self::collection()).where_eq("Category", category.as_str());

        match self.inner.documents.query(&query).await {
            Ok(docs) => self.decode_all(&docs),
            Err(e) => {
                warn!(error = %e, "Failed to list menu category");
                Vec::new()
            }
        }
    }

    /// The whole menu, fetched once and then served from cache.
    ///
    /// Concurrent callers on a cold cache share one fetch. Failed fetches are
    /// not cached.
    ///
    /// # Errors
    ///
    /// Returns the store error if the menu has not been cached and cannot be read.
    pub async fn full_catalog(&self) -> Result<CatalogValue, Arc<PlatformError>> {
        self.inner
            .cache
            .try_get_with(CatalogKey::FullMenu, self.fetch_menu())
            .await
    }

    async fn fetch_menu(&self) -> Result<CatalogValue, PlatformError> {
        let docs = self
            .inner
            .documents
            .query(&Query::collection(Self::collection()))
            .await?;
        let menu = Arc::new(self.decode_all(&docs));
        debug!(items = menu.len(), "Fetched full menu");
        Ok(menu)
    }

    /// Case-insensitive name search, optionally within one category.
    ///
    /// Runs immediately. A blank term matches nothing.
    #[instrument(skip(self))]
    pub async fn search_now(&self, term: &str, category: Option<&Category>) -> Vec<FoodItem> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let menu = match self.full_catalog().await {
            Ok(menu) => menu,
            Err(e) => {
                warn!(error = %e, "Failed to load menu for search");
                return Vec::new();
            }
        };

        menu.iter()
            .filter(|item| item.name_contains(&needle))
            .filter(|item| category.is_none_or(|c| &item.category == c))
            .cloned()
            .collect()
    }

    /// Debounced search.
    ///
    /// Waits for the quiet period. If another search starts in the meantime,
    /// or while this one is reading the menu, this one is superseded.
    pub async fn search(&self, term: &str, category: Option<&Category>) -> SearchOutcome {
        let debouncer = &self.inner.debouncer;
        let ticket = debouncer.issue();
        if !debouncer.settle(ticket).await {
            return SearchOutcome::Superseded;
        }

        let results = self.search_now(term, category).await;
        if debouncer.is_current(ticket) {
            SearchOutcome::Results(results)
        } else {
            SearchOutcome::Superseded
        }
    }

    /// Look up one item by id.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails or the document is malformed.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn find_item(&self, id: &ItemId) -> Result<Option<FoodItem>, PlatformError> {
        let doc = self
            .inner
            .documents
            .get(&Self::collection().doc(id.as_str()))
            .await?;
        doc.map(|d| FoodItem::from_document(&d, self.inner.currency))
            .transpose()
    }

    /// Write menu items, replacing the fields of existing items with the same id.
    ///
    /// Clears the cached menu afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first store error; items before it stay written.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn seed(&self, items: &[(ItemId, FoodItemRecord)]) -> Result<usize, PlatformError> {
        for (id, record) in items {
            let fields = record.to_fields()?;
            let mask = FieldMask::leaves(&fields);
            self.inner
                .documents
                .merge(&Self::collection().doc(id.as_str()), fields, &mask)
                .await?;
        }
        self.invalidate_all().await;

        info!(count = items.len(), "Menu seeded");
        Ok(items.len())
    }

    /// Drop every cached menu snapshot.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for CatalogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogReader")
            .field("currency", &self.inner.currency)
            .finish_non_exhaustive()
    }
}
