//! Application state shared by every front end.

use std::sync::Arc;

use bukka_core::UserId;

use crate::cart::CartManager;
use crate::catalog::CatalogReader;
use crate::config::{ClientSettings, StorefrontConfig};
use crate::platform::{AuthUser, Platform};
use crate::profile::ProfileStore;
use crate::services::auth::AuthService;

/// Application state.
///
/// This struct is cheaply cloneable via `Arc` and gives access to the
/// catalog, cart, profile and auth services over one platform.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: ClientSettings,
    platform: Platform,
    auth: AuthService,
    catalog: CatalogReader,
    cart: CartManager,
    profile: ProfileStore,
}

impl AppState {
    /// Wire the services over a platform.
    #[must_use]
    pub fn new(platform: Platform, settings: ClientSettings) -> Self {
        let auth = AuthService::new(
            Arc::clone(&platform.auth),
            Arc::clone(&platform.documents),
        );
        let catalog = CatalogReader::new(Arc::clone(&platform.documents), &settings);
        let cart = CartManager::new(
            Arc::clone(&platform.documents),
            Arc::clone(&platform.auth),
            settings.currency,
        );
        let profile = ProfileStore::new(
            Arc::clone(&platform.documents),
            Arc::clone(&platform.auth),
            Arc::clone(&platform.storage),
        );

        Self {
            inner: Arc::new(AppStateInner {
                settings,
                platform,
                auth,
                catalog,
                cart,
                profile,
            }),
        }
    }

    /// State over the hosted platform described by `config`.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self::new(Platform::firebase(&config.firebase), config.client.clone())
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.inner.platform
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogReader {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileStore {
        &self.inner.profile
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.auth.current_user()
    }

    /// Id of the signed-in user, if any.
    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.current_user().map(|u| u.id)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}
