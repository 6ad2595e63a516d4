//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use virzufurn_assets::{uploader_from_config, AssetUploader};
use virzufurn_core::config::AppConfig;
use virzufurn_core::{InMemoryStore, PgStore, ProductStore, UserStore};

use crate::auth::{AccountService, JwtConfig, PasswordConfig, TokenAuthority};

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub uploader: Arc<dyn AssetUploader>,
    pub authority: TokenAuthority,
    pub accounts: AccountService,
    /// "postgres" or "memory"
    pub storage_backend: &'static str,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Wire services over the given collaborators
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        products: Arc<dyn ProductStore>,
        uploader: Arc<dyn AssetUploader>,
    ) -> Self {
        let authority = TokenAuthority::new(JwtConfig::from(&config.auth), users.clone());
        let accounts = AccountService::new(
            users.clone(),
            authority.clone(),
            PasswordConfig::from(&config.auth),
        );

        Self {
            config,
            users,
            products,
            uploader,
            authority,
            accounts,
            storage_backend: "memory",
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// State backed by the in-memory store
    pub fn in_memory(config: AppConfig, uploader: Arc<dyn AssetUploader>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(config, store.clone(), store, uploader)
    }

    /// Build state from configuration: PostgreSQL when `database.url` is
    /// set, otherwise the in-memory store.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let uploader = uploader_from_config(&config.assets)?;

        match config.database.url.clone() {
            Some(url) => {
                let store = PgStore::new(&url, config.database.max_connections).await?;
                store.ensure_schema().await?;
                tracing::info!("Connected to PostgreSQL");

                let store = Arc::new(store);
                let mut state = Self::new(config, store.clone(), store, uploader);
                state.storage_backend = "postgres";
                Ok(state)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
                Ok(Self::in_memory(config, uploader))
            }
        }
    }

    /// Cookies get the `Secure` flag only in production
    pub fn secure_cookies(&self) -> bool {
        self.config.server.environment.is_production()
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
