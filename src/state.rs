use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::storage::{BlobStore, LocalStorage};
use crate::users::repo::{MemoryStore, PgStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub storage: Arc<dyn BlobStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgStore::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory user store");
                Arc::new(MemoryStore::default())
            }
        };

        let storage = Arc::new(LocalStorage::new(&config.upload_dir));
        storage.ensure_root().await?;

        Ok(Self {
            store,
            storage,
            config,
        })
    }

    pub fn from_parts(
        store: Arc<dyn UserStore>,
        storage: Arc<dyn BlobStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    pub fn fake() -> Self {
        use async_trait::async_trait;
        use bytes::Bytes;

        #[derive(Clone)]
        struct NullStorage;
        #[async_trait]
        impl BlobStore for NullStorage {
            async fn put_object(&self, _n: &str, _b: Bytes) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete_object(&self, _n: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        Self {
            store: Arc::new(MemoryStore::default()),
            storage: Arc::new(NullStorage),
            config: Arc::new(test_config()),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        auth: crate::config::AuthConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        },
        upload_dir: "uploads/avatars".into(),
        public_base_url: "http://localhost:8080".into(),
    }
}
