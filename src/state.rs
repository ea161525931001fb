use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::categories::repo::{CategoryStore, PgCategoryStore};
use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer};
use crate::memory::{MemoryCategoryStore, MemoryPetStore, MemoryUserStore};
use crate::pets::repo::{PetStore, PgPetStore};
use crate::storage::{MemoryStorage, Storage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub categories: Arc<dyn CategoryStore>,
    pub pets: Arc<dyn PetStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, categories, pets): (
            Arc<dyn UserStore>,
            Arc<dyn CategoryStore>,
            Arc<dyn PetStore>,
        ) = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("using postgres stores");
                (
                    Arc::new(PgUserStore::new(db.clone())),
                    Arc::new(PgCategoryStore::new(db.clone())),
                    Arc::new(PgPetStore::new(db)),
                )
            }
            None => {
                warn!("DATABASE_URL not set; data lives in memory and is lost on exit");
                (
                    Arc::new(MemoryUserStore::default()),
                    Arc::new(MemoryCategoryStore::default()),
                    Arc::new(MemoryPetStore::default()),
                )
            }
        };

        let storage: Arc<dyn StorageClient> = match &config.s3 {
            Some(s3) => Arc::new(Storage::new(s3).await?),
            None => {
                warn!("MINIO_* not set; images are kept in memory");
                Arc::new(MemoryStorage::new())
            }
        };

        Ok(Self {
            config,
            users,
            categories,
            pets,
            storage,
            mailer: Arc::new(LogMailer),
        })
    }

    /// Fully in-memory state for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, MailConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            s3: None,
            mail: MailConfig {
                from: "no-reply@test.local".into(),
                reset_link_base: "http://test.local".into(),
            },
            reset_token_ttl_minutes: 60,
            page_limit_max: 100,
        });

        Self {
            config,
            users: Arc::new(MemoryUserStore::default()),
            categories: Arc::new(MemoryCategoryStore::default()),
            pets: Arc::new(MemoryPetStore::default()),
            storage: Arc::new(MemoryStorage::new()),
            mailer: Arc::new(LogMailer),
        }
    }
}
