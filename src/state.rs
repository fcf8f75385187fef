use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserRepository, UserRepository};
use crate::config::AppConfig;
use crate::mail::{notifier_from_config, Notifier};
use crate::photos::content_locks::ContentLocks;
use crate::photos::repo::{PgPhotoRepository, PhotoRepository};
use crate::storage::{BlobStore, PinataStorage};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn Notifier>,
    pub content: Arc<ContentLocks>,
}

impl AppState {
    pub fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let blobs = Arc::new(PinataStorage::new(&config.pinata)?) as Arc<dyn BlobStore>;
        let notifier = notifier_from_config(&config.mail)?;
        if config.mail.sendgrid_api_key.is_none() {
            tracing::warn!("SENDGRID_API_KEY not set; verification codes go to the log");
        }

        Ok(Self {
            jwt: JwtKeys::new(&config.jwt),
            users: Arc::new(PgUserRepository::new(db.clone())),
            photos: Arc::new(PgPhotoRepository::new(db)),
            blobs,
            notifier,
            content: Arc::default(),
            config: Arc::new(config),
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepository>,
        photos: Arc<dyn PhotoRepository>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            config,
            users,
            photos,
            blobs,
            notifier,
            content: Arc::default(),
        }
    }
}
