use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewPhoto, Photo};
use crate::error::StoreError;

/// Photo metadata store. Single-row statements only; atomicity of each call
/// comes from the database.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn create(&self, photo: NewPhoto) -> Result<Photo, StoreError>;
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Photo>, StoreError>;
    async fn find_all(&self) -> Result<Vec<Photo>, StoreError>;
    /// How many rows, across all owners, point at `content_id`.
    async fn count_by_content_id(&self, content_id: &str) -> Result<i64, StoreError>;
    /// `NotFound` when no row was deleted.
    async fn delete(&self, owner_id: Uuid, photo_id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgPhotoRepository {
    db: PgPool,
}

impl PgPhotoRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    async fn create(&self, photo: NewPhoto) -> Result<Photo, StoreError> {
        let row = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (content_id, filename, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, content_id, filename, owner_id, created_at, updated_at
            "#,
        )
        .bind(&photo.content_id)
        .bind(&photo.filename)
        .bind(photo.owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Photo>, StoreError> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, content_id, filename, owner_id, created_at, updated_at
              FROM photos
             WHERE owner_id = $1
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_all(&self) -> Result<Vec<Photo>, StoreError> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, content_id, filename, owner_id, created_at, updated_at
              FROM photos
             ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_by_content_id(&self, content_id: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos WHERE content_id = $1")
            .bind(content_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn delete(&self, owner_id: Uuid, photo_id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM photos WHERE id = $1 AND owner_id = $2")
            .bind(photo_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
