use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};
use crate::error::StoreError;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_verified, verification_code, \
                            created_at, updated_at, profile_image_content_id";

/// Credential store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    /// Flips `is_verified` and clears the code, but only while the account is
    /// unverified and `code` still matches. `NotFound` otherwise.
    async fn set_verified(&self, id: Uuid, code: &str) -> Result<User, StoreError>;
    async fn set_profile_image(&self, id: Uuid, content_id: &str) -> Result<(), StoreError>;
    /// Drops the profile photo reference if it still points at `content_id`.
    async fn clear_profile_image(&self, id: Uuid, content_id: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, is_verified, verification_code)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.verification_code)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
                other => StoreError::Database(other),
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn set_verified(&self, id: Uuid, code: &str) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET is_verified = TRUE, verification_code = NULL, updated_at = now()
             WHERE id = $1 AND is_verified = FALSE AND verification_code = $2
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(code)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn set_profile_image(&self, id: Uuid, content_id: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET profile_image_content_id = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(content_id)
        .execute(&self.db)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_profile_image(&self, id: Uuid, content_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET profile_image_content_id = NULL, updated_at = now()
             WHERE id = $1 AND profile_image_content_id = $2
            "#,
        )
        .bind(id)
        .bind(content_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
