use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never leaves the identity services
    pub is_verified: bool,
    pub verification_code: Option<String>, // cleared once consumed
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub profile_image_content_id: Option<String>,
}

/// Insert payload; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: String,
}
