use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Photo metadata row. The bytes live in the blob service under `content_id`.
#[derive(Debug, Clone, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub content_id: String,
    pub filename: String,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub owner_id: Uuid,
    pub content_id: String,
    pub filename: String,
}
