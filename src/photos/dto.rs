use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Photo;
use crate::storage::BlobStore;

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub content_id: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PhotoResponse {
    pub fn new(photo: Photo, blobs: &dyn BlobStore) -> Self {
        Self {
            url: blobs.public_url(&photo.content_id),
            id: photo.id,
            owner_id: photo.owner_id,
            filename: photo.filename,
            content_id: photo.content_id,
            created_at: photo.created_at,
            updated_at: photo.updated_at,
        }
    }

    pub fn many(photos: Vec<Photo>, blobs: &dyn BlobStore) -> Vec<Self> {
        photos.into_iter().map(|p| Self::new(p, blobs)).collect()
    }
}

/// What anyone may see about an account: no email, no verification state.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub profile_image_content_id: Option<String>,
    pub profile_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub photos: Vec<PhotoResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
