use bytes::Bytes;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::repo_types::{NewPhoto, Photo};
use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult, StoreError},
    state::AppState,
    storage::Unpinned,
};

const MAX_FILENAME_LEN: usize = 255;

/// Strips client-side directories from the uploaded name. Descriptive only.
fn clean_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() {
        return "upload".to_string();
    }
    base.chars().take(MAX_FILENAME_LEN).collect()
}

/// Blob first, metadata second. If the row cannot be written the blob stays
/// pinned but unreferenced; a row never points at a blob that was not stored.
///
/// The row is written under the content id's lock. Identical bytes share a
/// content id, so a delete of someone else's copy may have unpinned the blob
/// between our `put` and the lock; in that case it is pinned again first.
pub async fn upload_photo(st: &AppState, owner_id: Uuid, filename: &str, body: Bytes) -> AppResult<Photo> {
    let filename = clean_filename(filename);
    let size = body.len();

    let ticket = st.content.begin_upload();
    let content_id = st
        .blobs
        .put(&filename, body.clone())
        .await
        .map_err(|e| AppError::ExternalService(e.context("pin photo")))?;

    let _guard = st.content.lock(&content_id).await;
    if ticket.unpinned_since_start(&content_id) {
        info!(cid = %content_id, "content unpinned during upload; pinning again");
        let again = st
            .blobs
            .put(&filename, body)
            .await
            .map_err(|e| AppError::ExternalService(e.context("re-pin photo")))?;
        if again != content_id {
            return Err(AppError::Internal(anyhow::anyhow!(
                "blob service returned {again} for content pinned as {content_id}"
            )));
        }
    }

    let photo = st
        .photos
        .create(NewPhoto {
            owner_id,
            content_id: content_id.clone(),
            filename,
        })
        .await
        .map_err(|e| {
            warn!(%owner_id, cid = %content_id, "photo row not recorded; blob left unreferenced");
            e.during("record photo")
        })?;

    info!(%owner_id, photo_id = %photo.id, cid = %photo.content_id, size, "photo uploaded");
    Ok(photo)
}

pub async fn list_photos(st: &AppState, owner_id: Uuid) -> AppResult<Vec<Photo>> {
    st.photos
        .find_by_owner(owner_id)
        .await
        .map_err(|e| e.during("list photos"))
}

/// The lookup is scoped to the caller, so another user's photo and a missing
/// one are the same `NotFound`.
async fn find_owned(st: &AppState, owner_id: Uuid, photo_id: Uuid) -> AppResult<(Photo, Vec<Photo>)> {
    let owned = list_photos(st, owner_id).await?;
    let photo = owned
        .iter()
        .find(|p| p.id == photo_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("photo not found"))?;
    Ok((photo, owned))
}

/// Blob first, then the profile reference, then the row. Nothing the caller
/// can see changes unless the unpin succeeded. A failure after the unpin
/// leaves a row whose blob is gone; the caller retries the delete and the
/// second unpin reports `AlreadyAbsent`.
pub async fn delete_photo(st: &AppState, owner_id: Uuid, photo_id: Uuid) -> AppResult<()> {
    let (photo, owned) = find_owned(st, owner_id, photo_id).await?;
    let cid = photo.content_id.as_str();

    let _guard = st.content.lock(cid).await;
    let references = st
        .photos
        .count_by_content_id(cid)
        .await
        .map_err(|e| e.during("count content references"))?;

    if references <= 1 {
        let unpinned = st.blobs.unpin(cid).await;
        st.content.record_unpin(cid);
        match unpinned {
            Ok(Unpinned::Removed) => debug!(%cid, "blob unpinned"),
            Ok(Unpinned::AlreadyAbsent) => info!(%cid, "blob was already unpinned"),
            Err(e) => {
                return Err(AppError::ExternalService(
                    e.context(format!("unpin content {cid}")),
                ))
            }
        }
    } else {
        debug!(%cid, references, "content shared by other photos; blob kept");
    }

    let owner_keeps_content = owned.iter().any(|p| p.id != photo.id && p.content_id == cid);
    if !owner_keeps_content {
        st.users
            .clear_profile_image(owner_id, cid)
            .await
            .map_err(|e| e.during("clear profile photo"))?;
    }

    st.photos.delete(owner_id, photo_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("photo not found"),
        other => {
            error!(%owner_id, %photo_id, %cid, "blob unpinned but photo row remains");
            other.during("delete photo record")
        }
    })?;

    info!(%owner_id, %photo_id, "photo deleted");
    Ok(())
}

pub async fn set_profile_picture(st: &AppState, owner_id: Uuid, photo_id: Uuid) -> AppResult<()> {
    let (photo, _) = find_owned(st, owner_id, photo_id).await?;

    st.users
        .set_profile_image(owner_id, &photo.content_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::unauthorized("user not found"),
            other => other.during("set profile photo"),
        })?;

    info!(%owner_id, %photo_id, "profile photo set");
    Ok(())
}

pub async fn list_public_photos(st: &AppState) -> AppResult<Vec<Photo>> {
    st.photos
        .find_all()
        .await
        .map_err(|e| e.during("list all photos"))
}

pub async fn public_profile(st: &AppState, user_id: Uuid) -> AppResult<(User, Vec<Photo>)> {
    let user = st.users.find_by_id(user_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("user not found"),
        other => other.during("find user by id"),
    })?;
    let photos = list_photos(st, user.id).await?;
    Ok((user, photos))
}
