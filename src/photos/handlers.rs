use axum::{
    extract::{
        multipart::MultipartError, rejection::PathRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{MessageResponse, PhotoResponse, PublicProfile},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

/// Per-request cap on upload bodies.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/photos", post(upload_photo).get(list_photos))
        .route("/photos/:photo_id", post(set_profile_picture).delete(delete_photo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/public/photos", get(list_public_photos))
        .route("/public/users/:user_id", get(public_profile))
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::validation("malformed id"))
}

/// Parser detail stays in the log.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("upload over size limit");
        return AppError::PayloadTooLarge("file exceeds the 10 MiB limit".into());
    }
    debug!(error = %e, "unreadable multipart body");
    AppError::validation("invalid multipart body")
}

/// POST /photos (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<PhotoResponse>)> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        warn!(%user_id, "upload without file field");
        return Err(AppError::validation("file is required"));
    };
    if data.is_empty() {
        return Err(AppError::validation("file is empty"));
    }

    let photo = services::upload_photo(&state, user_id, &filename, data).await?;
    Ok((
        StatusCode::CREATED,
        Json(PhotoResponse::new(photo, state.blobs.as_ref())),
    ))
}

#[instrument(skip(state))]
pub async fn list_photos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<PhotoResponse>>> {
    let photos = services::list_photos(&state, user_id).await?;
    Ok(Json(PhotoResponse::many(photos, state.blobs.as_ref())))
}

#[instrument(skip(state, photo_id))]
pub async fn delete_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    photo_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let photo_id = path_id(photo_id)?;
    services::delete_photo(&state, user_id, photo_id).await?;
    Ok(Json(MessageResponse {
        message: "photo deleted",
    }))
}

#[instrument(skip(state, photo_id))]
pub async fn set_profile_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    photo_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let photo_id = path_id(photo_id)?;
    services::set_profile_picture(&state, user_id, photo_id).await?;
    Ok(Json(MessageResponse {
        message: "profile photo set",
    }))
}

#[instrument(skip(state))]
pub async fn list_public_photos(State(state): State<AppState>) -> AppResult<Json<Vec<PhotoResponse>>> {
    let photos = services::list_public_photos(&state).await?;
    Ok(Json(PhotoResponse::many(photos, state.blobs.as_ref())))
}

#[instrument(skip(state, user_id))]
pub async fn public_profile(
    State(state): State<AppState>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<PublicProfile>> {
    let user_id = path_id(user_id)?;
    let (user, photos) = services::public_profile(&state, user_id).await?;
    let blobs = state.blobs.as_ref();
    Ok(Json(PublicProfile {
        id: user.id,
        username: user.username,
        profile_image_url: user
            .profile_image_content_id
            .as_deref()
            .map(|cid| blobs.public_url(cid)),
        profile_image_content_id: user.profile_image_content_id,
        created_at: user.created_at,
        photos: PhotoResponse::many(photos, blobs),
    }))
}
