use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::ImageResponse,
    services::{self, UploadItem},
    validation::MAX_UPLOAD_BYTES,
};
use crate::{
    auth::extractors::MaybeAuthUser,
    common::{
        pagination::{PageQuery, Paged},
        AppError,
    },
    state::AppState,
};

/// Multipart field carrying the file.
const FILE_FIELD: &str = "original";

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/:id", get(get_image).delete(delete_image))
        .route("/images/:id/finalize", post(finalize_image))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/upload-image", post(upload_image))
        // headroom over the 5 MiB policy so oversize files get a validation error, not a 413
        .layer(DefaultBodyLimit::max(2 * MAX_UPLOAD_BYTES))
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::invalid_field(FILE_FIELD, e.body_text())
}

/// POST /upload-image (multipart), field `original`. Bearer auth optional.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    MaybeAuthUser(owner_id): MaybeAuthUser,
    mut mp: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut item = None;
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let body = field.bytes().await.map_err(bad_multipart)?;
        item = Some(UploadItem { body, content_type });
        break;
    }
    let item = item.ok_or_else(|| AppError::invalid_field(FILE_FIELD, "No file was submitted."))?;

    let image = services::upload(&state, item, owner_id).await?;
    Ok((StatusCode::CREATED, Json(ImageResponse::from(image))))
}

#[instrument(skip(state))]
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paged<ImageResponse>>, AppError> {
    Ok(Json(services::list_images(&state, &query).await?))
}

#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageResponse>, AppError> {
    let image = services::get_image(&state, id).await?;
    Ok(Json(ImageResponse::from(image)))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_image(&state, id, caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs metadata derivation inline; fetch/decode failures come back as 400.
#[instrument(skip(state))]
pub async fn finalize_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageResponse>, AppError> {
    let image = services::finalize_metadata(&state.db, state.fetcher.as_ref(), id).await?;
    Ok(Json(ImageResponse::from(image)))
}
