use bytes::Bytes;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    dto::ImageResponse,
    fetch::ImageFetcher,
    metadata::derive_metadata,
    repo,
    repo_types::{Image, MetadataStatus},
    validation::{ext_from_mime, validate_upload},
};
use crate::{
    common::{
        pagination::{PageQuery, Paged},
        AppError,
    },
    state::AppState,
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: Option<String>,
}

fn image_not_found() -> AppError {
    AppError::NotFound("Image not found.".into())
}

/// Validates, stores the binary, and records the image. Metadata is derived
/// afterwards by the enrichment queue.
pub async fn upload(
    st: &AppState,
    item: UploadItem,
    owner_id: Option<Uuid>,
) -> Result<Image, AppError> {
    validate_upload(item.content_type.as_deref(), item.body.len()).map_err(|e| {
        warn!(content_type = ?item.content_type, size = item.body.len(), "upload rejected");
        e
    })?;
    let content_type = item.content_type.unwrap_or_default();
    let ext = ext_from_mime(&content_type).unwrap_or("bin");

    let id = Uuid::new_v4();
    let key = format!("images/{}.{}", id, ext);
    let url = st
        .storage
        .put_object(&key, item.body, &content_type)
        .await
        .map_err(|e| e.context(format!("put_object {}", key)))?;

    let image = match repo::insert_image(&st.db, id, owner_id, &key, &url).await {
        Ok(image) => image,
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&key).await {
                error!(error = %cleanup, %key, "orphaned object after failed insert");
            }
            return Err(e.into());
        }
    };

    info!(image_id = %image.id, owner_id = ?owner_id, %key, "image uploaded");
    st.metadata_queue.enqueue(image.id);
    Ok(image)
}

async fn fetch_and_derive(
    fetcher: &dyn ImageFetcher,
    url: &str,
) -> Result<super::metadata::DerivedMetadata, AppError> {
    let data = fetcher
        .fetch(url)
        .await
        .map_err(|e| AppError::Processing(format!("Failed to fetch image: {:#}", e)))?;
    derive_metadata(&data)
}

/// Derives format, dimensions and size from the stored binary. A row whose
/// derived fields are all set is returned as-is without fetching.
pub async fn finalize_metadata(
    db: &PgPool,
    fetcher: &dyn ImageFetcher,
    image_id: Uuid,
) -> Result<Image, AppError> {
    let image = repo::find_by_id(db, image_id)
        .await?
        .ok_or_else(image_not_found)?;
    if image.is_finalized() {
        debug!(%image_id, "metadata already present");
        return Ok(image);
    }

    repo::set_status(db, image_id, MetadataStatus::Pending).await?;
    let derived = match fetch_and_derive(fetcher, &image.image_url).await {
        Ok(d) => d,
        Err(e) => {
            repo::set_status(db, image_id, MetadataStatus::Failed).await?;
            warn!(%image_id, error = %e, "metadata finalization failed");
            return Err(e);
        }
    };

    repo::store_metadata(db, image_id, &derived)
        .await?
        .ok_or_else(image_not_found)
}

pub async fn get_image(st: &AppState, image_id: Uuid) -> Result<Image, AppError> {
    repo::find_by_id(&st.db, image_id)
        .await?
        .ok_or_else(image_not_found)
}

pub async fn list_images(
    st: &AppState,
    query: &PageQuery,
) -> Result<Paged<ImageResponse>, AppError> {
    let count = repo::count(&st.db).await?;
    let page = query.resolve(count)?;
    let rows = repo::list(&st.db, page.limit(), page.offset()).await?;
    Ok(Paged::new(
        "/images",
        page,
        count,
        rows.into_iter().map(ImageResponse::from).collect(),
    ))
}

/// Removes the row, then the stored object. An owned image can only be
/// deleted by its owner.
pub async fn delete_image(
    st: &AppState,
    image_id: Uuid,
    caller: Option<Uuid>,
) -> Result<(), AppError> {
    let image = get_image(st, image_id).await?;
    if let Some(owner) = image.owner_id {
        if caller != Some(owner) {
            warn!(%image_id, ?caller, "delete of image owned by someone else");
            return Err(AppError::Forbidden);
        }
    }

    let removed = repo::delete_image(&st.db, image_id)
        .await?
        .ok_or_else(image_not_found)?;
    if let Err(e) = st.storage.delete_object(&removed.storage_key).await {
        warn!(error = %e, key = %removed.storage_key, "failed to delete stored object");
    }
    info!(%image_id, "image deleted");
    Ok(())
}
