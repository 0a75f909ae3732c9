use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    metadata::DerivedMetadata,
    repo_types::{Image, MetadataStatus},
};

const IMAGE_COLUMNS: &str = "id, owner_id, storage_key, image_url, original_format, \
                             width, height, size_bytes, metadata_status, created_at";

/// Insert a freshly uploaded image; derived fields start out NULL.
pub async fn insert_image(
    db: &PgPool,
    id: Uuid,
    owner_id: Option<Uuid>,
    storage_key: &str,
    image_url: &str,
) -> anyhow::Result<Image> {
    let image = sqlx::query_as::<_, Image>(&format!(
        r#"
        INSERT INTO images (id, owner_id, storage_key, image_url, metadata_status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {IMAGE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(owner_id) // Option<Uuid> → NULL allowed
    .bind(storage_key)
    .bind(image_url)
    .bind(MetadataStatus::Created.as_str())
    .fetch_one(db)
    .await
    .context("insert image")?;
    Ok(image)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Image>> {
    let row = sqlx::query_as::<_, Image>(&format!(
        "SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get image by id")?;
    Ok(row)
}

pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
        .fetch_one(db)
        .await
        .context("count images")?;
    Ok(n)
}

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Image>> {
    let rows = sqlx::query_as::<_, Image>(&format!(
        r#"
        SELECT {IMAGE_COLUMNS}
          FROM images
         ORDER BY created_at ASC, id ASC
         LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list images")?;
    Ok(rows)
}

/// Deletes the row and hands back what was removed.
pub async fn delete_image(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Image>> {
    let row = sqlx::query_as::<_, Image>(&format!(
        "DELETE FROM images WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("delete image")?;
    Ok(row)
}

/// Moves a row to `status` unless it is already finalized, which is terminal.
pub async fn set_status(db: &PgPool, id: Uuid, status: MetadataStatus) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE images SET metadata_status = $2 WHERE id = $1 AND metadata_status <> $3",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(MetadataStatus::Finalized.as_str())
    .execute(db)
    .await
    .context("set image metadata status")?;
    Ok(())
}

/// Writes derived fields that are still NULL and marks the row finalized.
/// Fields that already hold a value are left untouched.
pub async fn store_metadata(
    db: &PgPool,
    id: Uuid,
    meta: &DerivedMetadata,
) -> anyhow::Result<Option<Image>> {
    let row = sqlx::query_as::<_, Image>(&format!(
        r#"
        UPDATE images
           SET original_format = COALESCE(original_format, $2),
               width           = COALESCE(width, $3),
               height          = COALESCE(height, $4),
               size_bytes      = COALESCE(size_bytes, $5),
               metadata_status = $6
         WHERE id = $1
        RETURNING {IMAGE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&meta.format)
    .bind(meta.width)
    .bind(meta.height)
    .bind(meta.size_bytes)
    .bind(MetadataStatus::Finalized.as_str())
    .fetch_optional(db)
    .await
    .context("store image metadata")?;
    Ok(row)
}

/// Images whose enrichment never completed (e.g. the process stopped mid-way).
pub async fn list_unfinished_ids(db: &PgPool) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id
          FROM images
         WHERE metadata_status IN ($1, $2)
         ORDER BY created_at ASC
        "#,
    )
    .bind(MetadataStatus::Created.as_str())
    .bind(MetadataStatus::Pending.as_str())
    .fetch_all(db)
    .await
    .context("list unfinished images")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
