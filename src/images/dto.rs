use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Image;

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub image_url: String,
    pub original_format: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub size_bytes: Option<i64>,
    pub metadata_status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Image> for ImageResponse {
    fn from(img: Image) -> Self {
        Self {
            image_id: img.id,
            owner_id: img.owner_id,
            image_url: img.image_url,
            original_format: img.original_format,
            width: img.width,
            height: img.height,
            size_bytes: img.size_bytes,
            metadata_status: img.metadata_status,
            created_at: img.created_at,
        }
    }
}
