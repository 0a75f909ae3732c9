use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle of the derived metadata of an image row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStatus {
    Created,
    Pending,
    Finalized,
    Failed,
}

impl MetadataStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataStatus::Created => "created",
            MetadataStatus::Pending => "pending",
            MetadataStatus::Finalized => "finalized",
            MetadataStatus::Failed => "failed",
        }
    }
}

/// Image record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: Uuid,
    pub owner_id: Option<Uuid>, // NULL for anonymous uploads
    pub storage_key: String,
    pub image_url: String,
    pub original_format: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub size_bytes: Option<i64>,
    pub metadata_status: String,
    pub created_at: OffsetDateTime,
}

impl Image {
    /// All derived fields are present.
    pub fn is_finalized(&self) -> bool {
        self.original_format.is_some()
            && self.width.is_some()
            && self.height.is_some()
            && self.size_bytes.is_some()
    }
}
