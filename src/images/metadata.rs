//! Format/dimension/size extraction from stored image bytes.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::common::AppError;

/// Fields computed from the binary, never supplied by the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMetadata {
    pub format: String,
    pub width: i32,
    pub height: i32,
    pub size_bytes: i64,
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".into(),
        ImageFormat::Png => "png".into(),
        ImageFormat::Gif => "gif".into(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Reads the header of `data` to find its format and pixel dimensions.
pub fn derive_metadata(data: &[u8]) -> Result<DerivedMetadata, AppError> {
    let format = image::guess_format(data)
        .map_err(|e| AppError::Processing(format!("Unrecognized image data: {}", e)))?;

    let (width, height) = ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|e| AppError::Processing(format!("Failed to read image dimensions: {}", e)))?;

    let too_large = |_| AppError::Processing("Image dimensions out of range.".into());
    Ok(DerivedMetadata {
        format: format_name(format),
        width: i32::try_from(width).map_err(too_large)?,
        height: i32::try_from(height).map_err(too_large)?,
        size_bytes: data.len() as i64,
    })
}
