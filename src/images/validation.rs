use crate::common::AppError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Checks the declared content type and the size of an upload. The file
/// name plays no part.
pub fn validate_upload(content_type: Option<&str>, len: usize) -> Result<(), AppError> {
    let ct = content_type.unwrap_or_default();
    if !ALLOWED_CONTENT_TYPES.contains(&ct) {
        return Err(AppError::invalid_field(
            "original",
            "Unsupported file type. Only JPEG, PNG, and GIF are allowed.",
        ));
    }
    if len == 0 {
        return Err(AppError::invalid_field("original", "The submitted file is empty."));
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(AppError::invalid_field(
            "original",
            format!(
                "File size exceeds the maximum allowed size of {}MB.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ),
        ));
    }
    Ok(())
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
