pub mod error;
pub mod json;
pub mod pagination;
pub mod response;

pub use error::{AppError, FieldErrors};
pub use json::ApiJson;
