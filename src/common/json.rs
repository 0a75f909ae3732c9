use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use super::error::{AppError, FieldErrors};

/// JSON body extractor that reports decode failures as 400 validation errors
/// instead of axum's plain-text 415/422 rejections.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::validation(
                "Invalid request body.",
                FieldErrors::single("body", rejection.body_text()),
            )),
        }
    }
}
