use axum::Json;
use serde::Serialize;

/// `{status, message, data}` wrapper used by every successful non-list response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        message: message.into(),
        data: Some(data),
    })
}

pub fn success_empty(message: impl Into<String>) -> Json<Envelope<()>> {
    Json(Envelope {
        status: "success",
        message: message.into(),
        data: None,
    })
}
