#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use imagehost::{
    app::build_app,
    config::{AppConfig, HashConfig},
    images::{fetch::ImageFetcher, queue::MetadataQueue},
    state::AppState,
    storage::StorageClient,
};
use sqlx::PgPool;
use tower::ServiceExt;

pub const BASE_URL: &str = "https://objects.test";

/// Object store kept in memory, readable back through [`ImageFetcher`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn replace(&self, url: &str, body: Bytes) {
        self.objects.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn remove(&self, url: &str) {
        self.objects.lock().unwrap().remove(url);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageClient for MemoryStore {
    async fn put_object(&self, key: &str, body: Bytes, _ct: &str) -> anyhow::Result<String> {
        let url = format!("{}/{}", BASE_URL, key);
        self.objects.lock().unwrap().insert(url.clone(), body);
        Ok(url)
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&format!("{}/{}", BASE_URL, key));
        Ok(())
    }
}

#[async_trait]
impl ImageFetcher for MemoryStore {
    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", url))
    }
}

pub fn state(pool: PgPool) -> (AppState, MemoryStore) {
    build_state(pool, AppState::test_config("postgres://unused"), |_, _| {
        MetadataQueue::detached()
    })
}

/// State whose uploads are enriched by a running metadata worker.
pub fn state_with_worker(pool: PgPool) -> (AppState, MemoryStore) {
    build_state(pool, AppState::test_config("postgres://unused"), |db, store| {
        MetadataQueue::spawn(db, Arc::new(store), 8)
    })
}

/// State hashing with the production argon2 parameters.
pub fn state_with_real_hashing(pool: PgPool) -> (AppState, MemoryStore) {
    let mut config = AppState::test_config("postgres://unused");
    config.hash = HashConfig::default();
    build_state(pool, config, |_, _| MetadataQueue::detached())
}

fn build_state(
    pool: PgPool,
    config: AppConfig,
    queue: impl FnOnce(PgPool, MemoryStore) -> MetadataQueue,
) -> (AppState, MemoryStore) {
    let store = MemoryStore::default();
    let metadata_queue = queue(pool.clone(), store.clone());
    let state = AppState::from_parts(
        pool,
        Arc::new(config),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        metadata_queue,
    )
    .unwrap();
    (state, store)
}

pub fn app(state: &AppState) -> Router {
    build_app(state.clone())
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    req
}

pub async fn register(app: &Router, first: &str, last: &str, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        json_request(
            "POST",
            "/register",
            serde_json::json!({
                "first_name": first,
                "last_name": last,
                "email": email,
                "password": password,
            }),
        ),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        json_request(
            "POST",
            "/login",
            serde_json::json!({"email": email, "password": password}),
        ),
    )
    .await
}

pub const BOUNDARY: &str = "X-IMAGEHOST-TEST";

pub fn upload_request(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"original\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post("/upload-image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
