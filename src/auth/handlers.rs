use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            LoginData, LoginRequest, PublicUser, RefreshRequest, RegisterRequest, TokenData,
            UpdateUserRequest, UserDetails,
        },
        extractors::AuthUser,
        services,
    },
    common::{
        pagination::{PageQuery, Paged},
        response::{success, success_empty},
        ApiJson, AppError, FieldErrors,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/token/refresh", post(refresh))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        success("User registered successfully.", PublicUser::from(&user)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, tokens) = services::login(&state, payload).await?;
    Ok(success(
        "Login successful.",
        LoginData {
            access: tokens.access,
            refresh: tokens.refresh,
            user: PublicUser::from(&user),
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !services::logout(&state, &payload.refresh).await? {
        return Err(AppError::validation(
            "Logout failed.",
            FieldErrors::single("refresh", "Token is invalid or expired."),
        ));
    }
    Ok(success_empty("Logout successful."))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = services::refresh(&state, &payload.refresh).await?;
    Ok(success(
        "Token refreshed.",
        TokenData {
            access: tokens.access,
            refresh: tokens.refresh,
        },
    ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paged<UserDetails>>, AppError> {
    Ok(Json(services::list_users(&state, &query).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::get_user(&state, id).await?;
    Ok(success(
        "User details retrieved successfully.",
        UserDetails::from(user),
    ))
}

fn ensure_self(caller: Uuid, target: Uuid) -> Result<(), AppError> {
    if caller != target {
        warn!(%caller, %target, "attempt to modify another user");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(caller, id)?;
    let user = services::update_profile(&state, id, payload).await?;
    Ok(success(
        "User details updated successfully.",
        UserDetails::from(user),
    ))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(caller, id)?;
    services::delete_account(&state, id).await?;
    Ok(success_empty("User deleted successfully."))
}
