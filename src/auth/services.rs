use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{LoginRequest, RegisterRequest, UpdateUserRequest, UserDetails},
    jwt::TokenPair,
    password::Passwords,
    repo::{self, is_unique_violation},
    repo_types::User,
    validation::{check_password_strength, is_blank, is_valid_email, normalize_email, BLANK, REQUIRED},
};
use crate::{
    common::{
        pagination::{PageQuery, Paged},
        AppError, FieldErrors,
    },
    state::AppState,
};

const INVALID_EMAIL: &str = "Please enter a valid email address.";
const EMAIL_TAKEN: &str = "user with this email already exists.";
const INVALID_CREDENTIALS: &str = "Invalid email or password.";

fn invalid_credentials() -> AppError {
    AppError::Auth(INVALID_CREDENTIALS.into())
}

fn email_taken(message: &str) -> AppError {
    AppError::validation(message, FieldErrors::single("email", EMAIL_TAKEN))
}

/// Field-level checks for a registration request. `req.email` is expected to
/// be normalized already.
pub fn validate_registration(req: &RegisterRequest) -> FieldErrors {
    let mut errs = FieldErrors::new();
    if is_blank(&req.first_name) {
        errs.add("first_name", "First name and Last name are required.");
    }
    if is_blank(&req.last_name) {
        errs.add("last_name", "First name and Last name are required.");
    }
    if req.email.is_empty() {
        errs.add("email", REQUIRED);
    } else if !is_valid_email(&req.email) {
        errs.add("email", INVALID_EMAIL);
    }
    if req.password.is_empty() {
        errs.add("password", REQUIRED);
    } else if let Err(msg) = check_password_strength(&req.password) {
        errs.add("password", msg);
    }
    errs
}

pub async fn register(st: &AppState, mut req: RegisterRequest) -> Result<User, AppError> {
    req.email = normalize_email(&req.email);

    let mut errs = validate_registration(&req);
    if !errs.contains("email") && User::find_by_email(&st.db, &req.email).await?.is_some() {
        errs.add("email", EMAIL_TAKEN);
    }
    if !errs.is_empty() {
        warn!(?errs, "registration rejected");
        return Err(AppError::validation("Registration failed.", errs));
    }

    let hash = st.passwords.hash(&req.password)?;
    let user = match User::create(
        &st.db,
        req.first_name.trim(),
        req.last_name.trim(),
        &req.email,
        &hash,
    )
    .await
    {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(e) if is_unique_violation(&e) => return Err(email_taken("Registration failed.")),
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Unknown email and wrong password produce the same error.
pub async fn login(st: &AppState, req: LoginRequest) -> Result<(User, TokenPair), AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        let mut errs = FieldErrors::new();
        if email.is_empty() {
            errs.add("email", REQUIRED);
        }
        if req.password.is_empty() {
            errs.add("password", REQUIRED);
        }
        warn!("login missing email or password");
        return Err(AppError::validation("Email and password are required.", errs));
    }

    let Some(user) = User::find_by_email(&st.db, &email).await? else {
        // keep the response time in line with a wrong password
        st.passwords.verify_dummy(&req.password);
        warn!(%email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !st.passwords.verify(&req.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let pair = st.jwt.issue_pair(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, pair))
}

/// Blacklists a refresh token. Returns false if the token is not a valid
/// refresh token.
pub async fn logout(st: &AppState, refresh_token: &str) -> Result<bool, AppError> {
    let claims = match st.jwt.verify_refresh(refresh_token) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "logout with invalid refresh token");
            return Ok(false);
        }
    };
    let expires_at =
        OffsetDateTime::from_unix_timestamp(claims.exp as i64).context("token exp out of range")?;
    repo::blacklist_token(&st.db, claims.jti, claims.sub, expires_at).await?;
    info!(user_id = %claims.sub, jti = %claims.jti, "refresh token blacklisted");
    Ok(true)
}

/// Exchanges a refresh token for a new pair. The presented token is
/// blacklisted, so each refresh token works once.
pub async fn refresh(st: &AppState, refresh_token: &str) -> Result<TokenPair, AppError> {
    let claims = st.jwt.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh with invalid token");
        AppError::Auth("Token is invalid or expired.".into())
    })?;

    if User::find_by_id(&st.db, claims.sub).await?.is_none() {
        return Err(AppError::Auth("User not found.".into()));
    }

    let expires_at =
        OffsetDateTime::from_unix_timestamp(claims.exp as i64).context("token exp out of range")?;
    if !repo::blacklist_token(&st.db, claims.jti, claims.sub, expires_at).await? {
        warn!(user_id = %claims.sub, jti = %claims.jti, "refresh with blacklisted token");
        return Err(AppError::Auth("Token is blacklisted.".into()));
    }

    let pair = st.jwt.issue_pair(claims.sub)?;
    info!(user_id = %claims.sub, "tokens refreshed");
    Ok(pair)
}

pub async fn get_user(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    User::find_by_id(&st.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

/// Validates `req` against `current` and returns the user as it should be
/// stored. Password fields are checked before anything else is applied.
pub fn plan_update(
    passwords: &Passwords,
    current: &User,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut errs = FieldErrors::new();

    if let Some(old) = &req.old_password {
        if !passwords.verify(old, &current.password_hash)? {
            errs.add("old_password", "The old password is incorrect.");
        }
    }

    let mut new_hash = None;
    if req.new_password.is_some() || req.confirm_new_password.is_some() {
        if req.old_password.is_none() {
            errs.add("old_password", "Old password is required for password update.");
        }
        match (&req.new_password, &req.confirm_new_password) {
            (Some(new), Some(confirm)) if new == confirm => {
                if let Err(msg) = check_password_strength(new) {
                    errs.add("new_password", msg);
                } else if errs.is_empty() {
                    new_hash = Some(passwords.hash(new)?);
                }
            }
            _ => errs.add("confirm_new_password", "The new passwords do not match."),
        }
    }

    let mut updated = current.clone();
    if let Some(first) = req.first_name {
        if is_blank(&first) {
            errs.add("first_name", BLANK);
        }
        updated.first_name = first.trim().to_string();
    }
    if let Some(last) = req.last_name {
        if is_blank(&last) {
            errs.add("last_name", BLANK);
        }
        updated.last_name = last.trim().to_string();
    }
    if let Some(email) = req.email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            errs.add("email", INVALID_EMAIL);
        }
        updated.email = email;
    }

    if !errs.is_empty() {
        return Err(AppError::validation("Failed to update user details.", errs));
    }
    if let Some(hash) = new_hash {
        updated.password_hash = hash;
    }
    Ok(updated)
}

pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let current = get_user(st, user_id).await?;
    let updated = plan_update(&st.passwords, &current, req).map_err(|e| {
        warn!(%user_id, error = %e, "profile update rejected");
        e
    })?;

    if updated.email != current.email {
        if let Some(other) = User::find_by_email(&st.db, &updated.email).await? {
            if other.id != user_id {
                return Err(email_taken("Failed to update user details."));
            }
        }
    }

    let saved = match updated.save(&st.db).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(AppError::NotFound("User not found.".into())),
        Err(e) if is_unique_violation(&e) => return Err(email_taken("Failed to update user details.")),
        Err(e) => return Err(e.into()),
    };
    info!(%user_id, "user updated");
    Ok(saved)
}

pub async fn delete_account(st: &AppState, user_id: Uuid) -> Result<(), AppError> {
    if !User::delete(&st.db, user_id).await? {
        warn!(%user_id, "delete of non-existent user");
        return Err(AppError::NotFound("User does not exist.".into()));
    }
    info!(%user_id, "user deleted");
    Ok(())
}

pub async fn list_users(st: &AppState, query: &PageQuery) -> Result<Paged<UserDetails>, AppError> {
    let count = User::count(&st.db).await?;
    let page = query.resolve(count)?;
    let users = User::list(&st.db, page.limit(), page.offset()).await?;
    Ok(Paged::new(
        "/users",
        page,
        count,
        users.into_iter().map(UserDetails::from).collect(),
    ))
}
