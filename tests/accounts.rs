mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use common::{json_request, login, register, send, with_bearer};
use imagehost::auth::repo_types::User;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_then_login(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);

    let (status, json) = register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["email"], "ann@example.com");
    assert_eq!(json["data"]["first_name"], "Ann");
    assert!(json["data"].get("password").is_none());
    assert!(!json.to_string().contains("password_hash"));

    let (status, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!json["data"]["access"].as_str().unwrap().is_empty());
    assert!(!json["data"]["refresh"].as_str().unwrap().is_empty());
    assert_eq!(json["data"]["user"]["email"], "ann@example.com");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stored_credential_is_hashed(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;

    let user = User::find_by_email(&state.db, "ann@example.com").await.unwrap().unwrap();
    assert_ne!(user.password_hash, "Passw0rd1");
    assert!(state.passwords.verify("Passw0rd1", &user.password_hash).unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_is_a_validation_error(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);

    let (status, _) = register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = register(&app, "Other", "Person", "ANN@example.com", "Passw0rd2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"]["email"].is_array());

    assert_eq!(User::count(&state.db).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn bad_password_and_unknown_email_look_the_same(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;

    let wrong_password = login(&app, "ann@example.com", "Wr0ngPassword").await;
    let unknown_email = login(&app, "nobody@example.com", "Passw0rd1").await;
    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn logout_revokes_refresh_token(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    let (_, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    let refresh = json["data"]["refresh"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request("POST", "/logout", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // idempotent
    let (status, _) = send(
        &app,
        json_request("POST", "/logout", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request("POST", "/token/refresh", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn refresh_rotates_tokens(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    let (_, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    let refresh = json["data"]["refresh"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        json_request("POST", "/token/refresh", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = json["data"]["refresh"].as_str().unwrap();
    assert_ne!(rotated, refresh);

    // the old one is spent
    let (status, _) = send(
        &app,
        json_request("POST", "/token/refresh", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn profile_update_and_delete(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    let (_, json) = register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    let user_id = json["data"]["user_id"].as_str().unwrap().to_string();
    let (_, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    let access = json["data"]["access"].as_str().unwrap().to_string();
    let uri = format!("/users/{user_id}");

    let (status, json) = send(
        &app,
        with_bearer(
            json_request(
                "PUT",
                &uri,
                serde_json::json!({"old_password": "nope", "new_password": "N3wPassword",
                                   "confirm_new_password": "N3wPassword"}),
            ),
            &access,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"]["old_password"].is_array());

    let (status, json) = send(
        &app,
        with_bearer(
            json_request(
                "PUT",
                &uri,
                serde_json::json!({"last_name": "Smith", "old_password": "Passw0rd1",
                                   "new_password": "N3wPassword", "confirm_new_password": "N3wPassword"}),
            ),
            &access,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["last_name"], "Smith");
    assert_eq!(json["data"]["first_name"], "Ann");

    assert_eq!(login(&app, "ann@example.com", "Passw0rd1").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "ann@example.com", "N3wPassword").await.0, StatusCode::OK);

    let delete = with_bearer(
        Request::delete(uri.as_str()).body(Body::empty()).unwrap(),
        &access,
    );
    assert_eq!(send(&app, delete).await.0, StatusCode::OK);

    let get = with_bearer(Request::get(uri.as_str()).body(Body::empty()).unwrap(), &access);
    assert_eq!(send(&app, get).await.0, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn user_list_pages(pool: PgPool) {
    let (state, _) = common::state(pool);
    for i in 0..25 {
        User::create(&state.db, "User", &format!("{i}"), &format!("user{i}@example.com"), "x")
            .await
            .unwrap();
    }
    let app = common::app(&state);
    let get = |uri: &str| Request::get(uri).body(Body::empty()).unwrap();

    let (status, page1) = send(&app, get("/users?page_size=20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["count"], 25);
    assert_eq!(page1["results"].as_array().unwrap().len(), 20);
    assert_eq!(page1["next"], "/users?page=2&page_size=20");
    assert!(page1["previous"].is_null());
    assert_eq!(page1["results"][0]["email"], "user0@example.com");

    let (_, page2) = send(&app, get("/users?page=2&page_size=20")).await;
    assert_eq!(page2["results"].as_array().unwrap().len(), 5);
    assert!(page2["next"].is_null());

    let (_, clamped) = send(&app, get("/users?page_size=1000")).await;
    assert_eq!(clamped["results"].as_array().unwrap().len(), 25);
    assert!(clamped["next"].is_null());

    let (status, _) = send(&app, get("/users?page=9")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn tokens_of_deleted_account_are_rejected_cleanly(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    let (_, json) = register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    let user_id = json["data"]["user_id"].as_str().unwrap().to_string();
    let (_, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    let access = json["data"]["access"].as_str().unwrap().to_string();
    let refresh = json["data"]["refresh"].as_str().unwrap().to_string();
    let (_, second) = login(&app, "ann@example.com", "Passw0rd1").await;
    let other_refresh = second["data"]["refresh"].as_str().unwrap().to_string();

    let delete = with_bearer(
        Request::delete(format!("/users/{user_id}")).body(Body::empty()).unwrap(),
        &access,
    );
    assert_eq!(send(&app, delete).await.0, StatusCode::OK);

    let (status, json) = send(
        &app,
        json_request("POST", "/logout", serde_json::json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let (status, _) = send(
        &app,
        json_request("POST", "/token/refresh", serde_json::json!({"refresh": other_refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unknown_email_login_is_not_measurably_faster(pool: PgPool) {
    use std::time::{Duration, Instant};

    let (state, _) = common::state_with_real_hashing(pool);
    let app = common::app(&state);
    register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;

    let mut wrong_password = Duration::ZERO;
    let mut unknown_email = Duration::ZERO;
    for _ in 0..5 {
        let started = Instant::now();
        let known = login(&app, "ann@example.com", "Wr0ngPassword").await;
        wrong_password += started.elapsed();

        let started = Instant::now();
        let unknown = login(&app, "nobody@example.com", "Wr0ngPassword").await;
        unknown_email += started.elapsed();

        assert_eq!(known, unknown);
    }
    // both paths run a full argon2 verification
    assert!(
        unknown_email * 3 >= wrong_password,
        "unknown email {unknown_email:?} vs wrong password {wrong_password:?}"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn email_change_to_taken_address_is_rejected(pool: PgPool) {
    let (state, _) = common::state(pool);
    let app = common::app(&state);
    register(&app, "Bob", "Ray", "bob@example.com", "Passw0rd1").await;
    let (_, json) = register(&app, "Ann", "Lee", "ann@example.com", "Passw0rd1").await;
    let user_id = json["data"]["user_id"].as_str().unwrap().to_string();
    let (_, json) = login(&app, "ann@example.com", "Passw0rd1").await;
    let access = json["data"]["access"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        with_bearer(
            json_request(
                "PUT",
                &format!("/users/{user_id}"),
                serde_json::json!({"email": "BOB@example.com"}),
            ),
            &access,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"]["email"].is_array());

    let ann = User::find_by_email(&state.db, "ann@example.com").await.unwrap();
    assert!(ann.is_some());
}
