use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use camp_registry::{
    AppState,
    auth::{
        AdminUser, AuthUser, Claims, INVALID_CREDENTIAL, MISSING_CREDENTIAL, TOKEN_LIFETIME_SECS,
        issue_token, verify_token,
    },
    config::AppConfig,
    error::AppError,
    gateway::MockPaymentGateway,
    models::User,
    repository::{MemoryRepository, Repository},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs a token by hand so expiry and secret can be controlled independently.
fn create_token(email: &str, exp: u64, secret: &str) -> String {
    let claims = Claims {
        email: email.to_string(),
        iat: now_secs() as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

async fn create_app_state(users: Vec<User>) -> AppState {
    let repo = MemoryRepository::new();
    for user in users {
        repo.insert_user_if_absent(user).await.unwrap();
    }

    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        repo: Arc::new(repo),
        gateway: Arc::new(MockPaymentGateway::new()),
        config,
    }
}

fn user(email: &str, role: Option<&str>) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role: role.map(str::to_string),
        ..User::default()
    }
}

fn get_request_parts(bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/".parse::<Uri>().unwrap());
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

// --- Token Issuance & Verification ---

#[test]
fn test_issued_token_verifies_and_carries_email() {
    let token = issue_token(TEST_JWT_SECRET, "amy@example.com").unwrap();
    let claims = verify_token(TEST_JWT_SECRET, &token).unwrap();

    assert_eq!(claims.email, "amy@example.com");
    assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECS as usize);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let token = issue_token("some-other-secret", "amy@example.com").unwrap();
    let result = verify_token(TEST_JWT_SECRET, &token);

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(INVALID_CREDENTIAL))
    ));
}

#[test]
fn test_expired_token_is_rejected() {
    // Well past the default validation leeway.
    let token = create_token("amy@example.com", now_secs() - 600, TEST_JWT_SECRET);
    let result = verify_token(TEST_JWT_SECRET, &token);

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(INVALID_CREDENTIAL))
    ));
}

#[test]
fn test_garbage_token_is_rejected() {
    let result = verify_token(TEST_JWT_SECRET, "not.a.jwt");
    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(INVALID_CREDENTIAL))
    ));
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = create_app_state(vec![]).await;
    let token = create_token("amy@example.com", now_secs() + 3600, TEST_JWT_SECRET);
    let mut parts = get_request_parts(Some(&token));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    // Verification does not require a stored user.
    assert_eq!(auth_user.email, "amy@example.com");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(vec![]).await;
    let mut parts = get_request_parts(None);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(MISSING_CREDENTIAL))
    ));
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let app_state = create_app_state(vec![]).await;
    let mut parts = get_request_parts(None);
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic YW15OnB3"),
    );

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(MISSING_CREDENTIAL))
    ));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state = create_app_state(vec![]).await;
    let token = create_token("amy@example.com", now_secs() - 600, TEST_JWT_SECRET);
    let mut parts = get_request_parts(Some(&token));

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(INVALID_CREDENTIAL))
    ));
}

// --- AdminUser Extractor ---

#[tokio::test]
async fn test_admin_success_for_admin_role() {
    let app_state = create_app_state(vec![user("root@example.com", Some("admin"))]).await;
    let token = issue_token(TEST_JWT_SECRET, "root@example.com").unwrap();
    let mut parts = get_request_parts(Some(&token));

    let admin = AdminUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(admin.email, "root@example.com");
}

#[tokio::test]
async fn test_admin_forbidden_for_participant() {
    let app_state = create_app_state(vec![user("amy@example.com", None)]).await;
    let token = issue_token(TEST_JWT_SECRET, "amy@example.com").unwrap();
    let mut parts = get_request_parts(Some(&token));

    let result = AdminUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_admin_forbidden_for_unknown_user() {
    let app_state = create_app_state(vec![]).await;
    let token = issue_token(TEST_JWT_SECRET, "ghost@example.com").unwrap();
    let mut parts = get_request_parts(Some(&token));

    let result = AdminUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_admin_without_credential_is_unauthenticated_not_forbidden() {
    let app_state = create_app_state(vec![user("root@example.com", Some("admin"))]).await;
    let mut parts = get_request_parts(None);

    let result = AdminUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(
        result,
        Err(AppError::Unauthenticated(MISSING_CREDENTIAL))
    ));
}

#[tokio::test]
async fn test_other_role_values_are_not_admin() {
    let app_state = create_app_state(vec![user("mod@example.com", Some("Admin"))]).await;
    let token = issue_token(TEST_JWT_SECRET, "mod@example.com").unwrap();
    let mut parts = get_request_parts(Some(&token));

    let result = AdminUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}
