use camp_registry::{
    AppConfig, AppState, create_router,
    auth::issue_token,
    gateway::{GatewayState, MockPaymentGateway},
    models::{Camp, CampRequest, ConfirmationStatus, User},
    repository::{MemoryRepository, Repository, RepositoryState},
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

const ADMIN_EMAIL: &str = "admin@example.com";

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub config: AppConfig,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn token(&self, email: &str) -> String {
        issue_token(&self.config.jwt_secret, email).unwrap()
    }
}

async fn spawn_app_with_gateway(gateway: GatewayState) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert_user_if_absent(User {
        id: Uuid::new_v4(),
        email: ADMIN_EMAIL.to_string(),
        role: Some("admin".to_string()),
        ..User::default()
    })
    .await
    .unwrap();

    let config = AppConfig::default();
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        gateway,
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        config,
        client: reqwest::Client::new(),
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with_gateway(Arc::new(MockPaymentGateway::new())).await
}

async fn create_camp(app: &TestApp, name: &str) -> Camp {
    let response = app
        .client
        .post(app.url("/camps"))
        .bearer_auth(app.token(ADMIN_EMAIL))
        .json(&json!({ "name": name, "fee": 25.0, "location": "Dhaka" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn register(app: &TestApp, email: &str, camp_id: Uuid) -> reqwest::Response {
    app.client
        .post(app.url("/requests"))
        .bearer_auth(app.token(email))
        .json(&json!({ "camp_id": camp_id, "participant_name": "Amy" }))
        .send()
        .await
        .unwrap()
}

// --- Public Surface ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_jwt_endpoint_issues_usable_token() {
    let app = spawn_app().await;

    let body: Value = app
        .client
        .post(app.url("/jwt"))
        .json(&json!({ "email": "amy@example.com" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = body["token"].as_str().unwrap();

    let response = app
        .client
        .get(app.url("/requests/amy@example.com"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_user_is_insert_if_absent() {
    let app = spawn_app().await;
    let payload = json!({ "email": "amy@example.com", "name": "Amy" });

    let first: Value = app
        .client
        .post(app.url("/users"))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first["insertedId"].is_string());

    let second: Value = app
        .client
        .post(app.url("/users"))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(second["insertedId"].is_null());
    assert_eq!(second["message"], "user already exist");
}

#[tokio::test]
async fn test_unknown_camp_is_null_not_error() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url(&format!("/camps/{}", Uuid::new_v4())))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn test_camp_search_and_sort() {
    let app = spawn_app().await;
    create_camp(&app, "Zeta Dental").await;
    create_camp(&app, "Alpha Eye Care").await;
    create_camp(&app, "Mid Cardio").await;

    let sorted: Vec<Camp> = app
        .client
        .get(app.url("/camps?sort=name"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha Eye Care", "Mid Cardio", "Zeta Dental"]);

    let found: Vec<Camp> = app
        .client
        .get(app.url("/camps?search=dental"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Zeta Dental");
}

// --- Authorization Gate ---

#[tokio::test]
async fn test_missing_credential_is_401_and_writes_nothing() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;

    let response = app
        .client
        .post(app.url("/requests"))
        .json(&json!({ "camp_id": camp.id, "participant_name": "Amy" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "unauthorized access");
    assert_eq!(app.repo.request_total().await, 0);
}

#[tokio::test]
async fn test_invalid_credential_is_401_with_distinct_message() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/requests/amy@example.com"))
        .bearer_auth("definitely.not.valid")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "forbidden access");
}

#[tokio::test]
async fn test_non_admin_cannot_create_or_delete_camps() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;
    let token = app.token("amy@example.com");

    let create = app
        .client
        .post(app.url("/camps"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Sneaky", "fee": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::FORBIDDEN);

    let delete = app
        .client
        .delete(app.url(&format!("/camps/{}", camp.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.repo.camp_total().await, 1);
}

#[tokio::test]
async fn test_admin_route_without_credential_is_401() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/requests")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_admin_actions_are_refused_without_mutation() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;
    let request: CampRequest = register(&app, "amy@example.com", camp.id)
        .await
        .json()
        .await
        .unwrap();
    let confirm_path = format!("/request-confirm/{}", request.id);
    let delete_path = format!("/request-delete/admin/{}?campId={}", request.id, camp.id);
    let participant = app.token("amy@example.com");

    let cases = [
        (Some(participant.as_str()), StatusCode::FORBIDDEN),
        (None, StatusCode::UNAUTHORIZED),
    ];
    for (token, expected) in cases {
        let mut confirm = app.client.patch(app.url(&confirm_path));
        let mut delete = app.client.delete(app.url(&delete_path));
        if let Some(token) = token {
            confirm = confirm.bearer_auth(token);
            delete = delete.bearer_auth(token);
        }
        assert_eq!(confirm.send().await.unwrap().status(), expected);
        assert_eq!(delete.send().await.unwrap().status(), expected);
    }

    let create = app
        .client
        .post(app.url("/camps"))
        .json(&json!({ "name": "Anonymous", "fee": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);

    let requests = app.repo.list_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, request.id);
    assert_eq!(requests[0].confirmation_status, ConfirmationStatus::Pending);
    let stored = app.repo.get_camp(camp.id).await.unwrap().unwrap();
    assert_eq!(stored.participant_count, 1);
    assert_eq!(app.repo.camp_total().await, 1);
}

#[tokio::test]
async fn test_participant_cannot_read_other_participants_data() {
    let app = spawn_app().await;
    let token = app.token("mallory@example.com");

    for path in [
        "/requests/amy@example.com",
        "/payment-history/amy@example.com",
        "/user-stats/amy@example.com",
    ] {
        let response = app
            .client
            .get(app.url(path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "path {path}");
    }

    // Admins may read anyone's.
    let response = app
        .client
        .get(app.url("/user-stats/amy@example.com"))
        .bearer_auth(app.token(ADMIN_EMAIL))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_check_admin_endpoint() {
    let app = spawn_app().await;
    let token = app.token("amy@example.com");

    let admin: Value = app
        .client
        .get(app.url(&format!("/users/admin/{ADMIN_EMAIL}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(admin["admin"], true);

    let not_admin: Value = app
        .client
        .get(app.url("/users/admin/amy@example.com"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(not_admin["admin"], false);
}

// --- Registration Lifecycle over HTTP ---

#[tokio::test]
async fn test_duplicate_registration_returns_400_body() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;

    let first = register(&app, "amy@example.com", camp.id).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = register(&app, "amy@example.com", camp.id).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "You have already registered for this camp");

    let stored: Camp = app
        .client
        .get(app.url(&format!("/camps/{}", camp.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored.participant_count, 1);
}

#[tokio::test]
async fn test_register_pay_confirm_review_withdraw_flow() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;
    let amy = app.token("amy@example.com");
    let admin = app.token(ADMIN_EMAIL);

    let request: CampRequest = register(&app, "amy@example.com", camp.id)
        .await
        .json()
        .await
        .unwrap();

    let receipt: Value = app
        .client
        .post(app.url("/payment"))
        .bearer_auth(&amy)
        .json(&json!({
            "camp_id": camp.id,
            "participant_name": "Amy",
            "amount": 25.0,
            "transaction_id": "pi_test"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["linked"], true);

    let confirmed = app
        .client
        .patch(app.url(&format!("/request-confirm/{}", request.id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(confirmed.status(), StatusCode::OK);

    let review = app
        .client
        .post(app.url("/reviews"))
        .bearer_auth(&amy)
        .json(&json!({ "camp_id": camp.id, "rating": 5, "feedback": "Great" }))
        .send()
        .await
        .unwrap();
    assert_eq!(review.status(), StatusCode::OK);

    let public_reviews: Vec<Value> = app
        .client
        .get(app.url("/reviews"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public_reviews.len(), 1);

    let withdrawn: Value = app
        .client
        .delete(app.url(&format!(
            "/request-delete/user/{}?campId={}",
            request.id, camp.id
        )))
        .bearer_auth(&amy)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(withdrawn["deleted_count"], 1);

    let stats: Value = app
        .client
        .get(app.url("/user-stats/amy@example.com"))
        .bearer_auth(&amy)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        stats,
        json!({ "requestCount": 0, "paymentCount": 1, "reviewCount": 1 })
    );

    let stored: Camp = app
        .client
        .get(app.url(&format!("/camps/{}", camp.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored.participant_count, 0);
}

#[tokio::test]
async fn test_admin_forced_withdrawal() {
    let app = spawn_app().await;
    let camp = create_camp(&app, "Camp").await;
    let request: CampRequest = register(&app, "amy@example.com", camp.id)
        .await
        .json()
        .await
        .unwrap();

    let outcome: Value = app
        .client
        .delete(app.url(&format!(
            "/request-delete/admin/{}?campId={}",
            request.id, camp.id
        )))
        .bearer_auth(app.token(ADMIN_EMAIL))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(outcome["deleted_count"], 1);
    assert_eq!(outcome["participant_count_adjusted"], true);
    assert_eq!(app.repo.request_total().await, 0);
}

#[tokio::test]
async fn test_top_events_orders_by_participants() {
    let app = spawn_app().await;
    let quiet = create_camp(&app, "Quiet").await;
    let busy = create_camp(&app, "Busy").await;
    for i in 0..3 {
        register(&app, &format!("p{i}@example.com"), busy.id).await;
    }
    register(&app, "solo@example.com", quiet.id).await;

    let top: Vec<Camp> = app
        .client
        .get(app.url("/top-events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(top[0].id, busy.id);
    assert_eq!(top[0].participant_count, 3);
    assert_eq!(top[1].id, quiet.id);
}

// --- Payment Intents ---

#[tokio::test]
async fn test_payment_intent_returns_client_secret() {
    let app = spawn_app().await;
    let body: Value = app
        .client
        .post(app.url("/create-payment-intent"))
        .bearer_auth(app.token("amy@example.com"))
        .json(&json!({ "price": 19.99 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["client_secret"], "pi_mock_1999_usd_secret_fake");
}

#[tokio::test]
async fn test_payment_intent_rejects_non_positive_price() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/create-payment-intent"))
        .bearer_auth(app.token("amy@example.com"))
        .json(&json!({ "price": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_intent_provider_failure_is_502() {
    let app = spawn_app_with_gateway(Arc::new(MockPaymentGateway::new_failing())).await;
    let response = app
        .client
        .post(app.url("/create-payment-intent"))
        .bearer_auth(app.token("amy@example.com"))
        .json(&json!({ "price": 10.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
