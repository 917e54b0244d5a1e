use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser},
    error::AppError,
    gateway::to_minor_units,
    lifecycle::{self, Actor},
    models::{
        AdminStatus, Camp, CampRequest, CampSort, CreateCampRequest, CreateUserRequest,
        DeleteOutcome, InsertOutcome, Payment, PaymentIntentRequest, PaymentIntentResponse,
        Receipt, Reconciliation, RecordPaymentRequest, RecordReviewRequest, RegisterRequest,
        Review, TokenRequest, TokenResponse, UpdateCampRequest, UpdateUserRequest, User,
        UserStats, WithdrawOutcome,
    },
    recorder, stats,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

/// Number of camps returned by `GET /top-events`.
const TOP_EVENTS_LIMIT: i64 = 6;

/// Currency used for every payment intent.
const PAYMENT_CURRENCY: &str = "usd";

// --- Filter Structs ---

/// CampFilter
///
/// Query parameters for `GET /camps`.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CampFilter {
    /// Case-insensitive match on name, location or professional.
    pub search: Option<String>,
    /// One of `fee`, `participants`, `name`. Defaults to newest first.
    pub sort: Option<CampSort>,
}

/// WithdrawParams
///
/// The camp whose counter the withdrawal releases, as sent by the client.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WithdrawParams {
    #[serde(rename = "campId")]
    pub camp_id: Uuid,
}

// --- Public Handlers ---

pub async fn root() -> &'static str {
    "Camp registration service is running"
}

/// issue_jwt
///
/// [Public Route] Mints a one-hour access token for the given email.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = TokenRequest,
    responses((status = 200, description = "Token", body = TokenResponse))
)]
pub async fn issue_jwt(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = auth::issue_token(&state.config.jwt_secret, &payload.email)?;
    Ok(Json(TokenResponse { token }))
}

/// create_user
///
/// [Public Route] Saves a user on first sign-in. A second call for the same email is a
/// no-op reported with a null `insertedId`.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses((status = 200, description = "Insert outcome", body = InsertOutcome))
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<InsertOutcome>, AppError> {
    let user = User {
        id: Uuid::new_v4(),
        email: payload.email,
        name: payload.name,
        contact: payload.contact,
        photo_url: payload.photo_url,
        role: None,
    };

    let outcome = match state.repo.insert_user_if_absent(user).await? {
        Some(created) => InsertOutcome {
            inserted_id: Some(created.id),
            message: None,
        },
        None => InsertOutcome {
            inserted_id: None,
            message: Some("user already exist".to_string()),
        },
    };
    Ok(Json(outcome))
}

/// get_camps
///
/// [Public Route] Lists camps with optional search and ordering.
#[utoipa::path(
    get,
    path = "/camps",
    params(CampFilter),
    responses((status = 200, description = "Camps", body = [Camp]))
)]
pub async fn get_camps(
    State(state): State<AppState>,
    Query(filter): Query<CampFilter>,
) -> Result<Json<Vec<Camp>>, AppError> {
    Ok(Json(state.repo.list_camps(filter.search, filter.sort).await?))
}

/// get_camp
///
/// [Public Route] A single camp, or `null` when the id matches nothing.
#[utoipa::path(
    get,
    path = "/camps/{id}",
    params(("id" = Uuid, Path, description = "Camp ID")),
    responses((status = 200, description = "Camp or null", body = Camp))
)]
pub async fn get_camp(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Camp>>, AppError> {
    Ok(Json(state.repo.get_camp(id).await?))
}

/// get_top_events
///
/// [Public Route] The most popular camps by participant count.
#[utoipa::path(
    get,
    path = "/top-events",
    responses((status = 200, description = "Top camps", body = [Camp]))
)]
pub async fn get_top_events(State(state): State<AppState>) -> Result<Json<Vec<Camp>>, AppError> {
    Ok(Json(state.repo.top_camps(TOP_EVENTS_LIMIT).await?))
}

#[utoipa::path(
    get,
    path = "/reviews",
    responses((status = 200, description = "All reviews, newest first", body = [Review]))
)]
pub async fn get_reviews(State(state): State<AppState>) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.repo.list_reviews().await?))
}

// --- Authenticated Handlers ---

/// check_admin
///
/// [Authenticated Route] Reports whether `email` belongs to an admin.
#[utoipa::path(
    get,
    path = "/users/admin/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "Admin flag", body = AdminStatus))
)]
pub async fn check_admin(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>, AppError> {
    let admin = auth::is_admin(state.repo.as_ref(), &email).await?;
    Ok(Json(AdminStatus { admin }))
}

/// update_user
///
/// [Authenticated Route] Partial profile update; owner or admin only.
#[utoipa::path(
    patch,
    path = "/update-user/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user or null", body = User),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn update_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Option<User>>, AppError> {
    auth::ensure_self_or_admin(state.repo.as_ref(), &caller, &email).await?;
    Ok(Json(state.repo.update_user(&email, payload).await?))
}

/// register_for_camp
///
/// [Authenticated Route] Registers the caller for a camp.
///
/// *Uniqueness*: one request per `(email, camp)`. A second attempt is answered with
/// 400 `{success: false, message}`, and nothing is written.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Created request, or null for an unknown camp", body = CampRequest),
        (status = 400, description = "Already registered")
    )
)]
pub async fn register_for_camp(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Option<CampRequest>>, AppError> {
    let request = lifecycle::register(
        state.repo.as_ref(),
        &email,
        &payload.participant_name,
        payload.camp_id,
    )
    .await?;
    Ok(Json(request))
}

/// get_participant_requests
///
/// [Authenticated Route] The requests of one participant; owner or admin only.
#[utoipa::path(
    get,
    path = "/requests/{email}",
    params(("email" = String, Path, description = "Participant email")),
    responses((status = 200, description = "Requests", body = [CampRequest]))
)]
pub async fn get_participant_requests(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<CampRequest>>, AppError> {
    auth::ensure_self_or_admin(state.repo.as_ref(), &caller, &email).await?;
    Ok(Json(
        lifecycle::list_by_participant(state.repo.as_ref(), &email).await?,
    ))
}

/// withdraw_own_request
///
/// [Authenticated Route] The participant cancels one of their own requests.
#[utoipa::path(
    delete,
    path = "/request-delete/user/{id}",
    params(("id" = Uuid, Path, description = "Request ID"), WithdrawParams),
    responses((status = 200, description = "Withdrawal outcome", body = WithdrawOutcome))
)]
pub async fn withdraw_own_request(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<WithdrawParams>,
) -> Result<Json<WithdrawOutcome>, AppError> {
    let outcome = lifecycle::withdraw(
        state.repo.as_ref(),
        id,
        params.camp_id,
        Actor::Participant(&email),
    )
    .await?;
    Ok(Json(outcome))
}

/// create_payment_intent
///
/// [Authenticated Route] Asks the payment provider for a client secret. Not retried.
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Client secret", body = PaymentIntentResponse),
        (status = 400, description = "Non-positive price"),
        (status = 502, description = "Provider failure")
    )
)]
pub async fn create_payment_intent(
    _caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    let amount_cents = to_minor_units(payload.price);
    if !payload.price.is_finite() || amount_cents <= 0 {
        return Err(AppError::InvalidInput(
            "price must be greater than zero".to_string(),
        ));
    }

    let client_secret = state
        .gateway
        .create_payment_intent(amount_cents, PAYMENT_CURRENCY)
        .await?;
    Ok(Json(PaymentIntentResponse { client_secret }))
}

/// record_payment
///
/// [Authenticated Route] Stores a completed payment for the caller and marks the
/// matching request as paid when one is found.
#[utoipa::path(
    post,
    path = "/payment",
    request_body = RecordPaymentRequest,
    responses((status = 200, description = "Receipt", body = Receipt))
)]
pub async fn record_payment(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<Json<Receipt>, AppError> {
    Ok(Json(
        recorder::record_payment(state.repo.as_ref(), &email, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/payment-history/{email}",
    params(("email" = String, Path, description = "Participant email")),
    responses((status = 200, description = "Payments, newest first", body = [Payment]))
)]
pub async fn get_payment_history(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Payment>>, AppError> {
    auth::ensure_self_or_admin(state.repo.as_ref(), &caller, &email).await?;
    Ok(Json(state.repo.list_payments(&email).await?))
}

/// record_review
///
/// [Authenticated Route] Stores a review from the caller and flags the matching request.
/// A rating outside 1..=5 is rejected with 400 and nothing is stored.
#[utoipa::path(
    post,
    path = "/reviews",
    request_body = RecordReviewRequest,
    responses(
        (status = 200, description = "Receipt", body = Receipt),
        (status = 400, description = "Rating out of range")
    )
)]
pub async fn record_review(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecordReviewRequest>,
) -> Result<Json<Receipt>, AppError> {
    Ok(Json(
        recorder::record_review(state.repo.as_ref(), &email, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/user-stats/{email}",
    params(("email" = String, Path, description = "Participant email")),
    responses((status = 200, description = "Counts", body = UserStats))
)]
pub async fn get_user_stats(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserStats>, AppError> {
    auth::ensure_self_or_admin(state.repo.as_ref(), &caller, &email).await?;
    Ok(Json(stats::stats_for(state.repo.as_ref(), &email).await?))
}

// --- Admin Handlers ---

/// get_all_requests
///
/// [Admin Route] Every request in the system.
#[utoipa::path(
    get,
    path = "/requests",
    responses(
        (status = 200, description = "All requests", body = [CampRequest]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_all_requests(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CampRequest>>, AppError> {
    Ok(Json(lifecycle::list_all(state.repo.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/camps",
    request_body = CreateCampRequest,
    responses(
        (status = 200, description = "Created", body = Camp),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_camp(
    AdminUser { email }: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCampRequest>,
) -> Result<Json<Camp>, AppError> {
    let camp = state.repo.create_camp(payload).await?;
    tracing::info!(camp_id = %camp.id, admin = %email, "camp created");
    Ok(Json(camp))
}

#[utoipa::path(
    patch,
    path = "/camps/{id}",
    params(("id" = Uuid, Path, description = "Camp ID")),
    request_body = UpdateCampRequest,
    responses((status = 200, description = "Updated camp or null", body = Camp))
)]
pub async fn update_camp(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCampRequest>,
) -> Result<Json<Option<Camp>>, AppError> {
    Ok(Json(state.repo.update_camp(id, payload).await?))
}

/// delete_camp
///
/// [Admin Route] Removes a camp. Its requests are left in place; they reference the camp
/// by id only.
#[utoipa::path(
    delete,
    path = "/camps/{id}",
    params(("id" = Uuid, Path, description = "Camp ID")),
    responses((status = 200, description = "Deleted count", body = DeleteOutcome))
)]
pub async fn delete_camp(
    AdminUser { email }: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let deleted_count = state.repo.delete_camp(id).await?;
    tracing::info!(camp_id = %id, admin = %email, deleted_count, "camp delete");
    Ok(Json(DeleteOutcome { deleted_count }))
}

/// confirm_request
///
/// [Admin Route] Marks a request confirmed. Repeating it changes nothing.
#[utoipa::path(
    patch,
    path = "/request-confirm/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Confirmed request or null", body = CampRequest),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn confirm_request(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<CampRequest>>, AppError> {
    Ok(Json(lifecycle::confirm(state.repo.as_ref(), id).await?))
}

/// withdraw_request_admin
///
/// [Admin Route] Forced removal of any participant's request.
#[utoipa::path(
    delete,
    path = "/request-delete/admin/{id}",
    params(("id" = Uuid, Path, description = "Request ID"), WithdrawParams),
    responses((status = 200, description = "Withdrawal outcome", body = WithdrawOutcome))
)]
pub async fn withdraw_request_admin(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<WithdrawParams>,
) -> Result<Json<WithdrawOutcome>, AppError> {
    let outcome =
        lifecycle::withdraw(state.repo.as_ref(), id, params.camp_id, Actor::Admin).await?;
    Ok(Json(outcome))
}

/// reconcile_camp
///
/// [Admin Route] Rebuilds a camp's participant counter from its live requests.
#[utoipa::path(
    post,
    path = "/camps/{id}/reconcile",
    params(("id" = Uuid, Path, description = "Camp ID")),
    responses((status = 200, description = "Counter before and after, or null", body = Reconciliation))
)]
pub async fn reconcile_camp(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Reconciliation>>, AppError> {
    Ok(Json(lifecycle::reconcile(state.repo.as_ref(), id).await?))
}
