use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Records (Mapped to the Document Store) ---

/// User
///
/// A person known to the platform, keyed by email. Created on first sign-in and never
/// deleted. Only `role == "admin"` grants administrative rights.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique identity key.
    pub email: String,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub photo_url: Option<String>,
    // 'admin' or unset (participant).
    pub role: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Camp
///
/// An event a participant can register for. `participant_count` is owned by the
/// request lifecycle engine and tracks the number of live requests for the camp.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Camp {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub fee: f64,
    pub scheduled_at: Option<String>,
    pub location: Option<String>,
    // The healthcare professional or host running the camp.
    pub professional: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    pub participant_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PaymentStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "payment_status", rename_all = "kebab-case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

/// ConfirmationStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "confirmation_status", rename_all = "kebab-case")]
pub enum ConfirmationStatus {
    #[default]
    Pending,
    Confirmed,
}

/// ReviewStatus
///
/// Orthogonal to payment and confirmation. Nothing prevents a review from being
/// recorded before the request is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "review_status", rename_all = "kebab-case")]
pub enum ReviewStatus {
    #[default]
    NotGiven,
    Given,
}

/// CampRequest
///
/// A participant's registration for one camp; the authoritative lifecycle record.
/// At most one exists per `(participant_email, camp_id)`.
///
/// `camp_name`, `fee` and `participant_name` are copied in at registration time so the
/// payment projection can match on `(camp_id, participant_name)`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CampRequest {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub camp_name: String,
    pub fee: f64,
    pub participant_email: String,
    pub participant_name: String,
    pub payment_status: PaymentStatus,
    pub confirmation_status: ConfirmationStatus,
    pub review_status: ReviewStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Payment
///
/// Append-only record of a completed charge. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Payment {
    pub id: Uuid,
    pub participant_email: String,
    pub participant_name: String,
    pub camp_id: Uuid,
    pub camp_name: Option<String>,
    pub amount: f64,
    // Provider-side reference (e.g. the payment intent id).
    pub transaction_id: Option<String>,
    #[ts(type = "string")]
    pub paid_at: DateTime<Utc>,
}

/// Review
///
/// Append-only feedback. Several reviews per participant and camp are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub email: String,
    pub reviewer_name: Option<String>,
    pub rating: i16,
    pub feedback: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CounterAdjustment
///
/// The two ways a request moves a camp's `participant_count`. Each request id can
/// apply each adjustment at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "counter_adjustment", rename_all = "kebab-case")]
pub enum CounterAdjustment {
    Increment,
    Decrement,
}

impl CounterAdjustment {
    pub fn delta(self) -> i64 {
        match self {
            CounterAdjustment::Increment => 1,
            CounterAdjustment::Decrement => -1,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// TokenRequest
///
/// Input for `POST /jwt`. The email becomes the token subject.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// CreateUserRequest
///
/// Input for `POST /users`, sent by the client after its first sign-in.
/// The role is never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub photo_url: Option<String>,
}

/// UpdateUserRequest
///
/// Partial profile update for `PATCH /update-user/{email}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// CreateCampRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCampRequest {
    pub name: String,
    pub image: Option<String>,
    pub fee: f64,
    pub scheduled_at: Option<String>,
    pub location: Option<String>,
    pub professional: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
}

/// UpdateCampRequest
///
/// Partial update for `PATCH /camps/{id}`. The participant counter is deliberately
/// absent: only the lifecycle engine moves it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCampRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
}

/// RegisterRequest
///
/// Input for `POST /requests`. The participant email is taken from the verified token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub camp_id: Uuid,
    pub participant_name: String,
}

/// PaymentIntentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PaymentIntentRequest {
    /// Price in major currency units (e.g. dollars).
    #[schema(example = 25.5)]
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// RecordPaymentRequest
///
/// Input for `POST /payment`, sent once the provider has confirmed the charge.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RecordPaymentRequest {
    pub camp_id: Uuid,
    pub participant_name: String,
    pub camp_name: Option<String>,
    pub amount: f64,
    pub transaction_id: Option<String>,
}

/// RecordReviewRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RecordReviewRequest {
    pub camp_id: Uuid,
    pub reviewer_name: Option<String>,
    #[schema(example = 5)]
    pub rating: i16,
    pub feedback: String,
}

// --- Outcomes (Output Schemas) ---

/// InsertOutcome
///
/// Result of an insert-if-absent. `inserted_id` is null when the record already existed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub inserted_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Receipt
///
/// Returned by the payment and review recorders. `linked` reports whether the
/// best-effort projection found and updated the matching request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Receipt {
    pub inserted_id: Uuid,
    pub linked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// WithdrawOutcome
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct WithdrawOutcome {
    pub deleted_count: u64,
    // False when nothing was deleted, or the decrement had already been applied.
    pub participant_count_adjusted: bool,
}

/// Reconciliation
///
/// Output of re-deriving a camp's counter from the live request count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Reconciliation {
    pub camp_id: Uuid,
    pub previous: i64,
    pub current: i64,
}

/// UserStats
///
/// Approximate snapshot: the three counts are taken independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub request_count: i64,
    pub payment_count: i64,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminStatus {
    pub admin: bool,
}

/// CampSort
///
/// Orderings accepted by `GET /camps?sort=`. Without one, newest camps come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CampSort {
    // Cheapest first.
    Fee,
    // Most registered first.
    Participants,
    Name,
}
