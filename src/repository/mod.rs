use crate::models::{
    Camp, CampRequest, CampSort, CounterAdjustment, CreateCampRequest, Payment, Review,
    UpdateCampRequest, UpdateUserRequest, User,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failures surfaced by the document store. A unique-constraint hit is reported
/// separately so the lifecycle engine can turn it into a duplicate-registration answer.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::UniqueViolation,
            _ => RepoError::Database(e),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// A request write paired with the outcome of its counter adjustment. The two results
/// are kept apart: the request write stands even when the counter did not move.
pub type CountedWrite = (CampRequest, RepoResult<bool>);

/// Repository Trait
///
/// The narrow document-store contract the core depends on: find, insert,
/// update-by-filter, delete-by-filter and count-by-filter over the five collections.
/// Foreign keys (`camp_id`) are compared for equality, never enforced by the store.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` usable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Returns None when a user with that email already exists.
    async fn insert_user_if_absent(&self, user: User) -> RepoResult<Option<User>>;
    async fn update_user(&self, email: &str, req: UpdateUserRequest) -> RepoResult<Option<User>>;

    // --- Camps ---
    async fn create_camp(&self, req: CreateCampRequest) -> RepoResult<Camp>;
    async fn list_camps(
        &self,
        search: Option<String>,
        sort: Option<CampSort>,
    ) -> RepoResult<Vec<Camp>>;
    async fn get_camp(&self, id: Uuid) -> RepoResult<Option<Camp>>;
    async fn update_camp(&self, id: Uuid, req: UpdateCampRequest) -> RepoResult<Option<Camp>>;
    async fn delete_camp(&self, id: Uuid) -> RepoResult<u64>;
    async fn top_camps(&self, limit: i64) -> RepoResult<Vec<Camp>>;

    /// Applies `adjustment` to the camp's counter unless this request id has applied it
    /// before. Returns true only when the counter actually moved.
    async fn adjust_participant_count(
        &self,
        camp_id: Uuid,
        request_id: Uuid,
        adjustment: CounterAdjustment,
    ) -> RepoResult<bool>;

    /// Overwrites the counter with the live number of requests for the camp.
    /// Returns `(previous, current)`, or None when the camp does not exist.
    async fn reconcile_participant_count(&self, camp_id: Uuid) -> RepoResult<Option<(i64, i64)>>;

    // --- Requests ---
    async fn find_request(&self, email: &str, camp_id: Uuid) -> RepoResult<Option<CampRequest>>;
    // Fails with UniqueViolation when (participant_email, camp_id) is taken.
    async fn insert_request(&self, request: CampRequest) -> RepoResult<CampRequest>;
    async fn list_requests(&self) -> RepoResult<Vec<CampRequest>>;
    async fn list_requests_by_participant(&self, email: &str) -> RepoResult<Vec<CampRequest>>;
    async fn confirm_request(&self, id: Uuid) -> RepoResult<Option<CampRequest>>;
    /// Deletes the request and returns it. With `owner` set, only a request belonging to
    /// that email is eligible.
    async fn delete_request(&self, id: Uuid, owner: Option<&str>)
    -> RepoResult<Option<CampRequest>>;

    /// Inserts the request and applies its increment. Stores with transactions run both
    /// writes as one unit; this default runs them as two steps and relies on the
    /// adjustment ledger for replay and reconciliation.
    async fn insert_request_counted(&self, request: CampRequest) -> RepoResult<CountedWrite> {
        let request = self.insert_request(request).await?;
        let adjusted = self
            .adjust_participant_count(request.camp_id, request.id, CounterAdjustment::Increment)
            .await;
        Ok((request, adjusted))
    }

    /// Deletes the request and applies its decrement on the request's own camp. Same
    /// atomicity rules as `insert_request_counted`.
    async fn delete_request_counted(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> RepoResult<Option<CountedWrite>> {
        let Some(request) = self.delete_request(id, owner).await? else {
            return Ok(None);
        };
        let adjusted = self
            .adjust_participant_count(request.camp_id, request.id, CounterAdjustment::Decrement)
            .await;
        Ok(Some((request, adjusted)))
    }

    async fn mark_request_paid(&self, camp_id: Uuid, participant_name: &str) -> RepoResult<bool>;
    async fn mark_request_reviewed(&self, camp_id: Uuid, email: &str) -> RepoResult<bool>;
    async fn count_requests(&self, email: &str) -> RepoResult<i64>;

    // --- Payments ---
    async fn insert_payment(&self, payment: Payment) -> RepoResult<Payment>;
    async fn list_payments(&self, email: &str) -> RepoResult<Vec<Payment>>;
    async fn count_payments(&self, email: &str) -> RepoResult<i64>;

    // --- Reviews ---
    async fn insert_review(&self, review: Review) -> RepoResult<Review>;
    async fn list_reviews(&self) -> RepoResult<Vec<Review>>;
    async fn count_reviews(&self, email: &str) -> RepoResult<i64>;
}

/// RepositoryState
///
/// The store handle shared through the application state. Built once in `main`.
pub type RepositoryState = Arc<dyn Repository>;
