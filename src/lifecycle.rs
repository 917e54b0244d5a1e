//! Request lifecycle engine.
//!
//! A request moves `unpaid/pending` → `paid/pending` → `paid/confirmed`, with
//! `review_status` as an independent flag. Every creation and deletion of a request is
//! paired with a counter adjustment on its camp. The two writes may be separate store
//! operations; the adjustment is keyed by request id so it can be replayed or
//! reconciled without double counting.
//!
//! Postgres commits the request write and the adjustment in one transaction and the
//! memory store applies both under one lock. The ledger keeps the two-step default safe
//! everywhere else.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        CampRequest, ConfirmationStatus, CounterAdjustment, PaymentStatus, Reconciliation,
        ReviewStatus, WithdrawOutcome,
    },
    repository::{RepoError, RepoResult, Repository},
};

/// Who is asking for a request to be withdrawn.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    /// The participant themselves; only their own requests are eligible.
    Participant(&'a str),
    /// An admin removing any request.
    Admin,
}

/// register
///
/// Creates the request for `(email, camp_id)` and bumps the camp's counter.
/// Returns `Ok(None)` when the camp does not exist.
pub async fn register(
    repo: &dyn Repository,
    email: &str,
    participant_name: &str,
    camp_id: Uuid,
) -> Result<Option<CampRequest>, AppError> {
    // Fast path for a friendly answer; the store's unique constraint is the real guard.
    if repo.find_request(email, camp_id).await?.is_some() {
        return Err(AppError::DuplicateRegistration);
    }

    let Some(camp) = repo.get_camp(camp_id).await? else {
        return Ok(None);
    };

    let request = CampRequest {
        id: Uuid::new_v4(),
        camp_id,
        camp_name: camp.name,
        fee: camp.fee,
        participant_email: email.to_string(),
        participant_name: participant_name.to_string(),
        payment_status: PaymentStatus::Unpaid,
        confirmation_status: ConfirmationStatus::Pending,
        review_status: ReviewStatus::NotGiven,
        created_at: Utc::now(),
    };

    let (request, adjusted) = match repo.insert_request_counted(request).await {
        Ok(written) => written,
        Err(RepoError::UniqueViolation) => {
            tracing::info!(%email, %camp_id, "concurrent duplicate registration rejected by store");
            return Err(AppError::DuplicateRegistration);
        }
        Err(e) => return Err(e.into()),
    };

    record_adjustment(&request, CounterAdjustment::Increment, adjusted);

    tracing::info!(request_id = %request.id, %camp_id, "participant registered");
    Ok(Some(request))
}

pub async fn list_all(repo: &dyn Repository) -> Result<Vec<CampRequest>, AppError> {
    Ok(repo.list_requests().await?)
}

pub async fn list_by_participant(
    repo: &dyn Repository,
    email: &str,
) -> Result<Vec<CampRequest>, AppError> {
    Ok(repo.list_requests_by_participant(email).await?)
}

/// confirm
///
/// Idempotent: confirming an already confirmed request returns it unchanged.
pub async fn confirm(
    repo: &dyn Repository,
    request_id: Uuid,
) -> Result<Option<CampRequest>, AppError> {
    let confirmed = repo.confirm_request(request_id).await?;
    if confirmed.is_some() {
        tracing::info!(%request_id, "request confirmed");
    }
    Ok(confirmed)
}

/// withdraw
///
/// Deletes the request and releases its seat. The counter is moved on the camp the
/// request actually belongs to; a disagreeing `camp_id` from the caller is only logged.
pub async fn withdraw(
    repo: &dyn Repository,
    request_id: Uuid,
    camp_id: Uuid,
    actor: Actor<'_>,
) -> Result<WithdrawOutcome, AppError> {
    let owner = match actor {
        Actor::Participant(email) => Some(email),
        Actor::Admin => None,
    };

    let Some((deleted, adjusted)) = repo.delete_request_counted(request_id, owner).await? else {
        return Ok(WithdrawOutcome::default());
    };

    if deleted.camp_id != camp_id {
        tracing::warn!(
            %request_id,
            requested_camp = %camp_id,
            stored_camp = %deleted.camp_id,
            "withdrawal camp id mismatch, using the stored camp"
        );
    }

    let adjusted = record_adjustment(&deleted, CounterAdjustment::Decrement, adjusted);

    tracing::info!(%request_id, admin = owner.is_none(), "request withdrawn");
    Ok(WithdrawOutcome {
        deleted_count: 1,
        participant_count_adjusted: adjusted,
    })
}

/// reconcile
///
/// Re-derives a camp's participant counter from the live request count.
pub async fn reconcile(
    repo: &dyn Repository,
    camp_id: Uuid,
) -> Result<Option<Reconciliation>, AppError> {
    let Some((previous, current)) = repo.reconcile_participant_count(camp_id).await? else {
        return Ok(None);
    };
    if previous != current {
        tracing::warn!(%camp_id, previous, current, "participant count drift corrected");
    }
    Ok(Some(Reconciliation {
        camp_id,
        previous,
        current,
    }))
}

/// Second half of a register/withdraw. The request write has already happened, so a
/// failed adjustment is flagged as drift instead of failing the caller.
fn record_adjustment(
    request: &CampRequest,
    adjustment: CounterAdjustment,
    outcome: RepoResult<bool>,
) -> bool {
    match outcome {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(
                request_id = %request.id,
                camp_id = %request.camp_id,
                ?adjustment,
                "participant count not adjusted: already applied or camp missing"
            );
            false
        }
        Err(e) => {
            tracing::error!(
                request_id = %request.id,
                camp_id = %request.camp_id,
                ?adjustment,
                error = %e,
                counter_drift = true,
                "participant count adjustment failed; camp needs reconciliation"
            );
            false
        }
    }
}
