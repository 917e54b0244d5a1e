use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Payment, Receipt, RecordPaymentRequest, RecordReviewRequest, Review},
    repository::{RepoResult, Repository},
};

/// record_payment
///
/// Appends the payment, then projects it onto the matching request. The append is the
/// only step that can fail the call: a missing or failing match must never block a
/// payment that the provider already took.
///
/// No duplicate check: the same participant may pay more than once.
pub async fn record_payment(
    repo: &dyn Repository,
    participant_email: &str,
    req: RecordPaymentRequest,
) -> Result<Receipt, AppError> {
    let payment = Payment {
        id: Uuid::new_v4(),
        participant_email: participant_email.to_string(),
        participant_name: req.participant_name,
        camp_id: req.camp_id,
        camp_name: req.camp_name,
        amount: req.amount,
        transaction_id: req.transaction_id,
        paid_at: Utc::now(),
    };

    let payment = repo.insert_payment(payment).await?;
    tracing::info!(payment_id = %payment.id, camp_id = %payment.camp_id, "payment recorded");

    let linked = project(
        "payment",
        payment.id,
        repo.mark_request_paid(payment.camp_id, &payment.participant_name)
            .await,
    );

    Ok(Receipt {
        inserted_id: payment.id,
        linked,
    })
}

/// record_review
///
/// Same shape as `record_payment` once the input is valid: insert unconditionally, then
/// flag the request for `(camp_id, email)` as reviewed on a best-effort basis. Reviews
/// are accepted whatever the request's confirmation state.
///
/// A rating outside 1..=5 is malformed input and fails with `InvalidInput` before
/// anything is written. It is not a linkage outcome.
pub async fn record_review(
    repo: &dyn Repository,
    email: &str,
    req: RecordReviewRequest,
) -> Result<Receipt, AppError> {
    if !(1..=5).contains(&req.rating) {
        return Err(AppError::InvalidInput(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let review = Review {
        id: Uuid::new_v4(),
        camp_id: req.camp_id,
        email: email.to_string(),
        reviewer_name: req.reviewer_name,
        rating: req.rating,
        feedback: req.feedback,
        created_at: Utc::now(),
    };

    let review = repo.insert_review(review).await?;
    tracing::info!(review_id = %review.id, camp_id = %review.camp_id, "review recorded");

    let linked = project(
        "review",
        review.id,
        repo.mark_request_reviewed(review.camp_id, &review.email)
            .await,
    );

    Ok(Receipt {
        inserted_id: review.id,
        linked,
    })
}

/// The projection step: attempted once, never retried, never surfaced.
fn project(kind: &'static str, record_id: Uuid, outcome: RepoResult<bool>) -> bool {
    match outcome {
        Ok(true) => true,
        Ok(false) => {
            tracing::info!(kind, %record_id, "no matching request to update");
            false
        }
        Err(e) => {
            tracing::warn!(kind, %record_id, error = %e, "request update failed, record kept");
            false
        }
    }
}
