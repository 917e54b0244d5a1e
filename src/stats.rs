use crate::{error::AppError, models::UserStats, repository::Repository};

/// stats_for
///
/// Three independent counts for one participant. Payments and reviews are append-only,
/// so they outlive withdrawn requests. The counts are not taken atomically; a write
/// landing between them can show a transient mismatch.
pub async fn stats_for(repo: &dyn Repository, email: &str) -> Result<UserStats, AppError> {
    let (request_count, payment_count, review_count) = tokio::try_join!(
        repo.count_requests(email),
        repo.count_payments(email),
        repo.count_reviews(email),
    )?;

    Ok(UserStats {
        request_count,
        payment_count,
        review_count,
    })
}
