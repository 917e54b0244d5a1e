use super::{CountedWrite, RepoResult, Repository};
use crate::models::{
    Camp, CampRequest, CampSort, ConfirmationStatus, CounterAdjustment, CreateCampRequest,
    Payment, PaymentStatus, Review, ReviewStatus, UpdateCampRequest, UpdateUserRequest, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgExecutor, query_builder::QueryBuilder};
use uuid::Uuid;

const CAMP_COLUMNS: &str = "id, name, image, fee, scheduled_at, location, professional, \
     description, capacity, participant_count, created_at";

const REQUEST_COLUMNS: &str = "id, camp_id, camp_name, fee, participant_email, participant_name, \
     payment_status, confirmation_status, review_status, created_at";

/// PostgresRepository
///
/// The production store, backed by the schema in `migrations/`. The
/// `(participant_email, camp_id)` unique index on `requests` is what actually guarantees
/// one registration per pair under concurrent inserts.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Waits for in-flight queries and closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, contact, photo_url, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// insert_user_if_absent
    ///
    /// `ON CONFLICT DO NOTHING` on the email index makes the lookup and the insert
    /// a single idempotent statement.
    async fn insert_user_if_absent(&self, user: User) -> RepoResult<Option<User>> {
        let inserted = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, name, contact, photo_url, role)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (email) DO NOTHING
               RETURNING id, email, name, contact, photo_url, role"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.contact)
        .bind(&user.photo_url)
        .bind(&user.role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update_user(&self, email: &str, req: UpdateUserRequest) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET name = COALESCE($2, name),
                   contact = COALESCE($3, contact),
                   photo_url = COALESCE($4, photo_url)
               WHERE email = $1
               RETURNING id, email, name, contact, photo_url, role"#,
        )
        .bind(email)
        .bind(req.name)
        .bind(req.contact)
        .bind(req.photo_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // --- CAMPS ---

    async fn create_camp(&self, req: CreateCampRequest) -> RepoResult<Camp> {
        let sql = format!(
            r#"INSERT INTO camps (id, name, image, fee, scheduled_at, location, professional,
                                  description, capacity, participant_count, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, NOW())
               RETURNING {CAMP_COLUMNS}"#
        );
        let camp = sqlx::query_as::<_, Camp>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name)
            .bind(req.image)
            .bind(req.fee)
            .bind(req.scheduled_at)
            .bind(req.location)
            .bind(req.professional)
            .bind(req.description)
            .bind(req.capacity)
            .fetch_one(&self.pool)
            .await?;
        Ok(camp)
    }

    /// list_camps
    ///
    /// Search is a case-insensitive substring match over name, location and professional,
    /// built with QueryBuilder so the term is always bound, never interpolated.
    async fn list_camps(
        &self,
        search: Option<String>,
        sort: Option<CampSort>,
    ) -> RepoResult<Vec<Camp>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {CAMP_COLUMNS} FROM camps WHERE TRUE"));

        if let Some(s) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", s.trim());
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR location ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR professional ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(match sort {
            Some(CampSort::Fee) => " ORDER BY fee ASC",
            Some(CampSort::Participants) => " ORDER BY participant_count DESC",
            Some(CampSort::Name) => " ORDER BY name ASC",
            None => " ORDER BY created_at DESC",
        });

        let camps = builder.build_query_as::<Camp>().fetch_all(&self.pool).await?;
        Ok(camps)
    }

    async fn get_camp(&self, id: Uuid) -> RepoResult<Option<Camp>> {
        let sql = format!("SELECT {CAMP_COLUMNS} FROM camps WHERE id = $1");
        let camp = sqlx::query_as::<_, Camp>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(camp)
    }

    async fn update_camp(&self, id: Uuid, req: UpdateCampRequest) -> RepoResult<Option<Camp>> {
        let sql = format!(
            r#"UPDATE camps
               SET name = COALESCE($2, name),
                   image = COALESCE($3, image),
                   fee = COALESCE($4, fee),
                   scheduled_at = COALESCE($5, scheduled_at),
                   location = COALESCE($6, location),
                   professional = COALESCE($7, professional),
                   description = COALESCE($8, description),
                   capacity = COALESCE($9, capacity)
               WHERE id = $1
               RETURNING {CAMP_COLUMNS}"#
        );
        let camp = sqlx::query_as::<_, Camp>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.image)
            .bind(req.fee)
            .bind(req.scheduled_at)
            .bind(req.location)
            .bind(req.professional)
            .bind(req.description)
            .bind(req.capacity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(camp)
    }

    async fn delete_camp(&self, id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM camps WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn top_camps(&self, limit: i64) -> RepoResult<Vec<Camp>> {
        let sql = format!(
            "SELECT {CAMP_COLUMNS} FROM camps ORDER BY participant_count DESC, created_at DESC LIMIT $1"
        );
        let camps = sqlx::query_as::<_, Camp>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(camps)
    }

    async fn adjust_participant_count(
        &self,
        camp_id: Uuid,
        request_id: Uuid,
        adjustment: CounterAdjustment,
    ) -> RepoResult<bool> {
        apply_ledgered_adjustment(&self.pool, camp_id, request_id, adjustment).await
    }

    async fn reconcile_participant_count(&self, camp_id: Uuid) -> RepoResult<Option<(i64, i64)>> {
        // The CTE reads the pre-update snapshot, so `previous` is the drifted value.
        let row = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH previous AS (
                SELECT participant_count FROM camps WHERE id = $1
            )
            UPDATE camps c
            SET participant_count = (SELECT COUNT(*) FROM requests r WHERE r.camp_id = $1)
            FROM previous
            WHERE c.id = $1
            RETURNING previous.participant_count, c.participant_count
            "#,
        )
        .bind(camp_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // --- REQUESTS ---

    async fn find_request(&self, email: &str, camp_id: Uuid) -> RepoResult<Option<CampRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE participant_email = $1 AND camp_id = $2"
        );
        let request = sqlx::query_as::<_, CampRequest>(&sql)
            .bind(email)
            .bind(camp_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn insert_request(&self, request: CampRequest) -> RepoResult<CampRequest> {
        insert_request_row(&self.pool, request).await
    }

    async fn list_requests(&self) -> RepoResult<Vec<CampRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests ORDER BY created_at DESC");
        let requests = sqlx::query_as::<_, CampRequest>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    async fn list_requests_by_participant(&self, email: &str) -> RepoResult<Vec<CampRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE participant_email = $1 ORDER BY created_at DESC"
        );
        let requests = sqlx::query_as::<_, CampRequest>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;
        Ok(requests)
    }

    async fn confirm_request(&self, id: Uuid) -> RepoResult<Option<CampRequest>> {
        let sql = format!(
            "UPDATE requests SET confirmation_status = $2 WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
        );
        let request = sqlx::query_as::<_, CampRequest>(&sql)
            .bind(id)
            .bind(ConfirmationStatus::Confirmed)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn delete_request(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> RepoResult<Option<CampRequest>> {
        delete_request_row(&self.pool, id, owner).await
    }

    /// insert_request_counted
    ///
    /// Request row, ledger row and counter update commit together. A unique violation on
    /// the request rolls the whole unit back.
    async fn insert_request_counted(&self, request: CampRequest) -> RepoResult<CountedWrite> {
        let mut tx = self.pool.begin().await?;

        let inserted = insert_request_row(&mut *tx, request).await?;
        let adjusted = apply_ledgered_adjustment(
            &mut *tx,
            inserted.camp_id,
            inserted.id,
            CounterAdjustment::Increment,
        )
        .await?;

        tx.commit().await?;
        Ok((inserted, Ok(adjusted)))
    }

    async fn delete_request_counted(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> RepoResult<Option<CountedWrite>> {
        let mut tx = self.pool.begin().await?;

        let Some(deleted) = delete_request_row(&mut *tx, id, owner).await? else {
            return Ok(None);
        };
        let adjusted = apply_ledgered_adjustment(
            &mut *tx,
            deleted.camp_id,
            deleted.id,
            CounterAdjustment::Decrement,
        )
        .await?;

        tx.commit().await?;
        Ok(Some((deleted, Ok(adjusted))))
    }

    /// mark_request_paid
    ///
    /// Names are not unique, so a single request is picked: unpaid before paid, oldest first.
    async fn mark_request_paid(&self, camp_id: Uuid, participant_name: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE requests SET payment_status = $3
            WHERE id = (
                SELECT id FROM requests
                WHERE camp_id = $1 AND participant_name = $2
                ORDER BY payment_status ASC, created_at ASC
                LIMIT 1
            )
            "#,
        )
        .bind(camp_id)
        .bind(participant_name)
        .bind(PaymentStatus::Paid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_request_reviewed(&self, camp_id: Uuid, email: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE requests SET review_status = $3 WHERE camp_id = $1 AND participant_email = $2",
        )
        .bind(camp_id)
        .bind(email)
        .bind(ReviewStatus::Given)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_requests(&self, email: &str) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM requests WHERE participant_email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // --- PAYMENTS ---

    async fn insert_payment(&self, payment: Payment) -> RepoResult<Payment> {
        let inserted = sqlx::query_as::<_, Payment>(
            r#"INSERT INTO payments (id, participant_email, participant_name, camp_id, camp_name,
                                     amount, transaction_id, paid_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, participant_email, participant_name, camp_id, camp_name,
                         amount, transaction_id, paid_at"#,
        )
        .bind(payment.id)
        .bind(payment.participant_email)
        .bind(payment.participant_name)
        .bind(payment.camp_id)
        .bind(payment.camp_name)
        .bind(payment.amount)
        .bind(payment.transaction_id)
        .bind(payment.paid_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn list_payments(&self, email: &str) -> RepoResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"SELECT id, participant_email, participant_name, camp_id, camp_name,
                      amount, transaction_id, paid_at
               FROM payments WHERE participant_email = $1 ORDER BY paid_at DESC"#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn count_payments(&self, email: &str) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payments WHERE participant_email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // --- REVIEWS ---

    async fn insert_review(&self, review: Review) -> RepoResult<Review> {
        let inserted = sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews (id, camp_id, email, reviewer_name, rating, feedback, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, camp_id, email, reviewer_name, rating, feedback, created_at"#,
        )
        .bind(review.id)
        .bind(review.camp_id)
        .bind(review.email)
        .bind(review.reviewer_name)
        .bind(review.rating)
        .bind(review.feedback)
        .bind(review.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn list_reviews(&self) -> RepoResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"SELECT id, camp_id, email, reviewer_name, rating, feedback, created_at
               FROM reviews ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn count_reviews(&self, email: &str) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// --- Shared Statements ---

// Usable on the pool or inside a transaction.

/// The ledger insert and the counter update run as one statement: the counter only
/// moves when the `(request_id, adjustment)` ledger row is new.
async fn apply_ledgered_adjustment<'e, E: PgExecutor<'e>>(
    executor: E,
    camp_id: Uuid,
    request_id: Uuid,
    adjustment: CounterAdjustment,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        WITH tagged AS (
            INSERT INTO participant_count_ledger (request_id, adjustment, camp_id, applied_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (request_id, adjustment) DO NOTHING
            RETURNING camp_id
        )
        UPDATE camps SET participant_count = participant_count + $4
        WHERE id IN (SELECT camp_id FROM tagged)
        "#,
    )
    .bind(request_id)
    .bind(adjustment)
    .bind(camp_id)
    .bind(adjustment.delta())
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_request_row<'e, E: PgExecutor<'e>>(
    executor: E,
    request: CampRequest,
) -> RepoResult<CampRequest> {
    let sql = format!(
        r#"INSERT INTO requests ({REQUEST_COLUMNS})
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
           RETURNING {REQUEST_COLUMNS}"#
    );
    // A concurrent twin that slipped past the pre-check fails here with a unique
    // violation, which the From<sqlx::Error> impl maps to RepoError::UniqueViolation.
    let inserted = sqlx::query_as::<_, CampRequest>(&sql)
        .bind(request.id)
        .bind(request.camp_id)
        .bind(request.camp_name)
        .bind(request.fee)
        .bind(request.participant_email)
        .bind(request.participant_name)
        .bind(request.payment_status)
        .bind(request.confirmation_status)
        .bind(request.review_status)
        .bind(request.created_at)
        .fetch_one(executor)
        .await?;
    Ok(inserted)
}

/// With `owner` set, only that participant's request matches.
async fn delete_request_row<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    owner: Option<&str>,
) -> RepoResult<Option<CampRequest>> {
    let sql = format!(
        r#"DELETE FROM requests
           WHERE id = $1 AND ($2::TEXT IS NULL OR participant_email = $2)
           RETURNING {REQUEST_COLUMNS}"#
    );
    let deleted = sqlx::query_as::<_, CampRequest>(&sql)
        .bind(id)
        .bind(owner)
        .fetch_optional(executor)
        .await?;
    Ok(deleted)
}
