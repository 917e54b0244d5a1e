use super::{CountedWrite, RepoError, RepoResult, Repository};
use crate::models::{
    Camp, CampRequest, CampSort, ConfirmationStatus, CounterAdjustment, CreateCampRequest,
    Payment, PaymentStatus, Review, ReviewStatus, UpdateCampRequest, UpdateUserRequest, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    camps: Vec<Camp>,
    requests: Vec<CampRequest>,
    payments: Vec<Payment>,
    reviews: Vec<Review>,
    ledger: HashSet<(Uuid, CounterAdjustment)>,
}

impl Collections {
    fn push_request(&mut self, request: &CampRequest) -> RepoResult<()> {
        if self.requests.iter().any(|r| {
            r.participant_email == request.participant_email && r.camp_id == request.camp_id
        }) {
            return Err(RepoError::UniqueViolation);
        }
        self.requests.push(request.clone());
        Ok(())
    }

    fn remove_request(&mut self, id: Uuid, owner: Option<&str>) -> Option<CampRequest> {
        let position = self
            .requests
            .iter()
            .position(|r| r.id == id && owner.is_none_or(|o| r.participant_email == o));
        position.map(|i| self.requests.remove(i))
    }

    /// Applies the adjustment once per `(request_id, adjustment)`.
    fn apply_adjustment(
        &mut self,
        camp_id: Uuid,
        request_id: Uuid,
        adjustment: CounterAdjustment,
    ) -> bool {
        if !self.ledger.insert((request_id, adjustment)) {
            return false;
        }
        match self.camps.iter_mut().find(|camp| camp.id == camp_id) {
            Some(camp) => {
                camp.participant_count += adjustment.delta();
                true
            }
            None => false,
        }
    }
}

/// MemoryRepository
///
/// A process-local store with the same observable rules as `PostgresRepository`,
/// including the `(participant_email, camp_id)` uniqueness check, which runs under the
/// write lock so concurrent inserts cannot both pass it.
///
/// Selected with `STORE_BACKEND=memory` for local runs, and used as the test double.
#[derive(Default)]
pub struct MemoryRepository {
    collections: RwLock<Collections>,
    /// When true, the request updates made by the payment/review projections fail,
    /// simulating a store fault after the record itself was written.
    pub failing_projections: bool,
    /// When true, participant counter adjustments fail after the request write,
    /// leaving the counter drifted until reconciliation.
    pub failing_adjustments: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_failing_projections() -> Self {
        Self {
            failing_projections: true,
            ..Self::default()
        }
    }

    pub fn new_with_failing_adjustments() -> Self {
        Self {
            failing_adjustments: true,
            ..Self::default()
        }
    }

    /// Number of payment records, regardless of owner.
    pub async fn payment_total(&self) -> usize {
        self.collections.read().await.payments.len()
    }

    pub async fn request_total(&self) -> usize {
        self.collections.read().await.requests.len()
    }

    pub async fn camp_total(&self) -> usize {
        self.collections.read().await.camps.len()
    }

    fn adjustment_fault(&self) -> RepoResult<()> {
        if self.failing_adjustments {
            return Err(RepoError::Unavailable(
                "simulated counter failure".to_string(),
            ));
        }
        Ok(())
    }

    fn projection_fault(&self) -> RepoResult<()> {
        if self.failing_projections {
            return Err(RepoError::Unavailable(
                "simulated projection failure".to_string(),
            ));
        }
        Ok(())
    }
}

fn contains_ignore_case(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(needle))
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS ---

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let c = self.collections.read().await;
        Ok(c.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user_if_absent(&self, user: User) -> RepoResult<Option<User>> {
        let mut c = self.collections.write().await;
        if c.users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }
        c.users.push(user.clone());
        Ok(Some(user))
    }

    async fn update_user(&self, email: &str, req: UpdateUserRequest) -> RepoResult<Option<User>> {
        let mut c = self.collections.write().await;
        let Some(user) = c.users.iter_mut().find(|u| u.email == email) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            user.name = Some(name);
        }
        if let Some(contact) = req.contact {
            user.contact = Some(contact);
        }
        if let Some(photo_url) = req.photo_url {
            user.photo_url = Some(photo_url);
        }
        Ok(Some(user.clone()))
    }

    // --- CAMPS ---

    async fn create_camp(&self, req: CreateCampRequest) -> RepoResult<Camp> {
        let camp = Camp {
            id: Uuid::new_v4(),
            name: req.name,
            image: req.image,
            fee: req.fee,
            scheduled_at: req.scheduled_at,
            location: req.location,
            professional: req.professional,
            description: req.description,
            capacity: req.capacity,
            participant_count: 0,
            created_at: Utc::now(),
        };
        self.collections.write().await.camps.push(camp.clone());
        Ok(camp)
    }

    async fn list_camps(
        &self,
        search: Option<String>,
        sort: Option<CampSort>,
    ) -> RepoResult<Vec<Camp>> {
        let c = self.collections.read().await;
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut camps: Vec<Camp> = c
            .camps
            .iter()
            .filter(|camp| match &needle {
                Some(n) => {
                    camp.name.to_lowercase().contains(n)
                        || contains_ignore_case(camp.location.as_deref(), n)
                        || contains_ignore_case(camp.professional.as_deref(), n)
                }
                None => true,
            })
            .cloned()
            .collect();

        match sort {
            Some(CampSort::Fee) => camps.sort_by(|a, b| a.fee.total_cmp(&b.fee)),
            Some(CampSort::Participants) => {
                camps.sort_by(|a, b| b.participant_count.cmp(&a.participant_count))
            }
            Some(CampSort::Name) => camps.sort_by(|a, b| a.name.cmp(&b.name)),
            None => camps.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        Ok(camps)
    }

    async fn get_camp(&self, id: Uuid) -> RepoResult<Option<Camp>> {
        let c = self.collections.read().await;
        Ok(c.camps.iter().find(|camp| camp.id == id).cloned())
    }

    async fn update_camp(&self, id: Uuid, req: UpdateCampRequest) -> RepoResult<Option<Camp>> {
        let mut c = self.collections.write().await;
        let Some(camp) = c.camps.iter_mut().find(|camp| camp.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            camp.name = name;
        }
        if let Some(fee) = req.fee {
            camp.fee = fee;
        }
        if req.image.is_some() {
            camp.image = req.image;
        }
        if req.scheduled_at.is_some() {
            camp.scheduled_at = req.scheduled_at;
        }
        if req.location.is_some() {
            camp.location = req.location;
        }
        if req.professional.is_some() {
            camp.professional = req.professional;
        }
        if req.description.is_some() {
            camp.description = req.description;
        }
        if req.capacity.is_some() {
            camp.capacity = req.capacity;
        }
        Ok(Some(camp.clone()))
    }

    async fn delete_camp(&self, id: Uuid) -> RepoResult<u64> {
        let mut c = self.collections.write().await;
        let before = c.camps.len();
        c.camps.retain(|camp| camp.id != id);
        Ok((before - c.camps.len()) as u64)
    }

    async fn top_camps(&self, limit: i64) -> RepoResult<Vec<Camp>> {
        let mut camps = self.list_camps(None, None).await?;
        // Stable sort keeps newest-first among equal counts.
        camps.sort_by(|a, b| b.participant_count.cmp(&a.participant_count));
        camps.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(camps)
    }

    async fn adjust_participant_count(
        &self,
        camp_id: Uuid,
        request_id: Uuid,
        adjustment: CounterAdjustment,
    ) -> RepoResult<bool> {
        self.adjustment_fault()?;
        let mut c = self.collections.write().await;
        Ok(c.apply_adjustment(camp_id, request_id, adjustment))
    }

    async fn reconcile_participant_count(&self, camp_id: Uuid) -> RepoResult<Option<(i64, i64)>> {
        let mut c = self.collections.write().await;
        let live = c.requests.iter().filter(|r| r.camp_id == camp_id).count() as i64;
        let Some(camp) = c.camps.iter_mut().find(|camp| camp.id == camp_id) else {
            return Ok(None);
        };
        let previous = camp.participant_count;
        camp.participant_count = live;
        Ok(Some((previous, live)))
    }

    // --- REQUESTS ---

    async fn find_request(&self, email: &str, camp_id: Uuid) -> RepoResult<Option<CampRequest>> {
        let c = self.collections.read().await;
        Ok(c.requests
            .iter()
            .find(|r| r.participant_email == email && r.camp_id == camp_id)
            .cloned())
    }

    async fn insert_request(&self, request: CampRequest) -> RepoResult<CampRequest> {
        self.collections.write().await.push_request(&request)?;
        Ok(request)
    }

    async fn list_requests(&self) -> RepoResult<Vec<CampRequest>> {
        let c = self.collections.read().await;
        let mut requests = c.requests.clone();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_requests_by_participant(&self, email: &str) -> RepoResult<Vec<CampRequest>> {
        let mut requests = self.list_requests().await?;
        requests.retain(|r| r.participant_email == email);
        Ok(requests)
    }

    async fn confirm_request(&self, id: Uuid) -> RepoResult<Option<CampRequest>> {
        let mut c = self.collections.write().await;
        let Some(request) = c.requests.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        request.confirmation_status = ConfirmationStatus::Confirmed;
        Ok(Some(request.clone()))
    }

    async fn delete_request(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> RepoResult<Option<CampRequest>> {
        Ok(self.collections.write().await.remove_request(id, owner))
    }

    // The request write and its adjustment share one write guard, so a reconcile
    // never observes the request without its counter change.
    async fn insert_request_counted(&self, request: CampRequest) -> RepoResult<CountedWrite> {
        let mut c = self.collections.write().await;
        c.push_request(&request)?;
        let adjusted = self.adjustment_fault().map(|()| {
            c.apply_adjustment(request.camp_id, request.id, CounterAdjustment::Increment)
        });
        Ok((request, adjusted))
    }

    async fn delete_request_counted(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> RepoResult<Option<CountedWrite>> {
        let mut c = self.collections.write().await;
        let Some(request) = c.remove_request(id, owner) else {
            return Ok(None);
        };
        let adjusted = self.adjustment_fault().map(|()| {
            c.apply_adjustment(request.camp_id, request.id, CounterAdjustment::Decrement)
        });
        Ok(Some((request, adjusted)))
    }

    async fn mark_request_paid(&self, camp_id: Uuid, participant_name: &str) -> RepoResult<bool> {
        self.projection_fault()?;
        let mut c = self.collections.write().await;
        let target = c
            .requests
            .iter_mut()
            .filter(|r| r.camp_id == camp_id && r.participant_name == participant_name)
            .min_by_key(|r| (r.payment_status == PaymentStatus::Paid, r.created_at));
        match target {
            Some(request) => {
                request.payment_status = PaymentStatus::Paid;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_request_reviewed(&self, camp_id: Uuid, email: &str) -> RepoResult<bool> {
        self.projection_fault()?;
        let mut c = self.collections.write().await;
        let mut matched = false;
        for request in c
            .requests
            .iter_mut()
            .filter(|r| r.camp_id == camp_id && r.participant_email == email)
        {
            request.review_status = ReviewStatus::Given;
            matched = true;
        }
        Ok(matched)
    }

    async fn count_requests(&self, email: &str) -> RepoResult<i64> {
        let c = self.collections.read().await;
        Ok(c.requests
            .iter()
            .filter(|r| r.participant_email == email)
            .count() as i64)
    }

    // --- PAYMENTS ---

    async fn insert_payment(&self, payment: Payment) -> RepoResult<Payment> {
        self.collections.write().await.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_payments(&self, email: &str) -> RepoResult<Vec<Payment>> {
        let c = self.collections.read().await;
        let mut payments: Vec<Payment> = c
            .payments
            .iter()
            .filter(|p| p.participant_email == email)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }

    async fn count_payments(&self, email: &str) -> RepoResult<i64> {
        let c = self.collections.read().await;
        Ok(c.payments
            .iter()
            .filter(|p| p.participant_email == email)
            .count() as i64)
    }

    // --- REVIEWS ---

    async fn insert_review(&self, review: Review) -> RepoResult<Review> {
        self.collections.write().await.reviews.push(review.clone());
        Ok(review)
    }

    async fn list_reviews(&self) -> RepoResult<Vec<Review>> {
        let c = self.collections.read().await;
        let mut reviews = c.reviews.clone();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn count_reviews(&self, email: &str) -> RepoResult<i64> {
        let c = self.collections.read().await;
        Ok(c.reviews.iter().filter(|r| r.email == email).count() as i64)
    }
}
