use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// GatewayError
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider rejected the request: {0}")]
    Provider(String),

    #[error("unreadable provider response: {0}")]
    Decode(String),
}

// 1. PaymentGateway Contract
/// PaymentGateway
///
/// The payment-processing collaborator. It takes an amount and currency and hands back
/// the handle the client uses to confirm the charge. Calls are synchronous
/// request/response and are never retried here.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount_cents` in `currency` and returns its client
    /// secret.
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<String, GatewayError>;
}

/// Converts a price in major units into the provider's minor units (cents).
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

// 2. The Real Implementation (Stripe)
/// StripePaymentGateway
///
/// Talks to the Stripe REST API with a form-encoded body and the secret key as the
/// basic-auth user.
#[derive(Clone)]
pub struct StripePaymentGateway {
    http_client: reqwest::Client,
    secret_key: String,
    api_base_url: String,
}

#[derive(Deserialize)]
struct StripePaymentIntent {
    client_secret: Option<String>,
}

impl StripePaymentGateway {
    pub fn new(secret_key: &str, api_base_url: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/v1/payment_intents", self.api_base_url);
        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("payment_method_types[]", "card".to_string()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe create_payment_intent failed");
            return Err(GatewayError::Provider(error_text));
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        intent
            .client_secret
            .ok_or_else(|| GatewayError::Decode("missing client_secret".to_string()))
    }
}

// 3. The Mock Implementation (For Tests and Local Runs)
/// MockPaymentGateway
///
/// Returns a deterministic client secret derived from the amount, or a provider error
/// when `should_fail` is set.
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    pub should_fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<String, GatewayError> {
        if self.should_fail {
            return Err(GatewayError::Provider(
                "Mock Gateway Error: Simulation requested".to_string(),
            ));
        }
        Ok(format!("pi_mock_{amount_cents}_{currency}_secret_fake"))
    }
}

/// GatewayState
///
/// The payment collaborator as shared through the application state.
pub type GatewayState = Arc<dyn PaymentGateway>;
