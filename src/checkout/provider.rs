use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::CheckoutError;

/// Everything the payment processor needs to host a one-off checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub package_name: String,
    pub package_price: i32,
    pub product_name: String,
    pub description: String,
    pub currency: String,
    pub unit_amount: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostedCheckout {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<HostedCheckout, CheckoutError>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Stripe Checkout over its form-encoded REST API.
pub struct StripeClient {
    http: Client,
    api_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, CheckoutError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]", request.product_name.clone()),
            ("line_items[0][price_data][product_data][description]", request.description.clone()),
            ("metadata[userId]", request.user_id.to_string()),
            ("metadata[packageName]", request.package_name.clone()),
            ("metadata[packagePrice]", request.package_price.to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ]
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<HostedCheckout, CheckoutError> {
        let res = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.api_key)
            .form(&Self::form(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("checkout session request failed with status {}", status));
            error!("Stripe rejected checkout session: {}", message);
            return Err(CheckoutError::PaymentProviderError(message));
        }

        let session: HostedCheckout = res.json().await?;
        info!("Created Stripe checkout session {}", session.id);
        Ok(session)
    }
}
