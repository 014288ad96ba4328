//! Checkout module
//!
//! Creates hosted payment-processor checkout sessions and turns the
//! processor's signed "checkout completed" webhook into a premium grant.

pub mod catalog;
pub mod dead_letter;
pub mod handlers;
pub mod provider;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::{PremiumGrant, UserStore};
use crate::error::{AppError, CheckoutError};

pub use catalog::{find_package, Package, PACKAGES};
pub use dead_letter::{DeadLetterLog, FailedUpgrade};
pub use provider::{CheckoutRequest, HostedCheckout, PaymentProvider, StripeClient};
pub use webhook::{CompletedPurchase, WebhookEvent};

/// A created checkout: where to send the browser and what is being sold.
#[derive(Debug, Clone)]
pub struct CheckoutLink {
    pub url: String,
    pub package: &'static Package,
}

/// Outcome of a verified webhook delivery. Either way the provider is answered
/// immediately.
#[derive(Debug)]
pub enum WebhookAck {
    /// Event type this service does not act on.
    Ignored { event_type: String },
    /// Entitlement update running detached from the request.
    Scheduled(JoinHandle<()>),
}

pub struct CheckoutOrchestrator {
    store: Arc<dyn UserStore>,
    provider: Arc<dyn PaymentProvider>,
    dead_letters: Arc<DeadLetterLog>,
    currency: String,
    webhook_secret: String,
    signature_tolerance_secs: i64,
    client_origin: String,
}

impl CheckoutOrchestrator {
    pub fn new(
        store: Arc<dyn UserStore>,
        provider: Arc<dyn PaymentProvider>,
        dead_letters: Arc<DeadLetterLog>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            provider,
            dead_letters,
            currency: settings.stripe.currency.clone(),
            webhook_secret: settings.stripe.webhook_secret.clone(),
            signature_tolerance_secs: settings.stripe.signature_tolerance_secs,
            client_origin: settings.client.origin.trim_end_matches('/').to_string(),
        }
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterLog> {
        &self.dead_letters
    }

    pub async fn create_checkout_session(
        &self,
        package_name: &str,
        user_id: Uuid,
    ) -> Result<CheckoutLink, AppError> {
        let package = find_package(package_name)?;

        let success_url = Url::parse_with_params(
            &format!("{}/payment-completed", self.client_origin),
            &[("packageName", package.name)],
        )
        .map_err(|e| AppError::ConfigError(format!("invalid client origin: {}", e)))?;

        let request = CheckoutRequest {
            user_id,
            package_name: package.name.to_string(),
            package_price: package.price,
            product_name: package.product_name(),
            description: package.description.to_string(),
            currency: self.currency.clone(),
            unit_amount: package.unit_amount(),
            success_url: success_url.to_string(),
            cancel_url: format!("{}/payment-cancelled", self.client_origin),
        };

        let hosted = self.provider.create_checkout_session(&request).await?;
        let url = hosted.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            CheckoutError::PaymentProviderError("Url is not provided by stripe".into())
        })?;

        info!("Checkout session {} created for user {} ({})", hosted.id, user_id, package.name);
        Ok(CheckoutLink { url, package })
    }

    /// Verifies the signature over the raw body before anything else is
    /// looked at. A qualifying event is applied on a detached task so the
    /// caller can acknowledge without waiting on the store.
    pub fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, AppError> {
        self.handle_webhook_at(raw_body, signature, Utc::now())
    }

    pub fn handle_webhook_at(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookAck, AppError> {
        let signature = signature.ok_or_else(|| {
            CheckoutError::InvalidWebhookSignature("missing signature header".into())
        })?;
        webhook::verify_signature(
            raw_body,
            signature,
            &self.webhook_secret,
            now.timestamp(),
            self.signature_tolerance_secs,
        )?;

        let event = WebhookEvent::parse(raw_body)?;
        info!("Received webhook event {:?} of type {}", event.id, event.event_type);

        if !event.is_checkout_completed() {
            return Ok(WebhookAck::Ignored { event_type: event.event_type });
        }

        let store = self.store.clone();
        let dead_letters = self.dead_letters.clone();
        let handle = tokio::spawn(async move {
            apply_purchase(store.as_ref(), dead_letters.as_ref(), &event, now).await;
        });
        Ok(WebhookAck::Scheduled(handle))
    }
}

/// Applies a completed checkout to the user. Every failure is routed to the
/// dead-letter log; nothing is retried.
pub async fn apply_purchase(
    store: &dyn UserStore,
    dead_letters: &DeadLetterLog,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) {
    let fail = |reason: String| FailedUpgrade {
        event_id: event.id.clone(),
        user_id: event.metadata("userId"),
        package_name: event.metadata("packageName"),
        reason,
        failed_at: Utc::now(),
    };

    let purchase = match CompletedPurchase::from_event(event) {
        Ok(purchase) => purchase,
        Err(e) => return dead_letters.record(fail(e.to_string())).await,
    };

    let package = match find_package(&purchase.package_name) {
        Ok(package) => package,
        Err(e) => return dead_letters.record(fail(e.to_string())).await,
    };

    if purchase.package_price != package.price {
        warn!(
            "Webhook price {} differs from catalog price {} for {}",
            purchase.package_price, package.price, package.name
        );
    }

    let Some(expires_at) = package.expiry_from(now) else {
        return dead_letters.record(fail("expiry date out of range".into())).await;
    };

    let grant = PremiumGrant {
        package_name: package.name.to_string(),
        package_price: purchase.package_price,
        purchase_at: now,
        expires_at,
    };

    match store.grant_premium(purchase.user_id, &grant).await {
        Ok(true) => info!(
            "User {} upgraded to {} until {}",
            purchase.user_id, grant.package_name, grant.expires_at
        ),
        Ok(false) => dead_letters.record(fail("user not found".into())).await,
        Err(e) => dead_letters.record(fail(e.to_string())).await,
    }
}
