use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checkout::webhook::SIGNATURE_HEADER;
use crate::checkout::WebhookAck;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub package_name: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub url: String,
}

pub async fn create_checkout_session(
    http: HttpRequest,
    req: web::Json<CheckoutSessionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = state.sessions.require_user_id(&http)?;
    info!("Checkout requested by user {} for {}", user_id, req.package_name);

    match state.checkout.create_checkout_session(&req.package_name, user_id).await {
        Ok(link) => Ok(HttpResponse::Created().json(CheckoutSessionResponse { url: link.url })),
        Err(e) => {
            error!("Checkout session failed for user {}: {}", user_id, e);
            Err(e)
        }
    }
}

/// Takes the body as raw bytes; the signature covers the exact payload.
pub async fn stripe_checkout_webhook(
    http: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let signature = http
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    match state.checkout.handle_webhook(&body, signature) {
        Ok(WebhookAck::Ignored { event_type }) => {
            info!("Ignoring webhook event of type {}", event_type);
        }
        // Detached; failures land in the dead-letter log.
        Ok(WebhookAck::Scheduled(_)) => {
            info!("Checkout completion acknowledged, entitlement update scheduled");
        }
        Err(e) => {
            warn!("Rejected webhook delivery: {}", e);
            return Err(e);
        }
    }

    Ok(HttpResponse::Ok().content_type("text/plain").body("Event received"))
}
