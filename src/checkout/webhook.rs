//! Stripe webhook signature verification and event decoding.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the endpoint
//! secret. Verification must run on the exact bytes received.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::CheckoutError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, CheckoutError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    CheckoutError::InvalidWebhookSignature("unreadable timestamp".into())
                })?)
            }
            // Undecodable entries are skipped, the remaining ones may still match.
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| CheckoutError::InvalidWebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(CheckoutError::InvalidWebhookSignature("no v1 signature".into()));
    }
    Ok(ParsedHeader { timestamp, signatures })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Checks `header` against `payload` at time `now` (unix seconds). Signatures
/// older than `tolerance_secs` are rejected to bound replay.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), CheckoutError> {
    if secret.is_empty() {
        return Err(CheckoutError::InvalidWebhookSignature("webhook secret is not configured".into()));
    }
    let parsed = parse_header(header)?;

    let matched = parsed
        .signatures
        .iter()
        .any(|sig| mac_for(secret, parsed.timestamp, payload).verify_slice(sig).is_ok());
    if !matched {
        return Err(CheckoutError::InvalidWebhookSignature("no signature matches the payload".into()));
    }

    if tolerance_secs > 0 && (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(CheckoutError::InvalidWebhookSignature("timestamp outside the tolerance zone".into()));
    }
    Ok(())
}

/// Produces a header value the way Stripe does. Used to drive the webhook
/// endpoint from tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let digest = mac_for(secret, timestamp, payload).finalize().into_bytes();
    format!("t={},v1={}", timestamp, hex::encode(digest))
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, CheckoutError> {
        serde_json::from_slice(payload).map_err(|e| CheckoutError::MalformedEvent(e.to_string()))
    }

    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        match self.data.object.get("metadata")?.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Metadata attached at checkout creation, read back from a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPurchase {
    pub user_id: Uuid,
    pub package_name: String,
    pub package_price: i32,
}

impl CompletedPurchase {
    pub fn from_event(event: &WebhookEvent) -> Result<Self, CheckoutError> {
        let field = |key: &str| {
            event
                .metadata(key)
                .ok_or_else(|| CheckoutError::MalformedEvent(format!("metadata.{} missing", key)))
        };

        let user_id = Uuid::parse_str(&field("userId")?)
            .map_err(|e| CheckoutError::MalformedEvent(format!("metadata.userId: {}", e)))?;
        let package_price = field("packagePrice")?
            .parse::<i32>()
            .map_err(|e| CheckoutError::MalformedEvent(format!("metadata.packagePrice: {}", e)))?;

        Ok(Self {
            user_id,
            package_name: field("packageName")?,
            package_price,
        })
    }
}
