//! Entitlement module
//!
//! Decides whether a user may consume one unit of paid content, expiring
//! lapsed subscriptions and spending free chances as a side effect.

pub mod handlers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{User, UserStore};
use crate::error::AppError;

/// Store writes can race with a concurrent purchase; re-read this many times
/// before settling on a decision.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessReason {
    SubscriptionValid,
    SubscriptionExpired,
    NoTokensLeft,
    TokenConsumed,
}

impl AccessReason {
    pub fn message(&self) -> &'static str {
        match self {
            AccessReason::SubscriptionValid => "Subscription is valid",
            AccessReason::SubscriptionExpired => "Subscription period reached",
            AccessReason::NoTokensLeft => "User dont have enough tokens",
            AccessReason::TokenConsumed => "Token deducted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub can_play: bool,
    pub reason: AccessReason,
    pub message: &'static str,
    /// Free chances left after this decision; absent for premium users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_chances_left: Option<i32>,
}

impl AccessDecision {
    fn new(reason: AccessReason, free_chances_left: Option<i32>) -> Self {
        Self {
            can_play: matches!(
                reason,
                AccessReason::SubscriptionValid | AccessReason::TokenConsumed
            ),
            reason,
            message: reason.message(),
            free_chances_left,
        }
    }
}

/// A subscription with no recorded expiry is treated as lapsed.
pub fn subscription_active(user: &User, now: DateTime<Utc>) -> bool {
    user.is_premium && user.expires_at.map_or(false, |expires| now < expires)
}

pub struct EntitlementEngine {
    store: Arc<dyn UserStore>,
}

impl EntitlementEngine {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn check_and_consume(&self, user_id: Uuid) -> Result<AccessDecision, AppError> {
        self.check_and_consume_at(user_id, Utc::now()).await
    }

    /// Every mutation is a conditional store write, so concurrent calls for
    /// one user never spend more free chances than they were granted.
    pub async fn check_and_consume_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AccessDecision, AppError> {
        let mut decision = None;
        for _ in 0..MAX_ATTEMPTS {
            let user = self
                .store
                .get_user_by_id(user_id)
                .await?
                .ok_or(AppError::UserNotFound)?;

            if user.is_premium {
                if subscription_active(&user, now) {
                    decision = Some(AccessDecision::new(AccessReason::SubscriptionValid, None));
                    break;
                }
                if self.store.expire_premium(user_id, now).await? {
                    info!("Subscription for user {} expired", user_id);
                    decision = Some(AccessDecision::new(AccessReason::SubscriptionExpired, None));
                    break;
                }
                // Renewed or already expired in between; look again.
                continue;
            }

            if let Some(left) = self.store.consume_free_chance(user_id).await? {
                decision = Some(AccessDecision::new(AccessReason::TokenConsumed, Some(left)));
                break;
            }
            if user.free_chance == 0 {
                decision = Some(AccessDecision::new(AccessReason::NoTokensLeft, Some(0)));
                break;
            }
            // The row changed under us (another consumer or a purchase).
        }

        let decision = match decision {
            Some(decision) => decision,
            None => {
                let user = self
                    .store
                    .get_user_by_id(user_id)
                    .await?
                    .ok_or(AppError::UserNotFound)?;
                if subscription_active(&user, now) {
                    AccessDecision::new(AccessReason::SubscriptionValid, None)
                } else {
                    AccessDecision::new(AccessReason::NoTokensLeft, Some(user.free_chance))
                }
            }
        };

        debug!("Access decision for user {}: {:?}", user_id, decision.reason);
        Ok(decision)
    }
}
