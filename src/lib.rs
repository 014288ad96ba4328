pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod entitlement;
pub mod error;
pub mod profile;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{web, HttpResponse};
use tracing::{debug, info};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{SessionManager, TokenCodec};
pub use checkout::{CheckoutOrchestrator, DeadLetterLog, PaymentProvider, StripeClient};
pub use db::{DbOperations, MemoryStore, PublicUser, User, UserStore};
pub use entitlement::EntitlementEngine;
pub use profile::ProfileService;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub entitlements: Arc<EntitlementEngine>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    /// Connects the configured store (running migrations for Postgres) and the
    /// Stripe client.
    pub async fn new(config: Settings) -> Result<Self> {
        let store: Arc<dyn UserStore> = if config.database.is_in_memory() {
            info!("Using in-memory user store");
            Arc::new(MemoryStore::new())
        } else {
            let db = DbOperations::new_with_options(
                &config.database.url,
                config.database.max_connections,
                Duration::from_secs(5),
            )
            .await?;
            db.migrate().await?;
            Arc::new(db)
        };

        let provider = Arc::new(StripeClient::new(&config.stripe)?);
        Ok(Self::from_parts(config, store, provider))
    }

    /// Wires services around an existing store and payment provider.
    pub fn from_parts(
        config: Settings,
        store: Arc<dyn UserStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let sessions = SessionManager::new(store.clone(), &config);
        let checkout = CheckoutOrchestrator::new(
            store.clone(),
            provider,
            Arc::new(DeadLetterLog::default()),
            &config,
        );

        Self {
            sessions: Arc::new(sessions),
            entitlements: Arc::new(EntitlementEngine::new(store.clone())),
            checkout: Arc::new(checkout),
            profiles: Arc::new(ProfileService::new(store)),
            config: Arc::new(config),
        }
    }
}

/// Registers every HTTP route.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    use auth::handlers as auth_handlers;
    use checkout::handlers as checkout_handlers;
    use entitlement::handlers as entitlement_handlers;
    use profile::handlers as profile_handlers;

    // Extractor rejections go out in the same JSON shape as handler errors.
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        debug!("Rejected request body: {}", err);
        AppError::ValidationError("invalid request body".into()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        debug!("Rejected path parameter: {}", err);
        AppError::UserNotFound.into()
    }));

    cfg.route("/health", web::get().to(health_check))
        .route("/create-user", web::post().to(auth_handlers::register))
        .route("/get-user", web::post().to(auth_handlers::login))
        .route("/create-user-google", web::post().to(auth_handlers::login_with_provider))
        .route("/logout-user", web::delete().to(auth_handlers::logout))
        .route("/check-user", web::post().to(auth_handlers::check_user))
        .route("/get-profile-data/{user_id}", web::get().to(profile_handlers::get_profile_data))
        .route("/update-user-membership/{user_id}", web::get().to(profile_handlers::update_user_membership))
        .route("/update-user-form", web::post().to(profile_handlers::update_user_form))
        .route("/record-played-unit", web::post().to(profile_handlers::record_played_unit))
        .route("/update-play-time", web::post().to(profile_handlers::update_play_time))
        .route("/detuct-free-token", web::post().to(entitlement_handlers::deduct_free_token))
        .route("/create-checkout-session", web::post().to(checkout_handlers::create_checkout_session))
        .route("/stripe-checkout-webhook", web::post().to(checkout_handlers::stripe_checkout_webhook));
}
