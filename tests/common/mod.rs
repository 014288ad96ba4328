#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use prepcore_server::db::{NewUser, User};
use prepcore_server::{AppState, MemoryStore, Settings, StripeClient, UserStore};
use std::sync::Arc;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "highschoolprep";

pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

/// State over a fresh in-memory store. The Stripe client is never reached by
/// these tests.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let settings = test_settings();
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StripeClient::new(&settings.stripe).expect("Failed to build client"));
    (AppState::from_parts(settings, store.clone(), provider), store)
}

pub async fn seed_user(store: &MemoryStore, email: &str, free_chance: i32) -> Uuid {
    let user = User::new(NewUser {
        name: "Seeded".into(),
        email: email.into(),
        password_hash: "unused".into(),
        image: None,
        o_auth: false,
        free_chance,
    });
    store.create_user(&user).await.expect("Failed to seed user").id
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.into_owned())
}
