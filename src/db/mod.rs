//! Database module for the HighSchoolPrep backend
//!
//! This module holds the user record types and the `UserStore` seam with its
//! Postgres and in-process implementations.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::MemoryStore;
pub use models::{NewPlayedSubUnit, NewUser, PlayedSubUnit, PremiumGrant, ProfileUpdate, PublicUser, User};
pub use operations::DbOperations;

/// Persistence for user accounts and their embedded progress records.
///
/// The store is the only shared mutable state in the service, so every method
/// that changes entitlement must be a single conditional write.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<User, AppError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Returns `None` if the user does not exist.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<User>, AppError>;

    /// Clears `is_premium` if the subscription has lapsed at `now`. Returns
    /// whether a row changed.
    async fn expire_premium(&self, id: Uuid, now: chrono::DateTime<chrono::Utc>) -> Result<bool, AppError>;

    /// Decrements `free_chance` only when it is positive and the user is not
    /// premium. Returns the remaining count, or `None` if nothing was consumed.
    async fn consume_free_chance(&self, id: Uuid) -> Result<Option<i32>, AppError>;

    /// Returns `false` if the user does not exist.
    async fn grant_premium(&self, id: Uuid, grant: &PremiumGrant) -> Result<bool, AppError>;

    async fn played_sub_units(&self, user_id: Uuid) -> Result<Vec<PlayedSubUnit>, AppError>;

    /// Returns the record for `unit.unit_id`, inserting it first if the user
    /// has none yet.
    async fn record_played_unit(&self, user_id: Uuid, unit: NewPlayedSubUnit) -> Result<PlayedSubUnit, AppError>;

    /// Returns `false` if no such record belongs to the user.
    async fn update_play_time(&self, user_id: Uuid, played_id: Uuid, played_time: i64) -> Result<bool, AppError>;
}
