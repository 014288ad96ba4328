use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{NewPlayedSubUnit, PlayedSubUnit, PremiumGrant, ProfileUpdate, User};
use crate::db::UserStore;
use crate::error::{AppError, DatabaseError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    played: HashMap<Uuid, Vec<PlayedSubUnit>>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-process [`UserStore`] used for local development (`memory://`) and tests.
///
/// Every operation holds the write lock for its whole read-modify-write, which
/// gives the same per-row atomicity as the conditional SQL updates.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Overwrites entitlement fields directly, bypassing the checkout flow.
    pub async fn set_premium(
        &self,
        id: Uuid,
        is_premium: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(AppError::UserNotFound)?;
        user.is_premium = is_premium;
        user.expires_at = expires_at;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) || tables.users.contains_key(&user.id) {
            return Err(DatabaseError::Duplicate.into());
        }
        tables.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.email_taken(&update.email, Some(id)) {
            return Err(DatabaseError::Duplicate.into());
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = update.name.clone();
        user.email = update.email.clone();
        user.image = update.image.clone();
        if let Some(hash) = &update.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn expire_premium(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) if user.is_premium && user.expires_at.map_or(true, |at| at <= now) => {
                user.is_premium = false;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_free_chance(&self, id: Uuid) -> Result<Option<i32>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) if !user.is_premium && user.free_chance > 0 => {
                user.free_chance -= 1;
                user.updated_at = Utc::now();
                Ok(Some(user.free_chance))
            }
            _ => Ok(None),
        }
    }

    async fn grant_premium(&self, id: Uuid, grant: &PremiumGrant) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(false);
        };
        user.is_premium = true;
        user.package_name = Some(grant.package_name.clone());
        user.package_price = Some(grant.package_price);
        user.purchase_at = Some(grant.purchase_at);
        user.expires_at = Some(grant.expires_at);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn played_sub_units(&self, user_id: Uuid) -> Result<Vec<PlayedSubUnit>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .played
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_played_unit(&self, user_id: Uuid, unit: NewPlayedSubUnit) -> Result<PlayedSubUnit, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::UserNotFound);
        }
        let records = tables.played.entry(user_id).or_default();
        if let Some(existing) = records.iter().find(|r| r.unit_id == unit.unit_id) {
            return Ok(existing.clone());
        }
        let record = PlayedSubUnit::new(user_id, unit);
        records.push(record.clone());
        Ok(record)
    }

    async fn update_play_time(&self, user_id: Uuid, played_id: Uuid, played_time: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .played
            .get_mut(&user_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == played_id));
        match record {
            Some(record) => {
                record.played_time = played_time;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
