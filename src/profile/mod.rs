//! Profile module
//!
//! Sanitized profile reads, the profile/password update form and per-unit
//! progress tracking.

pub mod handlers;

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::db::{NewPlayedSubUnit, PlayedSubUnit, ProfileUpdate, PublicUser, UserStore};
use crate::error::{AppError, AuthError, DatabaseError};

/// Fields submitted by the profile form. The password is only changed when
/// both the old and the new one are supplied.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub struct ProfileService {
    store: Arc<dyn UserStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, AppError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        let played = self.store.played_sub_units(user_id).await?;
        Ok(user.into_public(played))
    }

    pub async fn update_profile(&self, user_id: Uuid, form: ProfileForm) -> Result<PublicUser, AppError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if form.email.trim().is_empty() {
            return Err(AppError::ValidationError("email is required".into()));
        }

        let password_hash = match (form.old_password.as_deref(), form.new_password.as_deref()) {
            (Some(old), Some(new)) if !old.is_empty() && !new.is_empty() => {
                if !verify_password(old, &user.password_hash) {
                    return Err(AuthError::WrongOldPassword.into());
                }
                Some(hash_password(new)?)
            }
            _ => None,
        };
        let changed_password = password_hash.is_some();

        let update = ProfileUpdate {
            name: form.name,
            email: form.email,
            image: form.image,
            password_hash,
        };
        let updated = self
            .store
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                AppError::DatabaseError(DatabaseError::Duplicate) => AppError::EmailTaken,
                other => other,
            })?
            .ok_or(AppError::UserNotFound)?;

        info!("Updated profile for user {} (password changed: {})", user_id, changed_password);
        let played = self.store.played_sub_units(user_id).await?;
        Ok(updated.into_public(played))
    }

    pub async fn record_played_unit(
        &self,
        user_id: Uuid,
        unit: NewPlayedSubUnit,
    ) -> Result<PlayedSubUnit, AppError> {
        if self.store.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }
        self.store.record_played_unit(user_id, unit).await
    }

    pub async fn update_play_time(
        &self,
        user_id: Uuid,
        played_id: Uuid,
        played_time: i64,
    ) -> Result<(), AppError> {
        if played_time < 0 {
            return Err(AppError::ValidationError("time must not be negative".into()));
        }
        if self.store.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }
        if !self.store.update_play_time(user_id, played_id, played_time).await? {
            return Err(AppError::NotFound("SubUnit".into()));
        }
        Ok(())
    }
}
