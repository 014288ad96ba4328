use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored account row, including the secret hash. Never serialized; use
/// [`PublicUser`] for anything leaving the process.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub o_auth: bool,
    pub is_premium: bool,
    pub package_name: Option<String>,
    pub package_price: Option<i32>,
    pub purchase_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub free_chance: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub o_auth: bool,
    pub free_chance: i32,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            image: new_user.image,
            o_auth: new_user.o_auth,
            is_premium: false,
            package_name: None,
            package_price: None,
            purchase_at: None,
            expires_at: None,
            free_chance: new_user.free_chance.max(0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Drops the hash and attaches progress records.
    pub fn into_public(self, played_sub_units: Vec<PlayedSubUnit>) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name,
            email: self.email,
            image: self.image,
            o_auth: self.o_auth,
            is_premium: self.is_premium,
            package_name: self.package_name,
            package_price: self.package_price,
            purchase_at: self.purchase_at,
            expires_at: self.expires_at,
            free_chance: self.free_chance,
            played_sub_units,
        }
    }
}

/// The sanitized user record: what clients see and what session tokens carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub o_auth: bool,
    pub is_premium: bool,
    pub package_name: Option<String>,
    pub package_price: Option<i32>,
    pub purchase_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub free_chance: i32,
    #[serde(default)]
    pub played_sub_units: Vec<PlayedSubUnit>,
}

/// Progress through one unit, owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlayedSubUnit {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub grade_name: String,
    pub subject_name: String,
    pub subject_id: String,
    pub unit_id: String,
    pub unit_name: String,
    pub played_time: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayedSubUnit {
    pub grade_name: String,
    pub subject_name: String,
    pub subject_id: String,
    pub unit_id: String,
    pub unit_name: String,
}

impl PlayedSubUnit {
    pub fn new(user_id: Uuid, unit: NewPlayedSubUnit) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            grade_name: unit.grade_name,
            subject_name: unit.subject_name,
            subject_id: unit.subject_id,
            unit_id: unit.unit_id,
            unit_name: unit.unit_name,
            played_time: 0,
            created_at: Utc::now(),
        }
    }
}

/// Profile fields written by the update form. `password_hash` is only set
/// when the user changed their password.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub password_hash: Option<String>,
}

/// Entitlement granted by a confirmed payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PremiumGrant {
    pub package_name: String,
    pub package_price: i32,
    pub purchase_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            image: None,
            o_auth: false,
            free_chance: 3,
        }
    }

    #[test]
    fn test_new_user_starts_without_premium() {
        let user = User::new(new_user());
        assert!(!user.is_premium);
        assert_eq!(user.free_chance, 3);
        assert!(user.expires_at.is_none());
    }

    #[test]
    fn test_public_user_has_no_secret() {
        let user = User::new(new_user());
        let json = serde_json::to_value(user.into_public(Vec::new())).unwrap();
        let text = json.to_string();
        assert!(!text.contains("argon2"));
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["oAuth"], false);
        assert_eq!(json["freeChance"], 3);
    }

    #[test]
    fn test_negative_free_chance_is_clamped() {
        let mut fields = new_user();
        fields.free_chance = -4;
        assert_eq!(User::new(fields).free_chance, 0);
    }
}
