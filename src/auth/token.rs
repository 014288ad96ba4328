use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::PublicUser;
use crate::error::{AppError, AuthError};

/// Payload of a session token: the sanitized user as it was at sign-in, minus
/// the played-unit history so the cookie stays a fixed size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: PublicUser,
    pub iat: i64,
}

/// Signs and verifies HS256 session tokens. Tokens carry no expiry; a session
/// lasts until the cookie is cleared.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, user: &PublicUser) -> Result<String, AppError> {
        let claims = Claims {
            user: PublicUser {
                played_sub_units: Vec::new(),
                ..user.clone()
            },
            iat: Utc::now().timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("token signing failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken.into())
    }
}
