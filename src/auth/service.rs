use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{
    hash_password, hash_provider_subject, verify_against_decoy, verify_password,
    verify_provider_subject,
};
use crate::auth::token::{Claims, TokenCodec};
use crate::config::Settings;
use crate::db::{NewUser, PublicUser, User, UserStore};
use crate::error::{AppError, AuthError, DatabaseError};

/// An authenticated session: the signed token to put in the cookie and the
/// sanitized user it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Profile asserted by a third-party identity provider.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub subject_id: String,
}

/// Result of an identity-provider sign-in.
#[derive(Debug, Clone)]
pub enum ProviderLogin {
    Existing(Session),
    Registered(Session),
}

impl ProviderLogin {
    pub fn session(&self) -> &Session {
        match self {
            ProviderLogin::Existing(s) | ProviderLogin::Registered(s) => s,
        }
    }
}

/// Issues and validates cookie-borne sessions on top of [`TokenCodec`] and the
/// user store.
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    cookie_name: String,
    secure_cookie: bool,
    default_free_chances: i32,
}

impl SessionManager {
    pub fn new(store: Arc<dyn UserStore>, settings: &Settings) -> Self {
        Self {
            store,
            codec: TokenCodec::new(&settings.auth.jwt_secret),
            cookie_name: settings.auth.cookie_name.clone(),
            secure_cookie: settings.is_production(),
            default_free_chances: settings.entitlement.default_free_chances,
        }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        image: Option<String>,
    ) -> Result<Session, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::ValidationError("email and password are required".into()));
        }
        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }

        let user = User::new(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            image,
            o_auth: false,
            free_chance: self.default_free_chances,
        });
        let created = self.insert(&user).await?;
        info!("Registered user {}", created.id);
        self.issue(created).await
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user = match self.store.get_user_by_email(email).await? {
            Some(user) if verify_password(password, &user.password_hash) => user,
            Some(_) => return Err(AuthError::InvalidCredentials.into()),
            None => {
                verify_against_decoy(password);
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        self.issue(user).await
    }

    /// Signs in an existing account by its provider subject id, or creates one
    /// flagged `o_auth` whose stored hash is derived from that id.
    pub async fn login_or_register_via_identity_provider(
        &self,
        identity: ProviderIdentity,
    ) -> Result<ProviderLogin, AppError> {
        if let Some(user) = self.store.get_user_by_email(&identity.email).await? {
            if !verify_provider_subject(&identity.subject_id, &user.password_hash) {
                warn!("Provider subject did not match stored credential for user {}", user.id);
                return Err(AuthError::ProviderSubjectMismatch.into());
            }
            return Ok(ProviderLogin::Existing(self.issue(user).await?));
        }

        let user = User::new(NewUser {
            name: identity.name,
            email: identity.email,
            password_hash: hash_provider_subject(&identity.subject_id)?,
            image: identity.image,
            o_auth: true,
            free_chance: self.default_free_chances,
        });
        let created = self.insert(&user).await?;
        info!("Registered identity-provider user {}", created.id);
        Ok(ProviderLogin::Registered(self.issue(created).await?))
    }

    /// `None` when no token was presented; a present but bad token is an error.
    pub fn current_user_id(&self, token: Option<&str>) -> Result<Option<Uuid>, AppError> {
        match token {
            None => Ok(None),
            Some(token) => Ok(Some(self.codec.verify(token)?.user.id)),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        self.codec.verify(token)
    }

    pub fn token_from_request(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// The session's user id, or `MissingSession` when there is no cookie.
    pub fn require_user_id(&self, req: &HttpRequest) -> Result<Uuid, AppError> {
        let token = self.token_from_request(req);
        self.current_user_id(token.as_deref())?
            .ok_or_else(|| AuthError::MissingSession.into())
    }

    /// Fails with `SessionMismatch` unless the session belongs to `user_id`.
    pub fn require_same_user(&self, req: &HttpRequest, user_id: Uuid) -> Result<(), AppError> {
        if self.require_user_id(req)? != user_id {
            return Err(AuthError::SessionMismatch.into());
        }
        Ok(())
    }

    pub fn session_cookie(&self, session: &Session) -> Cookie<'static> {
        self.cookie(session.token.clone())
    }

    /// A cookie that blanks the session value. Safe to send with no session.
    pub fn logout_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.cookie(String::new());
        cookie.make_removal();
        cookie
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), value)
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::None)
            .finish()
    }

    async fn insert(&self, user: &User) -> Result<User, AppError> {
        self.store.create_user(user).await.map_err(|e| match e {
            AppError::DatabaseError(DatabaseError::Duplicate) => AppError::EmailTaken,
            other => other,
        })
    }

    async fn issue(&self, user: User) -> Result<Session, AppError> {
        let played = self.store.played_sub_units(user.id).await?;
        let user = user.into_public(played);
        let token = self.codec.sign(&user)?;
        Ok(Session { token, user })
    }
}
