use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

/// Message returned for every failure the client is not allowed to see the details of.
pub const GENERIC_FAILURE: &str = "Something went wrong";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Checkout error: {0}")]
    CheckoutError(#[from] CheckoutError),

    #[error("User not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(String),

    #[error("This email already used")]
    EmailTaken,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // The only foreign keys point at `users`.
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => AppError::UserNotFound,
            _ => AppError::DatabaseError(err.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::MigrationError(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl AppError {
    /// The text placed in the response body. Server-side faults collapse to
    /// [`GENERIC_FAILURE`] so store and config details never reach the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::Hashing(_)) => GENERIC_FAILURE.to_string(),
            AppError::AuthError(e) => e.to_string(),
            AppError::CheckoutError(CheckoutError::InvalidWebhookSignature(_)) => {
                "Invalid webhook signature".to_string()
            }
            AppError::CheckoutError(e) => e.to_string(),
            AppError::UserNotFound
            | AppError::NotFound(_)
            | AppError::EmailTaken
            | AppError::ValidationError(_) => self.to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => {
                AppError::EmailTaken.to_string()
            }
            AppError::DatabaseError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({
            "success": false,
            "message": self.public_message(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::ProviderSubjectMismatch => StatusCode::UNAUTHORIZED,
                AuthError::WrongOldPassword => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::MissingSession => StatusCode::UNAUTHORIZED,
                AuthError::SessionMismatch => StatusCode::FORBIDDEN,
                AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::CheckoutError(e) => match e {
                CheckoutError::UnknownPackage(_) => StatusCode::BAD_REQUEST,
                CheckoutError::InvalidWebhookSignature(_) => StatusCode::BAD_REQUEST,
                CheckoutError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
                CheckoutError::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// Deliberately identical for unknown email and wrong password.
    #[error("Email or password is wrong")]
    InvalidCredentials,

    /// Identity-provider subject did not match the stored credential. Shown to
    /// the client exactly like `InvalidCredentials`.
    #[error("Email or password is wrong")]
    ProviderSubjectMismatch,

    #[error("Old password is wrong")]
    WrongOldPassword,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session cookie not found")]
    MissingSession,

    #[error("User id does not match the session")]
    SessionMismatch,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Wrong package name: {0}")]
    UnknownPackage(String),

    #[error("Payment provider error: {0}")]
    PaymentProviderError(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidWebhookSignature(String),

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::PaymentProviderError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
