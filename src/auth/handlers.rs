use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::service::{ProviderIdentity, ProviderLogin, Session};
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderLoginRequest {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserRequest {
    pub user_id: Option<Uuid>,
}

fn session_response(
    mut builder: actix_web::HttpResponseBuilder,
    state: &AppState,
    session: &Session,
) -> HttpResponse {
    builder
        .cookie(state.sessions.session_cookie(session))
        .json(json!({ "success": true, "data": session.user }))
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for email: {}", req.email);
    let req = req.into_inner();

    match state
        .sessions
        .register(&req.name, &req.email, &req.password, req.image)
        .await
    {
        Ok(session) => {
            info!("Registration successful for email: {}", req.email);
            Ok(session_response(HttpResponse::Created(), &state, &session))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    match state.sessions.login(&req.email, &req.password).await {
        Ok(session) => {
            info!("Login successful for email: {}", req.email);
            Ok(session_response(HttpResponse::Ok(), &state, &session))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login_with_provider(
    req: web::Json<ProviderLoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received identity-provider login for email: {}", req.email);
    let req = req.into_inner();
    let identity = ProviderIdentity {
        name: req.name,
        email: req.email,
        image: req.image,
        subject_id: req.uid,
    };

    match state.sessions.login_or_register_via_identity_provider(identity).await? {
        ProviderLogin::Existing(session) => {
            Ok(session_response(HttpResponse::Ok(), &state, &session))
        }
        ProviderLogin::Registered(session) => {
            Ok(session_response(HttpResponse::Created(), &state, &session))
        }
    }
}

/// Always succeeds, with or without a session cookie.
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(state.sessions.logout_cookie())
        .json(json!({ "success": true, "message": "Cookie removed" }))
}

pub async fn check_user(
    http: HttpRequest,
    req: web::Json<CheckUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = req
        .user_id
        .ok_or_else(|| AppError::ValidationError("User id not provided in request body".into()))?;

    if state.sessions.require_user_id(&http)? != user_id {
        return Err(AuthError::SessionMismatch.into());
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "User is valid" })))
}
