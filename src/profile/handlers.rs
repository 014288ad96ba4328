use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::db::NewPlayedSubUnit;
use crate::error::AppError;
use crate::profile::ProfileForm;
use crate::AppState;

pub async fn get_profile_data(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state.profiles.get_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Lets a signed-in user re-read their own record, e.g. after a purchase.
pub async fn update_user_membership(
    http: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    state.sessions.require_same_user(&http, user_id)?;
    let profile = state.profiles.get_profile(user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserForm {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn update_user_form(
    req: web::Json<UpdateUserForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    info!("Received profile update for user {}", req.user_id);
    let profile = state
        .profiles
        .update_profile(
            req.user_id,
            ProfileForm {
                name: req.name,
                email: req.email,
                image: req.image,
                old_password: req.old_password,
                new_password: req.new_password,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": profile })))
}

/// Anonymous visitors are not tracked and get a null id back.
pub async fn record_played_unit(
    http: HttpRequest,
    req: web::Json<NewPlayedSubUnit>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = state.sessions.token_from_request(&http);
    let Some(user_id) = state.sessions.current_user_id(token.as_deref())? else {
        return Ok(HttpResponse::Ok().json(json!({ "playedId": null })));
    };

    let record = state.profiles.record_played_unit(user_id, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "playedId": record.id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayTimeRequest {
    pub played_sub_units_id: Uuid,
    pub time: i64,
}

pub async fn update_play_time(
    http: HttpRequest,
    req: web::Json<PlayTimeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = state.sessions.require_user_id(&http)?;
    state
        .profiles
        .update_play_time(user_id, req.played_sub_units_id, req.time)
        .await?;
    let profile = state.profiles.get_profile(user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": profile })))
}
