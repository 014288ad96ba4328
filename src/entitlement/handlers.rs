use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductRequest {
    pub user_id: Uuid,
}

pub async fn deduct_free_token(
    req: web::Json<DeductRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let decision = state.entitlements.check_and_consume(req.user_id).await?;
    info!(
        "Entitlement check for user {}: can_play={} reason={:?}",
        req.user_id, decision.can_play, decision.reason
    );
    Ok(HttpResponse::Ok().json(decision))
}
