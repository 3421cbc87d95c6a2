//! REST-Handler fuer Ungelesen-Zaehler

use axum::{
    extract::{Extension, State},
    response::Json,
};

use agora_chat::UngelesenUebersicht;

use crate::{error::ApiResult, middleware::AuthSession, ApiState};

/// GET /v1/unread – Zaehler pro direkter Konversation und Summe
pub async fn get_unread(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
) -> ApiResult<Json<UngelesenUebersicht>> {
    Ok(Json(state.chat.ungelesen_uebersicht(&session).await?))
}
