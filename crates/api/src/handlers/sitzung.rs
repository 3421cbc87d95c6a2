//! REST-Handler fuer die eigene Sitzung

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use crate::{middleware::AuthSession, ApiState};

/// GET /v1/session – wer bin ich, wie lange noch
pub async fn get_session(Extension(AuthSession(session)): Extension<AuthSession>) -> Json<Value> {
    Json(json!({
        "user_id": session.user_id,
        "expires_at": session.laeuft_ab_am,
    }))
}

/// DELETE /v1/session – nur dieses Token abmelden
pub async fn logout(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
) -> StatusCode {
    state.sessions.invalidieren(&session.token).await;
    StatusCode::NO_CONTENT
}

/// DELETE /v1/sessions – auf allen Geraeten abmelden
pub async fn logout_all(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
) -> Json<Value> {
    let beendet = state.sessions.benutzer_abmelden(session.user_id).await;
    Json(json!({ "ended": beendet }))
}
