//! REST-Handler fuer Konversations-Endpunkte

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use agora_chat::{
    BeitrittsStatus, ErstellteKonversation, Konversation, KonversationAenderung,
    NeueKonversationAnfrage, Teilnehmer,
};

use crate::{
    error::{ApiError, ApiResult},
    extract::{JsonBody, Pfad},
    middleware::AuthSession,
    ApiState,
};

pub async fn list_conversations(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
) -> ApiResult<Json<Vec<Konversation>>> {
    Ok(Json(state.konversationen.auflisten(&session).await?))
}

pub async fn create_conversation(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    JsonBody(body): JsonBody<NeueKonversationAnfrage>,
) -> ApiResult<(StatusCode, Json<ErstellteKonversation>)> {
    let erstellt = state.konversationen.erstellen(&session, body).await?;
    Ok((StatusCode::CREATED, Json(erstellt)))
}

pub async fn get_conversation(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<Json<Konversation>> {
    Ok(Json(state.konversationen.laden(&session, id).await?))
}

pub async fn update_conversation(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    JsonBody(body): JsonBody<KonversationAenderung>,
) -> ApiResult<Json<Konversation>> {
    Ok(Json(state.konversationen.aktualisieren(&session, id, body).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BeitretenBody {
    /// Anderen Benutzer hinzufuegen (nur Admins); fehlt = selbst beitreten
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BeitrittAntwort {
    pub participant: Teilnehmer,
    pub status: BeitrittsStatus,
}

/// POST /v1/conversations/:id/join – der Body ist optional
pub async fn join_conversation(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BeitrittAntwort>)> {
    let body: BeitretenBody = if body.iter().all(u8::is_ascii_whitespace) {
        BeitretenBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::UngueltigeEingabe(format!("Ungueltiger Body: {e}")))?
    };

    let (participant, status) = state
        .konversationen
        .beitreten(&session, id, body.user_id)
        .await?;
    let code = match status {
        BeitrittsStatus::Beigetreten => StatusCode::CREATED,
        BeitrittsStatus::BereitsMitglied => StatusCode::OK,
    };
    Ok((code, Json(BeitrittAntwort { participant, status })))
}

pub async fn leave_conversation(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<StatusCode> {
    state.konversationen.verlassen(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_participants(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<Json<Vec<Teilnehmer>>> {
    Ok(Json(state.konversationen.teilnehmer_auflisten(&session, id).await?))
}

pub async fn mark_read(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<Json<Value>> {
    let last_read_at = state.chat.als_gelesen_markieren(&session, id).await?;
    Ok(Json(json!({ "last_read_at": last_read_at })))
}
