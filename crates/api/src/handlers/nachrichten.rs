//! REST-Handler fuer Nachrichten, Reaktionen und Suche

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use agora_chat::{ChatNachricht, HistoryAnfrage, NachrichtOptionen, Reaktion};

use crate::{
    error::ApiResult,
    extract::{Abfrage, JsonBody, Pfad},
    middleware::AuthSession,
    ApiState,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub async fn list_messages(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    Abfrage(query): Abfrage<HistoryQuery>,
) -> ApiResult<Json<Vec<ChatNachricht>>> {
    let anfrage = HistoryAnfrage {
        conversation_id: id,
        before: query.before,
        limit: query.limit,
    };
    Ok(Json(state.chat.history_laden(&session, anfrage).await?))
}

#[derive(Debug, Deserialize)]
pub struct NachrichtSendenBody {
    pub content: String,
    #[serde(flatten)]
    pub optionen: NachrichtOptionen,
}

pub async fn send_message(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    JsonBody(body): JsonBody<NachrichtSendenBody>,
) -> ApiResult<(StatusCode, Json<ChatNachricht>)> {
    let nachricht = state
        .chat
        .nachricht_senden(&session, id, &body.content, body.optionen)
        .await?;
    Ok((StatusCode::CREATED, Json(nachricht)))
}

pub async fn get_message(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<Json<ChatNachricht>> {
    Ok(Json(state.chat.nachricht_laden(&session, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct NachrichtEditierenBody {
    pub content: String,
}

pub async fn edit_message(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    JsonBody(body): JsonBody<NachrichtEditierenBody>,
) -> ApiResult<Json<ChatNachricht>> {
    Ok(Json(
        state
            .chat
            .nachricht_editieren(&session, id, &body.content)
            .await?,
    ))
}

pub async fn delete_message(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<StatusCode> {
    state.chat.nachricht_loeschen(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReaktionBody {
    pub emoji: String,
}

/// Neue Reaktion: 201, bereits vorhandene: 200 ohne Aenderung
pub async fn add_reaction(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
    JsonBody(body): JsonBody<ReaktionBody>,
) -> ApiResult<(StatusCode, Json<Reaktion>)> {
    let (reaktion, neu) = state
        .chat
        .reaktion_hinzufuegen(&session, id, &body.emoji)
        .await?;
    let code = if neu { StatusCode::CREATED } else { StatusCode::OK };
    Ok((code, Json(reaktion)))
}

pub async fn remove_reaction(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad((id, emoji)): Pfad<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state.chat.reaktion_entfernen(&session, id, &emoji).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reactions(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Pfad(id): Pfad<Uuid>,
) -> ApiResult<Json<Vec<Reaktion>>> {
    Ok(Json(state.chat.reaktionen_auflisten(&session, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SuchQuery {
    pub q: String,
}

pub async fn search_messages(
    State(state): State<ApiState>,
    Extension(AuthSession(session)): Extension<AuthSession>,
    Abfrage(query): Abfrage<SuchQuery>,
) -> ApiResult<Json<Vec<ChatNachricht>>> {
    Ok(Json(state.chat.nachrichten_suchen(&session, &query.q).await?))
}
