//! Fehlertypen der REST-API
//!
//! Jeder Fehler wird als `{ "error": { "code": <status>, "message": "..." } }`
//! ausgeliefert.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use agora_auth::AuthError;
use agora_chat::ChatError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NichtAngemeldet(String),

    #[error("{0}")]
    KeineBerechtigung(String),

    #[error("{0}")]
    NichtGefunden(String),

    #[error("{0}")]
    UngueltigeEingabe(String),

    #[error("{0}")]
    NichtVerfuegbar(String),

    #[error("Interner Fehler")]
    Intern(#[source] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NichtAngemeldet(_) => StatusCode::UNAUTHORIZED,
            Self::KeineBerechtigung(_) => StatusCode::FORBIDDEN,
            Self::NichtGefunden(_) => StatusCode::NOT_FOUND,
            Self::UngueltigeEingabe(_) => StatusCode::BAD_REQUEST,
            Self::NichtVerfuegbar(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Intern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Fehlerantwort fuer die REST-API
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": nachricht
            }
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Intern(e) = &self {
            // Details nur ins Log, nicht an den Client
            tracing::error!(fehler = ?e, "Interner Fehler bei REST-Anfrage");
        }
        fehler_antwort(status, &self.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::NichtAngemeldet => Self::NichtAngemeldet("Nicht angemeldet".into()),
            ChatError::KeineBerechtigung(msg) => Self::KeineBerechtigung(msg),
            ChatError::NichtGefunden(msg) => Self::NichtGefunden(msg),
            ChatError::UngueltigeEingabe(msg) => Self::UngueltigeEingabe(msg),
            ChatError::Transient(msg) => Self::NichtVerfuegbar(msg),
            ChatError::Datenbank(db) => Self::Intern(db.into()),
            ChatError::Anyhow(e) => Self::Intern(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ChatError::from(e).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::UngueltigeEingabe(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_fehler_auf_status() {
        let faelle = [
            (ChatError::NichtAngemeldet, StatusCode::UNAUTHORIZED),
            (ChatError::KeineBerechtigung("x".into()), StatusCode::FORBIDDEN),
            (ChatError::nicht_gefunden("x"), StatusCode::NOT_FOUND),
            (ChatError::ungueltig("x"), StatusCode::BAD_REQUEST),
            (ChatError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ChatError::Anyhow(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (fehler, status) in faelle {
            assert_eq!(ApiError::from(fehler).status(), status);
        }
    }

    #[test]
    fn interne_details_bleiben_verborgen() {
        let e = ApiError::Intern(anyhow::anyhow!("geheimer Pfad /var/db"));
        assert_eq!(e.to_string(), "Interner Fehler");
    }
}
