//! Axum-Middleware fuer die Bearer-Authentifizierung

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use agora_auth::Session;

use crate::{error::ApiError, ApiState};

/// Extrahiert Bearer-Token aus Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Wrapper-Typ fuer die authentifizierte Session (als Extension gespeichert)
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

/// Prueft den Token und legt die Session als Extension ab
pub async fn auth_middleware(
    State(state): State<ApiState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        return ApiError::NichtAngemeldet("Authorization-Header fehlt".into()).into_response();
    };

    match state.sessions.validieren(&token).await {
        Ok(session) => {
            req.extensions_mut().insert(AuthSession(session));
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(fehler = %e, pfad = %req.uri().path(), "Token abgelehnt");
            ApiError::NichtAngemeldet("Ungueltiger oder abgelaufener Token".into()).into_response()
        }
    }
}
