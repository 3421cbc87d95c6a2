//! agora-api – REST-Interface fuer Agora
//!
//! Alle Routen unter `/v1/` verlangen einen Bearer-Token aus dem
//! `SessionStore`. Fehler werden einheitlich als JSON ausgeliefert.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

use std::sync::Arc;

use agora_auth::SessionStore;
use agora_chat::{ChatService, KonversationService};
use agora_db::SqliteDb;

/// Axum-State der REST-API
#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionStore>,
    pub konversationen: Arc<KonversationService<SqliteDb>>,
    pub chat: Arc<ChatService<SqliteDb>>,
}

impl ApiState {
    pub fn neu(
        sessions: Arc<SessionStore>,
        konversationen: Arc<KonversationService<SqliteDb>>,
        chat: Arc<ChatService<SqliteDb>>,
    ) -> Self {
        Self {
            sessions,
            konversationen,
            chat,
        }
    }
}

pub use error::{ApiError, ApiResult};
pub use routes::v1_router;
pub use server::{ApiServer, ApiServerKonfig};
