//! Route-Definitionen fuer die REST-API (/v1/...)

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, server::health, ApiState};

/// Erstellt den vollstaendigen Router inklusive `/health`
pub fn v1_router(state: ApiState) -> Router {
    let geschuetzt = Router::new()
        // Konversationen
        .route(
            "/v1/conversations",
            get(handlers::konversationen::list_conversations)
                .post(handlers::konversationen::create_conversation),
        )
        .route(
            "/v1/conversations/:id",
            get(handlers::konversationen::get_conversation)
                .patch(handlers::konversationen::update_conversation),
        )
        .route(
            "/v1/conversations/:id/join",
            post(handlers::konversationen::join_conversation),
        )
        .route(
            "/v1/conversations/:id/participants",
            get(handlers::konversationen::list_participants),
        )
        .route(
            "/v1/conversations/:id/participants/me",
            delete(handlers::konversationen::leave_conversation),
        )
        .route(
            "/v1/conversations/:id/read",
            post(handlers::konversationen::mark_read),
        )
        // Nachrichten
        .route(
            "/v1/conversations/:id/messages",
            get(handlers::nachrichten::list_messages).post(handlers::nachrichten::send_message),
        )
        .route(
            "/v1/messages/:id",
            get(handlers::nachrichten::get_message)
                .patch(handlers::nachrichten::edit_message)
                .delete(handlers::nachrichten::delete_message),
        )
        // Reaktionen
        .route(
            "/v1/messages/:id/reactions",
            get(handlers::nachrichten::list_reactions).post(handlers::nachrichten::add_reaction),
        )
        .route(
            "/v1/messages/:id/reactions/:emoji",
            delete(handlers::nachrichten::remove_reaction),
        )
        // Sitzung
        .route(
            "/v1/session",
            get(handlers::sitzung::get_session).delete(handlers::sitzung::logout),
        )
        .route("/v1/sessions", delete(handlers::sitzung::logout_all))
        // Suche und Ungelesen
        .route("/v1/chat/search", get(handlers::nachrichten::search_messages))
        .route("/v1/unread", get(handlers::ungelesen::get_unread))
        // Nur gematchte Routen verlangen einen Token; Unbekanntes bleibt 404
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(geschuetzt)
        .with_state(state)
}
