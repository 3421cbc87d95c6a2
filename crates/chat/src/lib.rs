//! agora-chat – Konversationen, Nachrichten und Ungelesen-Tracking
//!
//! Dieses Crate implementiert:
//! - KonversationService: Konversationen anlegen, beitreten, verlassen
//! - ChatService: Nachrichten senden, editieren, loeschen, History, Suche, Reaktionen
//! - UngelesenTracker: Ungelesen-Zaehler pro direkter Konversation
//! - Link-Vorschau fuer Text-Nachrichten (Hintergrund-Task)
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use agora_chat::{ChatService, KonversationService};
//! use agora_core::KeinEventBus;
//! use agora_db::SqliteDb;
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Arc::new(SqliteDb::in_memory().await.unwrap());
//!     let events = Arc::new(KeinEventBus);
//!
//!     let konversationen = KonversationService::neu(db.clone(), events.clone());
//!     let chat = ChatService::neu(db, events);
//! }
//! ```

pub mod error;
pub mod konversation_service;
pub mod link_vorschau;
pub mod service;
pub mod types;
pub mod ungelesen;

#[cfg(test)]
mod tests;

use agora_core::{AenderungsEvent, EventBus};

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use konversation_service::KonversationService;
pub use link_vorschau::{HttpVorschauLader, LinkVorschau, VorschauLader};
pub use service::ChatService;
pub use types::{
    BeitrittsStatus, ChatKonfig, ChatNachricht, ErstellteKonversation, HistoryAnfrage,
    Konversation, KonversationAenderung, KonversationsTyp, NachrichtOptionen, NachrichtenTyp,
    NeueKonversationAnfrage, Reaktion, Teilnehmer, TeilnehmerRolle, UngelesenStand,
    UngelesenUebersicht,
};
pub use ungelesen::UngelesenTracker;

/// Veroeffentlicht ein Event; ein Fehler des Busses bricht die Operation nicht ab
pub(crate) fn ereignis_senden(events: &dyn EventBus, event: AenderungsEvent) {
    let relation = event.relation();
    if let Err(e) = events.senden(event) {
        tracing::warn!(relation = ?relation, fehler = %e, "Event konnte nicht gesendet werden");
    }
}
