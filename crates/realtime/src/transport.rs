//! Transport-Abstraktion fuer Realtime-Abos
//!
//! Ein Abo besteht aus einem eindeutigen Kanalnamen, einer Liste von
//! Filtern und einem Callback. Der Transport ruft den Callback pro Abo
//! sequentiell auf; ein zweites Abo unter demselben Namen wird mit
//! `RealtimeError::BereitsAbonniert` abgelehnt.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use agora_core::{AenderungsEvent, EreignisArt, Relation, UserId};

use crate::error::RealtimeResult;

/// Eindeutige ID eines einzelnen Abos beim Transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AboId(pub Uuid);

impl AboId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AboId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AboId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "abo:{}", self.0)
    }
}

/// Filter auf Relation, Art und Akteur eines Events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EreignisFilter {
    pub relation: Relation,
    pub art: Option<EreignisArt>,
    /// Nur Events dieses Akteurs
    pub nur_akteur: Option<UserId>,
    /// Events dieses Akteurs ausblenden
    pub ohne_akteur: Option<UserId>,
}

impl EreignisFilter {
    pub fn neu(relation: Relation) -> Self {
        Self {
            relation,
            art: None,
            nur_akteur: None,
            ohne_akteur: None,
        }
    }

    pub fn art(mut self, art: EreignisArt) -> Self {
        self.art = Some(art);
        self
    }

    pub fn nur_akteur(mut self, akteur: UserId) -> Self {
        self.nur_akteur = Some(akteur);
        self
    }

    pub fn ohne_akteur(mut self, akteur: UserId) -> Self {
        self.ohne_akteur = Some(akteur);
        self
    }

    pub fn passt(&self, event: &AenderungsEvent) -> bool {
        if event.relation() != self.relation {
            return false;
        }
        if self.art.is_some_and(|art| art != event.art()) {
            return false;
        }
        let akteur = event.akteur();
        if self.nur_akteur.is_some_and(|nur| akteur != Some(nur)) {
            return false;
        }
        if self.ohne_akteur.is_some_and(|ohne| akteur == Some(ohne)) {
            return false;
        }
        true
    }
}

/// Beschreibung eines Abos
#[derive(Debug, Clone)]
pub struct AboSpec {
    /// Kanalname, z.B. `unread-messages-{user_id}`
    pub name: String,
    /// Ein Event wird zugestellt, wenn mindestens ein Filter passt
    pub filter: Vec<EreignisFilter>,
}

impl AboSpec {
    pub fn passt(&self, event: &AenderungsEvent) -> bool {
        self.filter.iter().any(|f| f.passt(event))
    }
}

/// Callback eines Abos; wird pro Abo nacheinander aufgerufen
pub type AboCallback = Arc<dyn Fn(AenderungsEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Realtime-Transport (In-Process-Hub oder externer Dienst)
#[async_trait]
pub trait RealtimeTransport: Send + Sync + 'static {
    /// Abo anlegen; `BereitsAbonniert` wenn der Name schon belegt ist
    async fn abonnieren(&self, spec: AboSpec, callback: AboCallback) -> RealtimeResult<AboId>;

    /// Abo abbauen; unbekannte Namen oder IDs sind kein Fehler
    async fn abbestellen(&self, name: &str, abo_id: AboId) -> RealtimeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::KonversationId;
    use chrono::Utc;

    fn nachricht(sender: UserId) -> AenderungsEvent {
        AenderungsEvent::NachrichtEingefuegt {
            nachricht_id: Uuid::new_v4(),
            konversation_id: KonversationId::new(),
            sender_id: sender,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filter_blendet_eigene_nachrichten_aus() {
        let ich = UserId::new();
        let filter = EreignisFilter::neu(Relation::Messages)
            .art(EreignisArt::Insert)
            .ohne_akteur(ich);

        assert!(filter.passt(&nachricht(UserId::new())));
        assert!(!filter.passt(&nachricht(ich)));
    }

    #[test]
    fn filter_nur_eigene_teilnehmer_updates() {
        let ich = UserId::new();
        let filter = EreignisFilter::neu(Relation::ConversationParticipants)
            .art(EreignisArt::Update)
            .nur_akteur(ich);

        let eigenes = AenderungsEvent::TeilnehmerAktualisiert {
            konversation_id: KonversationId::new(),
            user_id: ich,
            last_read_at: None,
        };
        let fremdes = AenderungsEvent::TeilnehmerAktualisiert {
            konversation_id: KonversationId::new(),
            user_id: UserId::new(),
            last_read_at: None,
        };
        let beitritt = AenderungsEvent::TeilnehmerEingefuegt {
            konversation_id: KonversationId::new(),
            user_id: ich,
        };

        assert!(filter.passt(&eigenes));
        assert!(!filter.passt(&fremdes));
        assert!(!filter.passt(&beitritt));
        assert!(!filter.passt(&nachricht(ich)));
    }
}
