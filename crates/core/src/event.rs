//! Change-Events und Event-Bus-Trait
//!
//! Jede erfolgreiche Schreiboperation auf Nachrichten, Teilnehmern oder
//! Konversationen erzeugt ein `AenderungsEvent`. Die Services veroeffentlichen diese ueber
//! den `EventBus`; der Realtime-Hub verteilt sie an benannte Kanaele.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{KonversationId, UserId};

/// Relation, auf die sich ein Event bezieht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Messages,
    ConversationParticipants,
    Conversations,
}

/// Art der Aenderung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EreignisArt {
    Insert,
    Update,
    Delete,
}

/// Alle Aenderungen, die ueber den Event-Bus fliessen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AenderungsEvent {
    /// Neue Nachricht in einer Konversation
    NachrichtEingefuegt {
        nachricht_id: uuid::Uuid,
        konversation_id: KonversationId,
        sender_id: UserId,
        created_at: DateTime<Utc>,
    },
    /// Nachricht editiert, soft-geloescht oder Metadaten ergaenzt
    NachrichtAktualisiert {
        nachricht_id: uuid::Uuid,
        konversation_id: KonversationId,
        edited_at: Option<DateTime<Utc>>,
        deleted_at: Option<DateTime<Utc>>,
    },
    /// Neuer Teilnehmer
    TeilnehmerEingefuegt {
        konversation_id: KonversationId,
        user_id: UserId,
    },
    /// Teilnehmer-Zeile geaendert (z.B. last_read_at)
    TeilnehmerAktualisiert {
        konversation_id: KonversationId,
        user_id: UserId,
        last_read_at: Option<DateTime<Utc>>,
    },
    /// Teilnehmer hat die Konversation verlassen
    TeilnehmerEntfernt {
        konversation_id: KonversationId,
        user_id: UserId,
    },
    /// Konversations-Zeile geaendert (z.B. last_message_at nach einer Nachricht)
    KonversationAktualisiert {
        konversation_id: KonversationId,
        last_message_at: Option<DateTime<Utc>>,
    },
}

impl AenderungsEvent {
    pub fn relation(&self) -> Relation {
        match self {
            Self::NachrichtEingefuegt { .. } | Self::NachrichtAktualisiert { .. } => {
                Relation::Messages
            }
            Self::TeilnehmerEingefuegt { .. }
            | Self::TeilnehmerAktualisiert { .. }
            | Self::TeilnehmerEntfernt { .. } => Relation::ConversationParticipants,
            Self::KonversationAktualisiert { .. } => Relation::Conversations,
        }
    }

    pub fn art(&self) -> EreignisArt {
        match self {
            Self::NachrichtEingefuegt { .. } | Self::TeilnehmerEingefuegt { .. } => {
                EreignisArt::Insert
            }
            Self::NachrichtAktualisiert { .. }
            | Self::TeilnehmerAktualisiert { .. }
            | Self::KonversationAktualisiert { .. } => EreignisArt::Update,
            Self::TeilnehmerEntfernt { .. } => EreignisArt::Delete,
        }
    }

    pub fn konversation_id(&self) -> KonversationId {
        match self {
            Self::NachrichtEingefuegt { konversation_id, .. }
            | Self::NachrichtAktualisiert { konversation_id, .. }
            | Self::TeilnehmerEingefuegt { konversation_id, .. }
            | Self::TeilnehmerAktualisiert { konversation_id, .. }
            | Self::TeilnehmerEntfernt { konversation_id, .. }
            | Self::KonversationAktualisiert { konversation_id, .. } => *konversation_id,
        }
    }

    /// Sender (Nachrichten) bzw. betroffener Benutzer (Teilnehmer)
    pub fn akteur(&self) -> Option<UserId> {
        match self {
            Self::NachrichtEingefuegt { sender_id, .. } => Some(*sender_id),
            Self::NachrichtAktualisiert { .. } | Self::KonversationAktualisiert { .. } => None,
            Self::TeilnehmerEingefuegt { user_id, .. }
            | Self::TeilnehmerAktualisiert { user_id, .. }
            | Self::TeilnehmerEntfernt { user_id, .. } => Some(*user_id),
        }
    }
}

/// Trait fuer den Event-Bus
///
/// Die konkrete Implementierung (In-Process-Hub, spaeter evtl. PG NOTIFY)
/// liegt im Realtime-Crate. Senden ist nicht-blockierend; fehlende
/// Abonnenten sind kein Fehler.
pub trait EventBus: Send + Sync + 'static {
    /// Sendet ein Ereignis an alle Abonnenten
    fn senden(&self, event: AenderungsEvent) -> crate::Result<()>;
}

/// Event-Bus ohne Abonnenten (fuer Tests und Setups ohne Realtime)
#[derive(Debug, Default, Clone, Copy)]
pub struct KeinEventBus;

impl EventBus for KeinEventBus {
    fn senden(&self, _event: AenderungsEvent) -> crate::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = AenderungsEvent::NachrichtEingefuegt {
            nachricht_id: uuid::Uuid::new_v4(),
            konversation_id: KonversationId::new(),
            sender_id: UserId::new(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: AenderungsEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
        assert!(json.contains("\"event\":\"nachricht_eingefuegt\""));
    }

    #[test]
    fn relation_und_art() {
        let event = AenderungsEvent::TeilnehmerAktualisiert {
            konversation_id: KonversationId::new(),
            user_id: UserId::new(),
            last_read_at: None,
        };
        assert_eq!(event.relation(), Relation::ConversationParticipants);
        assert_eq!(event.art(), EreignisArt::Update);
    }

    #[test]
    fn akteur_ist_sender() {
        let sender = UserId::new();
        let event = AenderungsEvent::NachrichtEingefuegt {
            nachricht_id: uuid::Uuid::new_v4(),
            konversation_id: KonversationId::new(),
            sender_id: sender,
            created_at: Utc::now(),
        };
        assert_eq!(event.akteur(), Some(sender));
        assert_eq!(event.art(), EreignisArt::Insert);
    }

    #[test]
    fn konversations_update_ohne_akteur() {
        let event = AenderungsEvent::KonversationAktualisiert {
            konversation_id: KonversationId::new(),
            last_message_at: Some(Utc::now()),
        };
        assert_eq!(event.relation(), Relation::Conversations);
        assert_eq!(event.art(), EreignisArt::Update);
        assert_eq!(event.akteur(), None);
    }
}
