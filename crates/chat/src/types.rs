//! Oeffentliche Typen fuer Konversations- und Chat-Service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use agora_db::models::{KonversationsTyp, NachrichtenTyp, TeilnehmerRolle};
use agora_db::models::{KonversationRecord, ReaktionRecord, TeilnehmerRecord};

/// Maximale Nachrichtenlaenge in Unicode-Zeichen
pub const MAX_NACHRICHT_ZEICHEN: usize = 10_000;

/// Laenge der Antwort-Vorschau in Zeichen
pub const ANTWORT_VORSCHAU_ZEICHEN: usize = 100;

// ---------------------------------------------------------------------------
// Konversationen
// ---------------------------------------------------------------------------

/// Eine Konversation (Domain-Typ, nicht DB-Record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Konversation {
    pub id: Uuid,
    pub conversation_type: KonversationsTyp,
    pub title: Option<String>,
    pub description: Option<String>,
    pub collective_id: Option<Uuid>,
    pub is_private: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<KonversationRecord> for Konversation {
    fn from(r: KonversationRecord) -> Self {
        Self {
            id: r.id,
            conversation_type: r.conversation_type,
            title: r.title,
            description: r.description,
            collective_id: r.collective_id,
            is_private: r.is_private,
            created_by: r.created_by,
            created_at: r.created_at,
            last_message_at: r.last_message_at,
        }
    }
}

/// Teilnehmer einer Konversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teilnehmer {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: TeilnehmerRolle,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

impl From<TeilnehmerRecord> for Teilnehmer {
    fn from(r: TeilnehmerRecord) -> Self {
        Self {
            conversation_id: r.conversation_id,
            user_id: r.user_id,
            role: r.role,
            joined_at: r.joined_at,
            last_read_at: r.last_read_at,
        }
    }
}

/// Anfrage zum Erstellen einer Konversation
#[derive(Debug, Clone, Deserialize)]
pub struct NeueKonversationAnfrage {
    pub conversation_type: KonversationsTyp,
    /// Eingeladene Benutzer; der Ersteller wird immer ergaenzt
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub collective_id: Option<Uuid>,
    #[serde(default)]
    pub is_private: bool,
}

/// Konversation samt initialer Teilnehmer
#[derive(Debug, Clone, Serialize)]
pub struct ErstellteKonversation {
    #[serde(flatten)]
    pub konversation: Konversation,
    pub participants: Vec<Teilnehmer>,
}

/// Aenderbare Felder einer Konversation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KonversationAenderung {
    #[serde(default, deserialize_with = "doppel_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "doppel_option")]
    pub description: Option<Option<String>>,
    pub is_private: Option<bool>,
}

/// Unterscheidet "Feld fehlt" (None) von "Feld ist null" (Some(None))
fn doppel_option<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}

/// Ergebnis eines Beitritts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeitrittsStatus {
    Beigetreten,
    BereitsMitglied,
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Absender-Informationen einer Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absender {
    pub id: Uuid,
    pub username: Option<String>,
}

/// Kurzvorschau der Nachricht, auf die geantwortet wurde
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntwortVorschau {
    pub id: Uuid,
    pub sender_id: Uuid,
    /// `None` wenn die Originalnachricht geloescht wurde
    pub content: Option<String>,
}

/// Eine Chat-Nachricht (Domain-Typ, nicht DB-Record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNachricht {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Absender,
    pub content: String,
    pub message_type: NachrichtenTyp,
    pub metadata: serde_json::Value,
    pub reply_to: Option<AntwortVorschau>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// Optionale Felder beim Senden
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NachrichtOptionen {
    pub message_type: Option<NachrichtenTyp>,
    pub metadata: Option<serde_json::Value>,
    pub reply_to_id: Option<Uuid>,
}

/// Cursor-basierte Paginierung fuer die Nachrichten-History
#[derive(Debug, Clone)]
pub struct HistoryAnfrage {
    pub conversation_id: Uuid,
    /// Lade Nachrichten vor diesem Zeitstempel
    pub before: Option<DateTime<Utc>>,
    /// Maximale Anzahl (Default aus der Konfiguration)
    pub limit: Option<i64>,
}

/// Eine Reaktion auf eine Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaktion {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReaktionRecord> for Reaktion {
    fn from(r: ReaktionRecord) -> Self {
        Self {
            message_id: r.message_id,
            user_id: r.user_id,
            emoji: r.emoji,
            created_at: r.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Ungelesen
// ---------------------------------------------------------------------------

/// Ungelesen-Stand einer Konversation aus Sicht eines Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UngelesenStand {
    pub conversation_id: Uuid,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    /// Ohne Lesestand oder mit neuerer Nachricht als dem Lesestand
    pub has_unread: bool,
    /// Optimistische Aenderung wartet noch auf Bestaetigung
    pub pending: bool,
}

/// Uebersicht ueber alle direkten Konversationen
#[derive(Debug, Clone, Serialize)]
pub struct UngelesenUebersicht {
    pub conversations: Vec<UngelesenStand>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeit-Einstellungen des Chat-Service
#[derive(Debug, Clone)]
pub struct ChatKonfig {
    /// Standardgroesse einer History-Seite
    pub history_limit: i64,
    /// Maximale Suchtreffer
    pub such_limit: i64,
    /// Link-Vorschau fuer Text-Nachrichten erzeugen
    pub link_vorschau: bool,
}

impl Default for ChatKonfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            such_limit: 50,
            link_vorschau: true,
        }
    }
}
