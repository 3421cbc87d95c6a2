//! Datenbankmodelle fuer Agora
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Domain-Typen getrennt und dienen als reine Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Benutzer-Datensatz (wird vom externen Auth-System angelegt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub username: &'a str,
}

// ---------------------------------------------------------------------------
// Konversationen
// ---------------------------------------------------------------------------

/// Konversations-Typ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KonversationsTyp {
    Direct,
    Group,
    Channel,
}

impl KonversationsTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

impl std::str::FromStr for KonversationsTyp {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            "channel" => Ok(Self::Channel),
            other => Err(format!("Unbekannter Konversations-Typ: {other}")),
        }
    }
}

/// Konversations-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KonversationRecord {
    pub id: Uuid,
    pub conversation_type: KonversationsTyp,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Kollektiv (Tenant), dem die Konversation zugeordnet ist
    pub collective_id: Option<Uuid>,
    pub is_private: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Denormalisiert: Zeitpunkt der juengsten Nachricht
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Daten zum Erstellen einer Konversation
#[derive(Debug, Clone)]
pub struct NeueKonversation<'a> {
    pub conversation_type: KonversationsTyp,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub collective_id: Option<Uuid>,
    pub is_private: bool,
    pub created_by: Uuid,
}

/// Daten zum Aktualisieren einer Konversation
#[derive(Debug, Clone, Default)]
pub struct KonversationUpdate {
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub is_private: Option<bool>,
}

impl KonversationUpdate {
    pub fn ist_leer(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_private.is_none()
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Rolle eines Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeilnehmerRolle {
    Admin,
    Member,
}

impl TeilnehmerRolle {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for TeilnehmerRolle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(format!("Unbekannte Teilnehmer-Rolle: {other}")),
        }
    }
}

/// Teilnehmer-Datensatz (Konversation x Benutzer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeilnehmerRecord {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: TeilnehmerRolle,
    pub joined_at: DateTime<Utc>,
    /// `None` = noch nie gelesen
    pub last_read_at: Option<DateTime<Utc>>,
}

/// Initialer Teilnehmer beim Erstellen einer Konversation
#[derive(Debug, Clone, Copy)]
pub struct NeuerTeilnehmer {
    pub user_id: Uuid,
    pub role: TeilnehmerRolle,
}

/// Ergebnis eines idempotenten Beitritts
#[derive(Debug, Clone)]
pub struct BeitrittsErgebnis {
    pub teilnehmer: TeilnehmerRecord,
    /// `false` wenn der Teilnehmer bereits existierte
    pub neu: bool,
}

/// Lesestand eines Benutzers in einer Konversation
#[derive(Debug, Clone)]
pub struct LeseStatus {
    pub conversation_id: Uuid,
    pub conversation_type: KonversationsTyp,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Nachrichtentyp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenTyp {
    Text,
    Image,
    File,
}

impl NachrichtenTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for NachrichtenTyp {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            other => Err(format!("Unbekannter Nachrichtentyp: {other}")),
        }
    }
}

/// Nachrichten-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNachrichtRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: NachrichtenTyp,
    pub metadata: serde_json::Value,
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Daten zum Erstellen einer Nachricht
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: &'a str,
    pub message_type: NachrichtenTyp,
    pub metadata: serde_json::Value,
    pub reply_to_id: Option<Uuid>,
}

/// Cursor-Filter fuer die Nachrichten-History
#[derive(Debug, Clone)]
pub struct NachrichtenFilter {
    pub conversation_id: Uuid,
    /// Lade Nachrichten vor diesem Zeitstempel
    pub before: Option<DateTime<Utc>>,
    /// Maximale Anzahl (Default: 50)
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Reaktionen
// ---------------------------------------------------------------------------

/// Reaktions-Datensatz (Nachricht x Benutzer x Emoji)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaktionRecord {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}
