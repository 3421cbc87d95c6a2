//! Gemeinsame Identifikationstypen fuer Agora
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.
//!
//! Zusaetzlich lebt hier die polymorphe Entitaets-Referenz (`EntitaetsRef`),
//! mit der Reaktionen und Kommentare auf Videos, Posts, Kollektive, Profile
//! und Chat-Nachrichten zeigen koennen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Eindeutige Konversations-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KonversationId(pub Uuid);

impl KonversationId {
    /// Erstellt eine neue zufaellige KonversationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for KonversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for KonversationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for KonversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conversation:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Polymorphe Entitaeten
// ---------------------------------------------------------------------------

/// Art einer referenzierbaren Entitaet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitaetsTyp {
    Video,
    Post,
    Collective,
    Profile,
    Message,
}

/// Was mit einer Entitaet gemacht werden darf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Faehigkeiten {
    pub reagierbar: bool,
    pub kommentierbar: bool,
}

impl EntitaetsTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Post => "post",
            Self::Collective => "collective",
            Self::Profile => "profile",
            Self::Message => "message",
        }
    }

    /// Faehigkeiten pro Variante
    pub fn faehigkeiten(&self) -> Faehigkeiten {
        match self {
            Self::Video | Self::Post => Faehigkeiten {
                reagierbar: true,
                kommentierbar: true,
            },
            Self::Collective | Self::Profile => Faehigkeiten {
                reagierbar: false,
                kommentierbar: true,
            },
            // Chat-Nachrichten werden per Reply beantwortet, nicht kommentiert
            Self::Message => Faehigkeiten {
                reagierbar: true,
                kommentierbar: false,
            },
        }
    }
}

impl std::str::FromStr for EntitaetsTyp {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "post" => Ok(Self::Post),
            "collective" => Ok(Self::Collective),
            "profile" => Ok(Self::Profile),
            "message" => Ok(Self::Message),
            other => Err(format!("Unbekannter Entitaets-Typ: {other}")),
        }
    }
}

/// Referenz auf eine Entitaet (Diskriminante + ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitaetsRef {
    #[serde(rename = "entity_type")]
    pub typ: EntitaetsTyp,
    #[serde(rename = "entity_id")]
    pub id: Uuid,
}

impl EntitaetsRef {
    pub fn nachricht(id: Uuid) -> Self {
        Self {
            typ: EntitaetsTyp::Message,
            id,
        }
    }

    /// Prueft ob auf die Entitaet reagiert werden darf
    pub fn reaktion_pruefen(&self) -> std::result::Result<(), String> {
        if self.typ.faehigkeiten().reagierbar {
            Ok(())
        } else {
            Err(format!(
                "Reaktionen auf '{}' werden nicht unterstuetzt",
                self.typ.als_str()
            ))
        }
    }

    /// Prueft ob die Entitaet kommentiert werden darf
    pub fn kommentar_pruefen(&self) -> std::result::Result<(), String> {
        if self.typ.faehigkeiten().kommentierbar {
            Ok(())
        } else {
            Err(format!(
                "Kommentare auf '{}' werden nicht unterstuetzt",
                self.typ.als_str()
            ))
        }
    }
}
