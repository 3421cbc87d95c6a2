//! Fehlertypen fuer den Realtime-Layer

use thiserror::Error;

/// Fehlertyp fuer Transport, Hub und Registry
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Der Kanalname ist beim Transport bereits belegt
    #[error("Kanal bereits abonniert: {0}")]
    BereitsAbonniert(String),

    /// Der Hub wurde beendet
    #[error("Realtime-Hub geschlossen")]
    Geschlossen,

    /// Abo konnte nicht aufgebaut werden
    #[error("Abo fehlgeschlagen: {0}")]
    AboFehlgeschlagen(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RealtimeError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// "Bereits abonniert" ist kein echter Fehler, das Abo lebt weiter
    pub fn ist_bereits_abonniert(&self) -> bool {
        matches!(self, Self::BereitsAbonniert(_))
    }
}

/// Result-Typ fuer den Realtime-Layer
pub type RealtimeResult<T> = Result<T, RealtimeError>;
