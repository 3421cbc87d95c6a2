//! Fehlertypen fuer Agora
//!
//! Crate-uebergreifende Fehler rund um den Event-Bus. Die Fach-Crates
//! definieren eigene Fehler-Enums (`DbError`, `ChatError`, ...).

use thiserror::Error;

/// Globaler Result-Alias fuer Agora
pub type Result<T> = std::result::Result<T, AgoraError>;

#[derive(Debug, Error)]
pub enum AgoraError {
    /// Der Bus wurde beendet und nimmt keine Events mehr an
    #[error("Event-Bus geschlossen")]
    EventBusGeschlossen,

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AgoraError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
