//! Fehlertypen fuer Sessions und Zugriffspruefung

use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Crate
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Authentifizierung ---
    #[error("Nicht angemeldet")]
    NichtAngemeldet,

    // --- Session ---
    #[error("Session nicht gefunden oder abgelaufen")]
    SessionUngueltig,

    #[error("Session abgelaufen")]
    SessionAbgelaufen,

    // --- Zugriff ---
    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    #[error("Ungueltige Teilnehmerliste: {0}")]
    UngueltigeTeilnehmer(String),

    // --- Datenbank ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] agora_db::DbError),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fehler, die auf fehlende oder abgelaufene Anmeldung zurueckgehen
    pub fn ist_unauthentifiziert(&self) -> bool {
        matches!(
            self,
            Self::NichtAngemeldet | Self::SessionUngueltig | Self::SessionAbgelaufen
        )
    }
}

/// Result-Alias fuer das Auth-Crate
pub type AuthResult<T> = Result<T, AuthError>;
