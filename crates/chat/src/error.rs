//! Fehlertypen fuer das Chat-Crate
//!
//! Die Varianten entsprechen direkt den HTTP-Statuscodes der API:
//! 401, 403, 404, 400 und 503. Datenbank- und Auth-Fehler werden beim
//! Konvertieren auf diese Taxonomie abgebildet.

use thiserror::Error;

use agora_auth::AuthError;
use agora_db::DbError;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nicht angemeldet")]
    NichtAngemeldet,

    #[error("Keine Berechtigung: {0}")]
    KeineBerechtigung(String),

    /// Fehlt oder ist fuer den Aufrufer unsichtbar
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Voruebergehend nicht verfuegbar: {0}")]
    Transient(String),

    #[error("Datenbank-Fehler: {0}")]
    Datenbank(#[source] DbError),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl ChatError {
    pub fn nicht_gefunden(was: impl Into<String>) -> Self {
        Self::NichtGefunden(was.into())
    }

    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigeEingabe(msg.into())
    }

    /// Gibt true zurueck wenn ein erneuter Versuch sinnvoll sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Datenbank(e) => e.ist_voruebergehend(),
            _ => false,
        }
    }
}

impl From<DbError> for ChatError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ZugriffVerweigert(msg) => Self::KeineBerechtigung(msg),
            DbError::NichtGefunden(msg) => Self::NichtGefunden(msg),
            DbError::UngueltigeDaten(msg) | DbError::Eindeutigkeit(msg) => {
                Self::UngueltigeEingabe(msg)
            }
            e if e.ist_voruebergehend() => Self::Transient(e.to_string()),
            e => Self::Datenbank(e),
        }
    }
}

impl From<AuthError> for ChatError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NichtAngemeldet
            | AuthError::SessionUngueltig
            | AuthError::SessionAbgelaufen => Self::NichtAngemeldet,
            AuthError::ZugriffVerweigert(msg) => Self::KeineBerechtigung(msg),
            AuthError::UngueltigeTeilnehmer(msg) => Self::UngueltigeEingabe(msg),
            AuthError::Datenbank(db) => db.into(),
            AuthError::Intern(msg) => Self::Anyhow(anyhow::anyhow!(msg)),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_ablehnung_wird_zu_keine_berechtigung() {
        let e: ChatError = DbError::verweigert("kein Teilnehmer").into();
        assert!(matches!(e, ChatError::KeineBerechtigung(_)));

        let e: ChatError = DbError::UngueltigeDaten("Antwort".into()).into();
        assert!(matches!(e, ChatError::UngueltigeEingabe(_)));
    }

    #[test]
    fn pool_timeout_ist_wiederholbar() {
        let e: ChatError = DbError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(e, ChatError::Transient(_)));
        assert!(e.ist_wiederholbar());
        assert!(!ChatError::nicht_gefunden("x").ist_wiederholbar());
    }

    #[test]
    fn abgelaufene_session_ist_nicht_angemeldet() {
        let e: ChatError = AuthError::SessionAbgelaufen.into();
        assert!(matches!(e, ChatError::NichtAngemeldet));
    }
}
