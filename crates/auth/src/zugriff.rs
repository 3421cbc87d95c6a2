//! Zugriffs-Gate fuer Konversationen
//!
//! Das Gate beantwortet vor jeder vom Client ausgeloesten Aenderung zwei
//! Fragen: darf der aktuelle Benutzer die Konversation sehen, und darf er
//! dort schreiben? Beides haengt an einer Teilnehmer-Zeile.
//!
//! Die `kann_*`-Methoden liefern nur `bool`: nicht angemeldet, abgelaufene
//! Sessions und Fehler beim Nachschlagen ergeben `false` (Fehler werden
//! geloggt). Die `*_erfordern`-Methoden liefern dagegen die Ursache, damit
//! Services zwischen 401, 403 und 503 unterscheiden koennen.

use std::sync::Arc;

use uuid::Uuid;

use agora_db::{models::TeilnehmerRolle, ParticipantRepository};

use crate::error::{AuthError, AuthResult};
use crate::session::Session;

/// Liefert den aktuell angemeldeten Benutzer (falls vorhanden)
pub trait AktuellerBenutzer {
    fn aktueller_benutzer(&self) -> Option<Uuid>;
}

impl AktuellerBenutzer for Session {
    fn aktueller_benutzer(&self) -> Option<Uuid> {
        self.ist_gueltig().then_some(self.user_id)
    }
}

impl<T: AktuellerBenutzer> AktuellerBenutzer for Option<T> {
    fn aktueller_benutzer(&self) -> Option<Uuid> {
        self.as_ref().and_then(|w| w.aktueller_benutzer())
    }
}

impl<T: AktuellerBenutzer + ?Sized> AktuellerBenutzer for &T {
    fn aktueller_benutzer(&self) -> Option<Uuid> {
        (**self).aktueller_benutzer()
    }
}

/// Bereits authentifizierte Benutzer-ID (z.B. aus der HTTP-Middleware)
impl AktuellerBenutzer for Uuid {
    fn aktueller_benutzer(&self) -> Option<Uuid> {
        (!self.is_nil()).then_some(*self)
    }
}

/// Capability-Pruefungen auf Basis der Teilnehmer-Tabelle
pub struct ZugriffsGate<P: ParticipantRepository> {
    teilnehmer: Arc<P>,
}

impl<P: ParticipantRepository> Clone for ZugriffsGate<P> {
    fn clone(&self) -> Self {
        Self {
            teilnehmer: Arc::clone(&self.teilnehmer),
        }
    }
}

impl<P: ParticipantRepository> ZugriffsGate<P> {
    pub fn neu(teilnehmer: Arc<P>) -> Self {
        Self { teilnehmer }
    }

    /// Darf der Benutzer die Konversation (und ihre Nachrichten) sehen?
    pub async fn kann_konversation_sehen(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
    ) -> bool {
        self.pruefen(wer, konversation_id, "sehen").await
    }

    /// Darf der Benutzer in die Konversation schreiben?
    pub async fn kann_nachricht_senden(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
    ) -> bool {
        self.pruefen(wer, konversation_id, "senden").await
    }

    /// Angemeldet, Liste nicht leer, keine Nil-IDs
    pub fn teilnehmer_validieren(&self, wer: &impl AktuellerBenutzer, user_ids: &[Uuid]) -> bool {
        wer.aktueller_benutzer().is_some()
            && !user_ids.is_empty()
            && user_ids.iter().all(|id| !id.is_nil())
    }

    async fn pruefen(&self, wer: &impl AktuellerBenutzer, konversation_id: Uuid, aktion: &str) -> bool {
        let Some(user_id) = wer.aktueller_benutzer() else {
            return false;
        };
        match self.teilnehmer.get(konversation_id, user_id).await {
            Ok(t) => t.is_some(),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    konversation_id = %konversation_id,
                    aktion,
                    fehler = %e,
                    "Zugriffspruefung fehlgeschlagen, verweigere"
                );
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Varianten mit Fehlerursache
    // -----------------------------------------------------------------------

    /// Gibt die User-ID zurueck oder `NichtAngemeldet`
    pub fn angemeldet_erfordern(&self, wer: &impl AktuellerBenutzer) -> AuthResult<Uuid> {
        wer.aktueller_benutzer().ok_or(AuthError::NichtAngemeldet)
    }

    /// Erfordert eine Teilnehmer-Zeile; liefert die Rolle
    pub async fn teilnahme_erfordern(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
    ) -> AuthResult<(Uuid, TeilnehmerRolle)> {
        let user_id = self.angemeldet_erfordern(wer)?;
        match self.teilnehmer.get(konversation_id, user_id).await? {
            Some(t) => Ok((user_id, t.role)),
            None => Err(AuthError::ZugriffVerweigert(format!(
                "kein Teilnehmer von Konversation {konversation_id}"
            ))),
        }
    }

    /// Erfordert die Admin-Rolle in der Konversation
    pub async fn admin_erfordern(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
    ) -> AuthResult<Uuid> {
        let (user_id, rolle) = self.teilnahme_erfordern(wer, konversation_id).await?;
        if rolle == TeilnehmerRolle::Admin {
            Ok(user_id)
        } else {
            Err(AuthError::ZugriffVerweigert(format!(
                "kein Admin von Konversation {konversation_id}"
            )))
        }
    }

    /// Wie `teilnehmer_validieren`, aber mit Fehlerursache
    pub fn teilnehmer_erfordern(
        &self,
        wer: &impl AktuellerBenutzer,
        user_ids: &[Uuid],
    ) -> AuthResult<Uuid> {
        let user_id = self.angemeldet_erfordern(wer)?;
        if user_ids.is_empty() {
            return Err(AuthError::UngueltigeTeilnehmer("Liste ist leer".into()));
        }
        if user_ids.iter().any(Uuid::is_nil) {
            return Err(AuthError::UngueltigeTeilnehmer("Nil-ID in der Liste".into()));
        }
        Ok(user_id)
    }
}
