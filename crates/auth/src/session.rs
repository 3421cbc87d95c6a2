//! Session-Management fuer Agora
//!
//! Das Login selbst passiert ausserhalb (externer Auth-Dienst). Hier werden
//! nur die daraus entstehenden Bearer-Tokens verwaltet. Sessions liegen im
//! Speicher mit konfigurierbarer Lebensdauer; ein Hintergrund-Task raeumt
//! abgelaufene Eintraege auf.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::{sync::RwLock, task::JoinHandle};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Standard-Session-Lebensdauer: 24 Stunden
pub const STANDARD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Intervall fuer den automatischen Cleanup-Task: 15 Minuten
const CLEANUP_INTERVALL: Duration = Duration::from_secs(15 * 60);

/// Ein aktives Session-Token
#[derive(Debug, Clone)]
pub struct Session {
    /// Der Token-String (URL-sicheres Base64)
    pub token: String,
    pub user_id: Uuid,
    pub erstellt_am: DateTime<Utc>,
    pub laeuft_ab_am: DateTime<Utc>,
}

impl Session {
    /// Gibt `true` zurueck wenn die Session noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// In-Memory Session-Store mit TTL
#[derive(Debug)]
pub struct SessionStore {
    /// token -> Session
    sessions: RwLock<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::mit_ttl(STANDARD_TTL)
    }
}

impl SessionStore {
    /// Erstellt einen neuen leeren Session-Store mit Standard-TTL
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mit_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    /// Startet den periodischen Cleanup-Task
    pub fn cleanup_starten(store: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::downgrade(store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVALL).await;
                // Store weg -> Task beenden
                let Some(store) = store.upgrade() else { break };
                let entfernt = store.cleanup_abgelaufene().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Sessions bereinigt");
                }
            }
        })
    }

    /// Erstellt eine neue Session fuer einen (extern authentifizierten) Benutzer
    pub async fn erstellen(&self, user_id: Uuid) -> Session {
        let token = token_generieren();
        let jetzt = Utc::now();
        let session = Session {
            token: token.clone(),
            user_id,
            erstellt_am: jetzt,
            laeuft_ab_am: jetzt + self.ttl,
        };

        self.sessions.write().await.insert(token, session.clone());
        tracing::debug!(user_id = %user_id, "Neue Session erstellt");
        session
    }

    /// Validiert einen Session-Token und gibt die Session zurueck
    ///
    /// Unbekannte Tokens ergeben `SessionUngueltig`, abgelaufene `SessionAbgelaufen`.
    pub async fn validieren(&self, token: &str) -> AuthResult<Session> {
        let sessions = self.sessions.read().await;
        match sessions.get(token) {
            None => Err(AuthError::SessionUngueltig),
            Some(session) if !session.ist_gueltig() => Err(AuthError::SessionAbgelaufen),
            Some(session) => Ok(session.clone()),
        }
    }

    /// Invalidiert (loescht) eine Session anhand des Tokens
    pub async fn invalidieren(&self, token: &str) -> bool {
        let entfernt = self.sessions.write().await.remove(token).is_some();
        if entfernt {
            tracing::debug!("Session invalidiert");
        }
        entfernt
    }

    /// Meldet einen Benutzer auf allen Geraeten ab
    pub async fn benutzer_abmelden(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        let entfernt = vorher - sessions.len();
        if entfernt > 0 {
            tracing::info!(user_id = %user_id, anzahl = entfernt, "Alle Sessions des Benutzers beendet");
        }
        entfernt
    }

    /// Bereinigt abgelaufene Sessions und gibt die Anzahl der entfernten zurueck
    pub async fn cleanup_abgelaufene(&self) -> usize {
        let jetzt = Utc::now();
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.laeuft_ab_am > jetzt);
        vorher - sessions.len()
    }

    /// Gibt die Anzahl der aktiven (nicht abgelaufenen) Sessions zurueck
    pub async fn anzahl_aktive(&self) -> usize {
        let jetzt = Utc::now();
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.laeuft_ab_am > jetzt).count()
    }
}

/// Generiert einen kryptografisch sicheren Session-Token (URL-sicheres Base64)
fn token_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
