//! agora-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration alle Dienste zusammen und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use agora_api::{ApiServer, ApiServerKonfig, ApiState};
use agora_auth::SessionStore;
use agora_chat::{ChatService, HttpVorschauLader, KonversationService, UngelesenTracker, VorschauLader};
use agora_core::EventBus;
use agora_db::{models::NeuerBenutzer, SqliteDb, UserRepository};
use agora_realtime::{AboRegistry, RealtimeHub, RealtimeResult, UngelesenSync};
use config::ServerConfig;

/// Alle laufenden Dienste eines Servers
pub struct Dienste {
    pub db: Arc<SqliteDb>,
    pub hub: Arc<RealtimeHub>,
    pub registry: Arc<AboRegistry>,
    pub sessions: Arc<SessionStore>,
    pub konversationen: Arc<KonversationService<SqliteDb>>,
    pub chat: Arc<ChatService<SqliteDb>>,
}

impl Dienste {
    /// Verdrahtet die Dienste auf einer bereits geoeffneten Datenbank
    pub fn aufbauen(config: &ServerConfig, db: Arc<SqliteDb>) -> Result<Self> {
        let hub = RealtimeHub::neu(config.realtime.puffer);
        let registry = AboRegistry::neu(hub.clone());
        let events: Arc<dyn EventBus> = hub.clone();

        let vorschau: Option<Arc<dyn VorschauLader>> = if config.chat.link_vorschau {
            let lader = HttpVorschauLader::neu(config.vorschau_timeout(), config.chat.vorschau_max_bytes)
                .context("HTTP-Client fuer Link-Vorschau")?;
            Some(Arc::new(lader))
        } else {
            None
        };

        Ok(Self {
            konversationen: KonversationService::neu(db.clone(), events.clone()),
            chat: ChatService::mit_konfig(db.clone(), events, config.chat_konfig(), vorschau),
            sessions: Arc::new(SessionStore::mit_ttl(config.session_ttl())),
            db,
            hub,
            registry,
        })
    }

    /// Startet die Ungelesen-Synchronisation fuer einen Benutzer
    ///
    /// Mehrere Sitzungen desselben Benutzers teilen sich ein Abo.
    pub async fn ungelesen_sync_starten(&self, user_id: Uuid) -> RealtimeResult<UngelesenSync<SqliteDb>> {
        let tracker = UngelesenTracker::neu(self.db.clone(), user_id, self.hub.clone());
        if let Err(e) = tracker.initialisieren().await {
            // Ohne Startwerte zaehlt der Tracker ab jetzt; spaetere Events laden nach
            tracing::warn!(user_id = %user_id, fehler = %e, "Ungelesen-Initialisierung fehlgeschlagen");
        }
        let mut sync = UngelesenSync::starten(&self.registry, tracker);
        sync.bereit().await?;
        Ok(sync)
    }

    /// Legt die konfigurierten Entwicklungs-Benutzer an und gibt ihre Tokens aus
    pub async fn dev_benutzer_anlegen(&self, namen: &[String]) -> Result<Vec<(String, String)>> {
        let mut tokens = Vec::with_capacity(namen.len());
        for name in namen {
            let benutzer = match self.db.get_by_name(name).await? {
                Some(b) => b,
                None => UserRepository::create(self.db.as_ref(), NeuerBenutzer { username: name }).await?,
            };
            let session = self.sessions.erstellen(benutzer.id).await;
            tracing::info!(
                benutzer = %name,
                user_id = %benutzer.id,
                token = %session.token,
                "Entwicklungs-Benutzer bereit"
            );
            tokens.push((name.clone(), session.token));
        }
        Ok(tokens)
    }

    pub fn api_state(&self) -> ApiState {
        ApiState::neu(self.sessions.clone(), self.konversationen.clone(), self.chat.clone())
    }

    /// Realtime-Hub stoppen und Datenbank schliessen
    pub async fn beenden(&self) {
        self.hub.beenden().await;
        self.db.schliessen().await;
    }
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und migrieren
    /// 2. Realtime-Hub, Sessions und Chat-Dienste verdrahten
    /// 3. REST-API starten
    /// 4. Auf Ctrl-C warten, dann geordnet herunterfahren
    pub async fn starten(self) -> Result<()> {
        let bind_addr = self.config.api_bind_adresse()?;
        tracing::info!(
            server_name = %self.config.server.name,
            api = %bind_addr,
            datenbank = %self.config.datenbank.url,
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&self.config.datenbank_config())
                .await
                .context("Datenbank konnte nicht geoeffnet werden")?,
        );
        let dienste = Dienste::aufbauen(&self.config, db)?;
        let cleanup = SessionStore::cleanup_starten(&dienste.sessions);
        dienste
            .dev_benutzer_anlegen(&self.config.server.dev_benutzer)
            .await?;

        let api = ApiServer::neu(ApiServerKonfig {
            bind_addr,
            cors_origins: self.config.netzwerk.cors_origins.clone(),
        });
        let ergebnis = api.starten(dienste.api_state(), shutdown_signal()).await;

        tracing::info!("Server wird beendet");
        cleanup.abort();
        dienste.beenden().await;
        ergebnis
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal konnte nicht empfangen werden");
        // Ohne Signal-Handler bis zum Prozessende weiterlaufen
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown-Signal empfangen");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use agora_chat::{KonversationsTyp, NachrichtOptionen, NeueKonversationAnfrage};

    async fn dienste() -> Dienste {
        let mut config = ServerConfig::default();
        config.chat.link_vorschau = false;
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        Dienste::aufbauen(&config, db).unwrap()
    }

    #[tokio::test]
    async fn dev_benutzer_sind_idempotent() {
        let d = dienste().await;
        let namen = vec!["alice".to_string()];
        let erste = d.dev_benutzer_anlegen(&namen).await.unwrap();
        let zweite = d.dev_benutzer_anlegen(&namen).await.unwrap();

        let s1 = d.sessions.validieren(&erste[0].1).await.unwrap();
        let s2 = d.sessions.validieren(&zweite[0].1).await.unwrap();
        assert_eq!(s1.user_id, s2.user_id);
    }

    #[tokio::test]
    async fn nachricht_erreicht_ungelesen_sync() {
        let d = dienste().await;
        let tokens = d
            .dev_benutzer_anlegen(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        let x = d.sessions.validieren(&tokens[0].1).await.unwrap();
        let y = d.sessions.validieren(&tokens[1].1).await.unwrap();

        let konv = d
            .konversationen
            .erstellen(
                &x,
                NeueKonversationAnfrage {
                    conversation_type: KonversationsTyp::Direct,
                    participant_ids: vec![y.user_id],
                    title: None,
                    description: None,
                    collective_id: None,
                    is_private: true,
                },
            )
            .await
            .unwrap()
            .konversation
            .id;

        let sync = d.ungelesen_sync_starten(x.user_id).await.unwrap();
        d.chat
            .nachricht_senden(&y, konv, "hallo", NachrichtOptionen::default())
            .await
            .unwrap();

        let mut angekommen = false;
        for _ in 0..200 {
            if sync.tracker().stand(konv).await.is_some_and(|s| s.unread_count == 1) {
                angekommen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(angekommen, "Realtime-Event muss den Tracker erreichen");

        sync.beenden().await.unwrap();
        d.beenden().await;
    }
}
