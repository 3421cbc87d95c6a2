//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use agora_chat::ChatKonfig;
use agora_db::DatabaseConfig;
use agora_observability::LogFormat;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "AGORA_CONFIG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerEinstellungen,
    pub netzwerk: NetzwerkEinstellungen,
    pub datenbank: DatenbankEinstellungen,
    pub logging: LoggingEinstellungen,
    pub chat: ChatEinstellungen,
    pub realtime: RealtimeEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Lebensdauer einer Session in Stunden
    pub session_ttl_stunden: u64,
    /// Benutzer, die beim Start angelegt werden und ein Token erhalten.
    /// Nur fuer Entwicklung, der Login laeuft sonst ueber einen externen Dienst.
    pub dev_benutzer: Vec<String>,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Agora".into(),
            session_ttl_stunden: 24,
            dev_benutzer: vec![],
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer die REST-API
    pub api_port: u16,
    /// CORS-Origins fuer REST (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "127.0.0.1".into(),
            api_port: 8080,
            cors_origins: vec![],
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let standard = DatabaseConfig::default();
        Self {
            url: standard.url,
            max_verbindungen: standard.max_verbindungen,
            sqlite_wal: standard.sqlite_wal,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Level oder Filter-Direktiven, z.B. "info" oder "info,agora_chat=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Chat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEinstellungen {
    /// Standardgroesse einer History-Seite
    pub history_limit: i64,
    /// Maximale Suchtreffer
    pub such_limit: i64,
    /// Link-Vorschau fuer Text-Nachrichten
    pub link_vorschau: bool,
    /// Timeout fuer das Laden einer Vorschau in Millisekunden
    pub vorschau_timeout_ms: u64,
    /// Maximale Groesse der geladenen HTML-Seite
    pub vorschau_max_bytes: usize,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        let standard = ChatKonfig::default();
        Self {
            history_limit: standard.history_limit,
            such_limit: standard.such_limit,
            link_vorschau: standard.link_vorschau,
            vorschau_timeout_ms: 5_000,
            vorschau_max_bytes: agora_chat::link_vorschau::STANDARD_MAX_BYTES,
        }
    }
}

/// Realtime-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeEinstellungen {
    /// Puffergroesse des Event-Kanals; langsame Abos verlieren aeltere Events
    pub puffer: usize,
}

impl Default for RealtimeEinstellungen {
    fn default() -> Self {
        Self {
            puffer: agora_realtime::STANDARD_PUFFER,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Logging ist hier noch nicht initialisiert
                eprintln!("Konfigurationsdatei '{pfad}' nicht gefunden, verwende Standardwerte");
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Konfigurationsdatei '{pfad}' nicht lesbar"))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        self.logging
            .format
            .parse::<LogFormat>()
            .context("logging.format")?;
        if self.logging.level.trim().is_empty() {
            bail!("logging.level darf nicht leer sein");
        }
        if self.chat.history_limit <= 0 || self.chat.such_limit <= 0 {
            bail!("chat.history_limit und chat.such_limit muessen positiv sein");
        }
        if self.realtime.puffer == 0 {
            bail!("realtime.puffer muss groesser als 0 sein");
        }
        if self.server.session_ttl_stunden == 0 {
            bail!("server.session_ttl_stunden muss groesser als 0 sein");
        }
        self.api_bind_adresse()?;
        Ok(())
    }

    /// Bind-Adresse fuer die REST-API
    pub fn api_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{adresse}'"))
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    pub fn chat_konfig(&self) -> ChatKonfig {
        ChatKonfig {
            history_limit: self.chat.history_limit,
            such_limit: self.chat.such_limit,
            link_vorschau: self.chat.link_vorschau,
        }
    }

    pub fn vorschau_timeout(&self) -> Duration {
        Duration::from_millis(self.chat.vorschau_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.server.session_ttl_stunden * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.netzwerk.api_port, 8080);
        assert_eq!(cfg.datenbank.url, "sqlite://agora.db");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.chat.history_limit, 50);
        assert_eq!(cfg.realtime.puffer, agora_realtime::STANDARD_PUFFER);
        assert_eq!(cfg.session_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.api_bind_adresse().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn config_aus_toml_string() {
        let cfg = ServerConfig::aus_toml(
            r#"
            [server]
            name = "Testserver"
            dev_benutzer = ["alice", "bob"]

            [netzwerk]
            api_port = 9000

            [chat]
            link_vorschau = false

            [logging]
            format = "json"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.server.name, "Testserver");
        assert_eq!(cfg.server.dev_benutzer, vec!["alice", "bob"]);
        assert_eq!(cfg.netzwerk.api_port, 9000);
        assert!(!cfg.chat_konfig().link_vorschau);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "127.0.0.1");
        assert_eq!(cfg.chat.such_limit, 50);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let cfg = ServerConfig::aus_toml("[logging]\nformat = \"xml\"").unwrap();
        assert!(cfg.validieren().is_err());

        let cfg = ServerConfig::aus_toml("[realtime]\npuffer = 0").unwrap();
        assert!(cfg.validieren().is_err());

        let cfg = ServerConfig::aus_toml("[netzwerk]\nbind_adresse = \"kein host\"").unwrap();
        assert!(cfg.validieren().is_err());

        assert!(ServerConfig::aus_toml("[chat]\nhistory_limit = \"viele\"").is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/pfad/der/nicht/existiert/agora.toml").unwrap();
        assert_eq!(cfg.server.name, "Agora");
    }
}
