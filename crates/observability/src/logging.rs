//! Structured Logging Setup via tracing-subscriber
//!
//! Umgebungsvariablen haben Vorrang vor der Konfiguration:
//! - `AGORA_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder `info,sqlx=warn`)
//! - `AGORA_LOG_FORMAT`: `text` oder `json`

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "AGORA_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "AGORA_LOG_FORMAT";

/// Gedrosselte Bibliotheken, solange der Filter sie nicht selbst nennt
const STANDARD_DIREKTIVEN: &[&str] = &["sqlx=warn", "hyper=warn"];

#[derive(Debug, Error)]
pub enum LoggingFehler {
    #[error("Ungueltiger Log-Level: {0}")]
    UngueltigerLevel(String),

    #[error("Ungueltiges Log-Format: {0} (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Logging bereits initialisiert")]
    BereitsInitialisiert,
}

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(LoggingFehler::UngueltigesFormat(anders.to_string())),
        }
    }
}

/// Einfacher Level-Name (ohne Direktiven)?
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Baut den Filter aus Level bzw. Direktiven
fn filter_bauen(level: &str) -> Result<EnvFilter, LoggingFehler> {
    let level = level.trim();
    if level.is_empty() {
        return Err(LoggingFehler::UngueltigerLevel(String::new()));
    }
    // Ein einzelnes Wort muss ein bekannter Level sein; Tippfehler wie
    // "verbose" wuerden sonst still als Target-Filter interpretiert
    if !level.contains(['=', ',']) && !log_level_gueltig(level) {
        return Err(LoggingFehler::UngueltigerLevel(level.to_string()));
    }

    let mut filter = EnvFilter::try_new(level)
        .map_err(|e| LoggingFehler::UngueltigerLevel(format!("{level}: {e}")))?;
    for direktive in STANDARD_DIREKTIVEN {
        let target = direktive.split('=').next().unwrap_or_default();
        if !level.contains(target) {
            if let Ok(d) = direktive.parse() {
                filter = filter.add_directive(d);
            }
        }
    }
    Ok(filter)
}

/// Effektive Einstellungen: Umgebung vor Konfiguration
fn aufloesen(
    level: &str,
    format: &str,
    env_level: Option<String>,
    env_format: Option<String>,
) -> Result<(EnvFilter, LogFormat), LoggingFehler> {
    let level = env_level
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| level.to_string());
    let format = env_format
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format.to_string());

    Ok((filter_bauen(&level)?, format.trim().parse()?))
}

/// Initialisiert das Logging-System
///
/// Darf pro Prozess nur einmal aufgerufen werden; ein zweiter Aufruf
/// liefert `BereitsInitialisiert`.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<LogFormat, LoggingFehler> {
    let (filter, log_format) = aufloesen(
        level,
        format,
        std::env::var(ENV_LOG_LEVEL).ok(),
        std::env::var(ENV_LOG_FORMAT).ok(),
    )?;

    let ergebnis = match log_format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|_| LoggingFehler::BereitsInitialisiert)?;
    Ok(log_format)
}
