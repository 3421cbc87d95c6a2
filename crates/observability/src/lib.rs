//! # agora-observability
//!
//! Structured Logging fuer Agora via tracing-subscriber, wahlweise als
//! Text oder JSON. Level und Format kommen aus der Konfiguration und
//! koennen per Umgebung ueberschrieben werden.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingFehler};
