//! Zeitstempel- und UUID-Konvertierung fuer SQLite-Spalten
//!
//! Zeitstempel werden als RFC3339 UTC mit fester Nanosekunden-Breite
//! gespeichert. Damit entspricht der Stringvergleich in SQL der zeitlichen
//! Reihenfolge.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Formatiert einen Zeitstempel fuer die Datenbank
pub(crate) fn formatieren(zeit: DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parsen(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

pub(crate) fn parsen_opt(s: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parsen).transpose()
}

/// Liefert einen Zeitpunkt, der strikt nach `vorher` liegt
///
/// Zwei schnell aufeinanderfolgende Nachrichten duerfen nie denselben
/// `created_at` bekommen, sonst bricht der Cursor der History.
pub(crate) fn strikt_nach(vorher: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let jetzt = Utc::now();
    match vorher {
        Some(v) if jetzt <= v => v + Duration::microseconds(1),
        _ => jetzt,
    }
}

pub(crate) fn uuid_parsen(s: &str, feld: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::intern(format!("Ungueltige {feld} UUID '{s}': {e}")))
}

pub(crate) fn uuid_parsen_opt(s: Option<String>, feld: &str) -> DbResult<Option<Uuid>> {
    s.as_deref().map(|v| uuid_parsen(v, feld)).transpose()
}
