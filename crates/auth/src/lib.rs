//! agora-auth – Sessions und Zugriffs-Gate
//!
//! Dieses Crate implementiert:
//! - Session-Management (in-memory mit TTL, Bearer-Tokens)
//! - `AktuellerBenutzer`: wer ist gerade angemeldet?
//! - `ZugriffsGate`: darf der aktuelle Benutzer eine Konversation sehen
//!   bzw. dort schreiben?
//!
//! Das Gate ersetzt die Pruefungen der Datenbank nicht, es spiegelt sie.

pub mod error;
pub mod session;
pub mod zugriff;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use session::{Session, SessionStore};
pub use zugriff::{AktuellerBenutzer, ZugriffsGate};
