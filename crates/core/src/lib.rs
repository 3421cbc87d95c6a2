//! agora-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Agora-Crates gemeinsam genutzt werden: ID-Newtypes, polymorphe
//! Entitaets-Referenzen und die Change-Events des Realtime-Layers.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{AgoraError, Result};
pub use event::{AenderungsEvent, EreignisArt, EventBus, KeinEventBus, Relation};
pub use types::{EntitaetsRef, EntitaetsTyp, Faehigkeiten, KonversationId, UserId};
