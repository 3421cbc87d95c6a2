//! agora-realtime – Change-Events in Echtzeit verteilen
//!
//! Dieses Crate implementiert:
//! - RealtimeHub: In-Process-Transport und `EventBus` (broadcast + DashMap)
//! - AboRegistry: referenzgezaehlte Abos, hoechstens eins pro Schluessel
//! - UngelesenSync: haelt einen `UngelesenTracker` ueber Events aktuell
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use agora_realtime::{AboRegistry, RealtimeHub, STANDARD_PUFFER};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = RealtimeHub::neu(STANDARD_PUFFER);
//!     let registry = AboRegistry::neu(hub.clone());
//! }
//! ```

pub mod error;
pub mod hub;
pub mod registry;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{RealtimeError, RealtimeResult};
pub use hub::{RealtimeHub, STANDARD_PUFFER};
pub use registry::{
    feed_schluessel, ungelesen_schluessel, video_status_schluessel, AboGuard, AboRegistry,
    AboStatus,
};
pub use sync::UngelesenSync;
pub use transport::{AboCallback, AboId, AboSpec, EreignisFilter, RealtimeTransport};
