//! Ungelesen-Synchronisation ueber Realtime-Events
//!
//! Verbindet einen `UngelesenTracker` mit dem Abo `unread-messages-{user_id}`:
//! neue fremde Nachrichten, Updates der eigenen Teilnehmer-Zeilen und
//! Konversations-Updates (`last_message_at`) werden in Tracker-Aufrufe
//! uebersetzt.

use std::sync::Arc;

use futures_util::FutureExt;

use agora_chat::UngelesenTracker;
use agora_core::{AenderungsEvent, EreignisArt, Relation, UserId};
use agora_db::{ChatMessageRepository, ConversationRepository, ParticipantRepository};

use crate::error::RealtimeResult;
use crate::registry::{ungelesen_schluessel, AboGuard, AboRegistry};
use crate::transport::{AboCallback, AboSpec, EreignisFilter};

/// Laufende Ungelesen-Synchronisation eines Benutzers
pub struct UngelesenSync<R>
where
    R: ConversationRepository + ParticipantRepository + ChatMessageRepository + 'static,
{
    tracker: Arc<UngelesenTracker<R>>,
    guard: AboGuard,
}

impl<R> UngelesenSync<R>
where
    R: ConversationRepository + ParticipantRepository + ChatMessageRepository + 'static,
{
    /// Abo anmelden; der Tracker sollte vorher initialisiert sein
    pub fn starten(registry: &Arc<AboRegistry>, tracker: Arc<UngelesenTracker<R>>) -> Self {
        let ich = UserId(tracker.user_id());
        let spec = AboSpec {
            name: ungelesen_schluessel(ich.inner()),
            filter: vec![
                EreignisFilter::neu(Relation::Messages)
                    .art(EreignisArt::Insert)
                    .ohne_akteur(ich),
                EreignisFilter::neu(Relation::ConversationParticipants)
                    .art(EreignisArt::Update)
                    .nur_akteur(ich),
                EreignisFilter::neu(Relation::Conversations).art(EreignisArt::Update),
            ],
        };

        let ziel = Arc::clone(&tracker);
        let callback: AboCallback = Arc::new(move |event| {
            let tracker = Arc::clone(&ziel);
            async move { ereignis_verarbeiten(&tracker, event).await }.boxed()
        });

        Self {
            guard: registry.anmelden(spec, callback),
            tracker,
        }
    }

    /// Wartet, bis das Abo steht
    pub async fn bereit(&mut self) -> RealtimeResult<()> {
        self.guard.bereit().await
    }

    pub fn tracker(&self) -> &Arc<UngelesenTracker<R>> {
        &self.tracker
    }

    /// Sitzungsende: Tracker stilllegen, dann Abo freigeben
    pub async fn beenden(self) -> RealtimeResult<()> {
        self.tracker.beenden().await;
        self.guard.freigeben().await
    }
}

async fn ereignis_verarbeiten<R>(tracker: &UngelesenTracker<R>, event: AenderungsEvent)
where
    R: ConversationRepository + ParticipantRepository + ChatMessageRepository + 'static,
{
    let ergebnis = match &event {
        AenderungsEvent::NachrichtEingefuegt {
            konversation_id,
            sender_id,
            created_at,
            ..
        } => {
            tracker
                .nachricht_eingefuegt(konversation_id.inner(), sender_id.inner(), *created_at)
                .await
        }
        AenderungsEvent::TeilnehmerAktualisiert {
            konversation_id,
            user_id,
            ..
        } => {
            tracker
                .teilnehmer_aktualisiert(konversation_id.inner(), user_id.inner())
                .await
        }
        AenderungsEvent::KonversationAktualisiert {
            konversation_id,
            last_message_at,
        } => {
            tracker
                .konversation_aktualisiert(konversation_id.inner(), *last_message_at)
                .await;
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(e) = ergebnis {
        tracing::warn!(
            user_id = %tracker.user_id(),
            konversation_id = %event.konversation_id(),
            fehler = %e,
            "Realtime-Event konnte nicht verarbeitet werden"
        );
    }
}
