//! RealtimeHub – In-Process-Verteilung von Change-Events
//!
//! Die Services veroeffentlichen ueber `EventBus::senden` in einen
//! `broadcast`-Kanal. Jedes benannte Abo hat einen eigenen Weiterleitungs-
//! Task, der Events filtert und den Callback nacheinander aufruft.
//!
//! Beim Abbestellen wird der Name sofort aus der Tabelle entfernt; danach
//! wird der Task gestoppt und abgewartet.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use agora_core::{AenderungsEvent, AgoraError, EventBus};

use crate::error::{RealtimeError, RealtimeResult};
use crate::transport::{AboCallback, AboId, AboSpec, RealtimeTransport};

/// Standard-Puffergroesse des Event-Kanals
pub const STANDARD_PUFFER: usize = 1024;

struct Kanal {
    abo_id: AboId,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Zentraler Realtime-Hub
///
/// Thread-safe via DashMap; wird als `Arc<RealtimeHub>` geteilt und sowohl
/// als `EventBus` als auch als `RealtimeTransport` verwendet.
pub struct RealtimeHub {
    sender: broadcast::Sender<AenderungsEvent>,
    kanaele: DashMap<String, Kanal>,
    shutdown: CancellationToken,
}

impl RealtimeHub {
    pub fn neu(puffer: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(puffer.max(1));
        Arc::new(Self {
            sender,
            kanaele: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Anzahl aktiver benannter Abos
    pub fn anzahl_kanaele(&self) -> usize {
        self.kanaele.len()
    }

    pub fn ist_abonniert(&self, name: &str) -> bool {
        self.kanaele.contains_key(name)
    }

    /// Stoppt alle Weiterleitungen; weitere Events werden abgelehnt
    pub async fn beenden(&self) {
        self.shutdown.cancel();
        let namen: Vec<String> = self.kanaele.iter().map(|e| e.key().clone()).collect();
        for name in namen {
            if let Some((_, kanal)) = self.kanaele.remove(&name) {
                kanal_stoppen(&name, kanal).await;
            }
        }
        tracing::info!("Realtime-Hub beendet");
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeHub {
    async fn abonnieren(&self, spec: AboSpec, callback: AboCallback) -> RealtimeResult<AboId> {
        if self.shutdown.is_cancelled() {
            return Err(RealtimeError::Geschlossen);
        }

        match self.kanaele.entry(spec.name.clone()) {
            Entry::Occupied(_) => Err(RealtimeError::BereitsAbonniert(spec.name)),
            Entry::Vacant(platz) => {
                let abo_id = AboId::new();
                let stop = self.shutdown.child_token();
                let rx = self.sender.subscribe();
                let name = spec.name.clone();
                let task = tokio::spawn(weiterleiten(spec, rx, callback, stop.clone()));
                platz.insert(Kanal { abo_id, stop, task });
                tracing::debug!(kanal = %name, abo_id = %abo_id, "Kanal abonniert");
                Ok(abo_id)
            }
        }
    }

    async fn abbestellen(&self, name: &str, abo_id: AboId) -> RealtimeResult<()> {
        // Nur das eigene Abo entfernen, nicht ein neueres unter gleichem Namen
        match self.kanaele.remove_if(name, |_, kanal| kanal.abo_id == abo_id) {
            Some((name, kanal)) => {
                kanal_stoppen(&name, kanal).await;
                tracing::debug!(kanal = %name, abo_id = %abo_id, "Kanal abbestellt");
            }
            None => {
                tracing::debug!(kanal = %name, abo_id = %abo_id, "Abbestellen: Abo nicht (mehr) vorhanden");
            }
        }
        Ok(())
    }
}

impl EventBus for RealtimeHub {
    fn senden(&self, event: AenderungsEvent) -> agora_core::Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(AgoraError::EventBusGeschlossen);
        }
        // Ohne Empfaenger liefert send() einen Fehler; das ist hier normal
        if self.sender.send(event).is_err() {
            tracing::trace!("Event ohne Abonnenten verworfen");
        }
        Ok(())
    }
}

async fn kanal_stoppen(name: &str, kanal: Kanal) {
    kanal.stop.cancel();
    if let Err(e) = kanal.task.await {
        tracing::warn!(kanal = %name, fehler = %e, "Weiterleitungs-Task abgebrochen");
    }
}

/// Weiterleitungs-Task eines Abos
async fn weiterleiten(
    spec: AboSpec,
    mut rx: broadcast::Receiver<AenderungsEvent>,
    callback: AboCallback,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            ergebnis = rx.recv() => match ergebnis {
                Ok(event) => {
                    if spec.passt(&event) {
                        callback(event).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(kanal = %spec.name, verpasst = n, "Abo hinkt hinterher, Events verworfen");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::trace!(kanal = %spec.name, "Weiterleitung beendet");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use agora_core::{KonversationId, Relation, UserId};
    use futures_util::FutureExt;
    use tokio::sync::mpsc;

    use crate::transport::EreignisFilter;

    fn sammler() -> (AboCallback, mpsc::UnboundedReceiver<AenderungsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: AboCallback = Arc::new(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
            .boxed()
        });
        (callback, rx)
    }

    fn spec(name: &str) -> AboSpec {
        AboSpec {
            name: name.into(),
            filter: vec![EreignisFilter::neu(Relation::ConversationParticipants)],
        }
    }

    fn beitritt() -> AenderungsEvent {
        AenderungsEvent::TeilnehmerEingefuegt {
            konversation_id: KonversationId::new(),
            user_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn events_werden_gefiltert_zugestellt() {
        let hub = RealtimeHub::neu(16);
        let (callback, mut rx) = sammler();
        hub.abonnieren(spec("test"), callback).await.unwrap();

        let event = beitritt();
        hub.senden(event.clone()).unwrap();
        hub.senden(AenderungsEvent::NachrichtAktualisiert {
            nachricht_id: uuid::Uuid::new_v4(),
            konversation_id: KonversationId::new(),
            edited_at: None,
            deleted_at: None,
        })
        .unwrap();

        let empfangen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event muss ankommen")
            .unwrap();
        assert_eq!(empfangen, event);
        assert!(rx.try_recv().is_err(), "Nachrichten-Event darf nicht durch den Filter");
    }

    #[tokio::test]
    async fn doppelter_name_wird_abgelehnt() {
        let hub = RealtimeHub::neu(16);
        let (cb1, _rx1) = sammler();
        let (cb2, _rx2) = sammler();

        hub.abonnieren(spec("doppelt"), cb1).await.unwrap();
        let fehler = hub.abonnieren(spec("doppelt"), cb2).await.unwrap_err();
        assert!(fehler.ist_bereits_abonniert());
        assert_eq!(hub.anzahl_kanaele(), 1);
    }

    #[tokio::test]
    async fn abbestellen_nur_mit_passender_id() {
        let hub = RealtimeHub::neu(16);
        let (callback, mut rx) = sammler();
        let abo_id = hub.abonnieren(spec("k"), callback).await.unwrap();

        hub.abbestellen("k", AboId::new()).await.unwrap();
        assert!(hub.ist_abonniert("k"));

        hub.abbestellen("k", abo_id).await.unwrap();
        assert!(!hub.ist_abonniert("k"));

        hub.senden(beitritt()).unwrap();
        // Der Sender des Callbacks lebte im gestoppten Task
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn senden_ohne_abonnenten_ist_ok() {
        let hub = RealtimeHub::neu(16);
        assert!(hub.senden(beitritt()).is_ok());

        hub.beenden().await;
        assert!(hub.senden(beitritt()).is_err());
        let (callback, _rx) = sammler();
        assert!(matches!(
            hub.abonnieren(spec("spaet"), callback).await,
            Err(RealtimeError::Geschlossen)
        ));
    }
}
