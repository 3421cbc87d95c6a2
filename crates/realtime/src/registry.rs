//! AboRegistry – hoechstens ein Realtime-Abo pro Schluessel
//!
//! Mehrere Stellen koennen dasselbe Abo (z.B. `unread-messages-{user_id}`)
//! anfordern. Nur die erste loest ein Abonnieren beim Transport aus, jede
//! weitere traegt lediglich ihren Callback ein. Der Transport kennt einen
//! einzigen Verteiler-Callback, der jedes Event an alle eingetragenen
//! Callbacks weiterreicht. Freigeben traegt den eigenen Callback sofort aus;
//! erst die letzte Referenz entfernt den Schluessel (synchron) und baut das
//! Abo danach asynchron ab.
//!
//! Abonnieren und Abbauen laufen pro Schluessel strikt in der Reihenfolge,
//! in der sie angestossen wurden. Die Reihenfolge wird synchron unter dem
//! Registry-Lock festgelegt (Ticket), abgearbeitet wird asynchron. So kann
//! ein verspaeteter Abbau nie ein neueres Abo unter gleichem Namen treffen.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{RealtimeError, RealtimeResult};
use crate::transport::{AboCallback, AboId, AboSpec, RealtimeTransport};

/// Schluessel des Ungelesen-Abos eines Benutzers
pub fn ungelesen_schluessel(user_id: impl std::fmt::Display) -> String {
    format!("unread-messages-{user_id}")
}

/// Schluessel des Video-Status-Abos eines Benutzers
pub fn video_status_schluessel(user_id: impl std::fmt::Display) -> String {
    format!("video-status-{user_id}")
}

/// Schluessel des Feed-Abos eines Mandanten
pub fn feed_schluessel(mandant_id: impl std::fmt::Display) -> String {
    format!("feed-{mandant_id}")
}

/// Sichtbarer Zustand eines Abos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AboStatus {
    /// Abonnieren beim Transport laeuft noch
    Ausstehend,
    Aktiv,
    /// Abonnieren ist fehlgeschlagen, der Schluessel wurde entfernt
    Fehlgeschlagen(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ausstehend,
    Aktiv(AboId),
    /// Transport meldete "bereits abonniert"; das bestehende Abo gehoert uns nicht
    Uebernommen,
}

/// Callbacks aller lebenden Guards eines Schluessels
type Empfaenger = Arc<Mutex<Vec<(u64, AboCallback)>>>;

struct Eintrag {
    generation: u64,
    empfaenger: Empfaenger,
    phase: Phase,
    status: watch::Sender<AboStatus>,
}

impl Eintrag {
    fn referenzen(&self) -> usize {
        self.empfaenger.lock().len()
    }
}

/// Ticket-Reihenfolge pro Schluessel
struct Warteschlange {
    naechstes: u64,
    bedient: watch::Sender<u64>,
}

#[derive(Default)]
struct Zustand {
    eintraege: HashMap<String, Eintrag>,
    schlangen: HashMap<String, Warteschlange>,
    naechste_generation: u64,
    naechster_empfaenger: u64,
}

/// Referenzgezaehlte Registry fuer Realtime-Abos
///
/// Der Lock wird nie ueber ein `.await` gehalten.
pub struct AboRegistry {
    transport: Arc<dyn RealtimeTransport>,
    zustand: Mutex<Zustand>,
}

impl AboRegistry {
    pub fn neu(transport: Arc<dyn RealtimeTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            zustand: Mutex::new(Zustand::default()),
        })
    }

    /// Abo anfordern
    ///
    /// Kehrt sofort zurueck. Das eigentliche Abonnieren laeuft im
    /// Hintergrund; `AboGuard::bereit` wartet auf das Ergebnis. Muss
    /// innerhalb einer Tokio-Runtime aufgerufen werden.
    pub fn anmelden(self: &Arc<Self>, spec: AboSpec, callback: AboCallback) -> AboGuard {
        let name = spec.name.clone();
        let mut zustand = self.zustand.lock();
        let empfaenger_id = zustand.naechster_empfaenger;
        zustand.naechster_empfaenger += 1;

        if let Some(eintrag) = zustand.eintraege.get_mut(&name) {
            eintrag.empfaenger.lock().push((empfaenger_id, callback));
            tracing::debug!(kanal = %name, referenzen = eintrag.referenzen(), "Abo bereits registriert");
            return AboGuard {
                registry: Some(Arc::clone(self)),
                name,
                generation: eintrag.generation,
                empfaenger_id,
                status: eintrag.status.subscribe(),
            };
        }

        let generation = zustand.naechste_generation;
        zustand.naechste_generation += 1;
        let (status_tx, status_rx) = watch::channel(AboStatus::Ausstehend);
        let empfaenger: Empfaenger = Arc::new(Mutex::new(vec![(empfaenger_id, callback)]));
        zustand.eintraege.insert(
            name.clone(),
            Eintrag {
                generation,
                empfaenger: Arc::clone(&empfaenger),
                phase: Phase::Ausstehend,
                status: status_tx,
            },
        );
        let ticket = ticket_ziehen(&mut zustand, &name);
        drop(zustand);

        tracing::debug!(kanal = %name, "Abo registriert, abonniere");
        tokio::spawn(Arc::clone(self).abonnieren(spec, verteiler(empfaenger), generation, ticket));

        AboGuard {
            registry: Some(Arc::clone(self)),
            name,
            generation,
            empfaenger_id,
            status: status_rx,
        }
    }

    /// Ob der Schluessel aktuell registriert ist
    pub fn ist_registriert(&self, name: &str) -> bool {
        self.zustand.lock().eintraege.contains_key(name)
    }

    /// Referenzzaehler eines Schluessels (0 wenn nicht registriert)
    pub fn referenzen(&self, name: &str) -> usize {
        self.zustand
            .lock()
            .eintraege
            .get(name)
            .map_or(0, Eintrag::referenzen)
    }

    pub fn anzahl(&self) -> usize {
        self.zustand.lock().eintraege.len()
    }

    async fn abonnieren(self: Arc<Self>, spec: AboSpec, callback: AboCallback, generation: u64, ticket: Ticket) {
        let name = spec.name.clone();
        self.ticket_abwarten(&ticket).await;

        let ergebnis = self.transport.abonnieren(spec, callback).await;

        let spaeter_abbau = {
            let mut zustand = self.zustand.lock();
            let eigener = zustand
                .eintraege
                .get(&name)
                .is_some_and(|e| e.generation == generation);

            match ergebnis {
                Ok(abo_id) if eigener => {
                    if let Some(e) = zustand.eintraege.get_mut(&name) {
                        e.phase = Phase::Aktiv(abo_id);
                        e.status.send_replace(AboStatus::Aktiv);
                    }
                    tracing::debug!(kanal = %name, abo_id = %abo_id, "Abo aktiv");
                    None
                }
                // Schluessel wurde freigegeben, waehrend das Abonnieren lief
                Ok(abo_id) => Some(abo_id),
                Err(e) if e.ist_bereits_abonniert() => {
                    tracing::warn!(kanal = %name, "Kanal bereits abonniert, bestehendes Abo wird weiterverwendet");
                    if let Some(eintrag) = zustand.eintraege.get_mut(&name).filter(|_| eigener) {
                        eintrag.phase = Phase::Uebernommen;
                        eintrag.status.send_replace(AboStatus::Aktiv);
                    }
                    None
                }
                Err(e) => {
                    if eigener {
                        if let Some(eintrag) = zustand.eintraege.remove(&name) {
                            eintrag.status.send_replace(AboStatus::Fehlgeschlagen(e.to_string()));
                        }
                        tracing::error!(kanal = %name, fehler = %e, "Abonnieren fehlgeschlagen, Registrierung zurueckgenommen");
                    } else {
                        tracing::warn!(kanal = %name, fehler = %e, "Abonnieren fehlgeschlagen (bereits freigegeben)");
                    }
                    None
                }
            }
        };

        if let Some(abo_id) = spaeter_abbau {
            tracing::debug!(kanal = %name, abo_id = %abo_id, "Verspaetetes Abo wird sofort abgebaut");
            if let Err(e) = self.transport.abbestellen(&name, abo_id).await {
                tracing::warn!(kanal = %name, fehler = %e, "Abbau fehlgeschlagen");
            }
        }
        self.ticket_einloesen(ticket);
    }

    /// Synchroner Teil der Freigabe
    ///
    /// Liefert Abo-ID und Ticket, wenn der Transport-Abbau noch aussteht.
    fn referenz_freigeben(&self, name: &str, generation: u64, empfaenger_id: u64) -> Option<(AboId, Ticket)> {
        let mut zustand = self.zustand.lock();
        let eintrag = zustand
            .eintraege
            .get_mut(name)
            .filter(|e| e.generation == generation)?;

        let verbleibend = {
            let mut empfaenger = eintrag.empfaenger.lock();
            empfaenger.retain(|(id, _)| *id != empfaenger_id);
            empfaenger.len()
        };
        if verbleibend > 0 {
            tracing::debug!(kanal = %name, referenzen = verbleibend, "Abo-Referenz freigegeben");
            return None;
        }

        let eintrag = zustand.eintraege.remove(name)?;
        tracing::debug!(kanal = %name, "Letzte Referenz freigegeben, Schluessel entfernt");
        match eintrag.phase {
            Phase::Aktiv(abo_id) => Some((abo_id, ticket_ziehen(&mut zustand, name))),
            // Das laufende Abonnieren baut selbst ab
            Phase::Ausstehend => None,
            Phase::Uebernommen => None,
        }
    }

    async fn abbauen(&self, name: &str, abo_id: AboId, ticket: Ticket) -> RealtimeResult<()> {
        self.ticket_abwarten(&ticket).await;
        let ergebnis = self.transport.abbestellen(name, abo_id).await;
        self.ticket_einloesen(ticket);
        ergebnis
    }

    async fn ticket_abwarten(&self, ticket: &Ticket) {
        let rx = {
            let zustand = self.zustand.lock();
            zustand.schlangen.get(&ticket.name).map(|s| s.bedient.subscribe())
        };
        let Some(mut rx) = rx else {
            return;
        };
        let nummer = ticket.nummer;
        if rx.wait_for(|bedient| *bedient >= nummer).await.is_err() {
            tracing::warn!(kanal = %ticket.name, "Warteschlange geschlossen");
        }
    }

    fn ticket_einloesen(&self, ticket: Ticket) {
        let mut zustand = self.zustand.lock();
        let Some(schlange) = zustand.schlangen.get(&ticket.name) else {
            return;
        };
        schlange.bedient.send_replace(ticket.nummer + 1);
        // Leere Warteschlangen aufraeumen
        if schlange.naechstes == ticket.nummer + 1 {
            zustand.schlangen.remove(&ticket.name);
        }
    }
}

/// Transport-Callback eines Schluessels: reicht jedes Event nacheinander an
/// alle eingetragenen Callbacks weiter
fn verteiler(empfaenger: Empfaenger) -> AboCallback {
    Arc::new(move |event| {
        let ziele: Vec<AboCallback> = empfaenger
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        async move {
            for ziel in ziele {
                ziel(event.clone()).await;
            }
        }
        .boxed()
    })
}

/// Platz in der Warteschlange eines Schluessels
struct Ticket {
    name: String,
    nummer: u64,
}

fn ticket_ziehen(zustand: &mut Zustand, name: &str) -> Ticket {
    let schlange = zustand
        .schlangen
        .entry(name.to_string())
        .or_insert_with(|| Warteschlange {
            naechstes: 0,
            bedient: watch::channel(0).0,
        });
    let nummer = schlange.naechstes;
    schlange.naechstes += 1;
    Ticket {
        name: name.to_string(),
        nummer,
    }
}

/// Referenz auf ein registriertes Abo
///
/// Beim Drop wird die Referenz synchron freigegeben; war es die letzte,
/// laeuft der Transport-Abbau in einem eigenen Task. `freigeben` wartet
/// stattdessen auf den Abbau.
pub struct AboGuard {
    registry: Option<Arc<AboRegistry>>,
    name: String,
    generation: u64,
    empfaenger_id: u64,
    status: watch::Receiver<AboStatus>,
}

impl AboGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AboStatus {
        self.status.borrow().clone()
    }

    /// Wartet, bis das Abonnieren abgeschlossen ist
    pub async fn bereit(&mut self) -> RealtimeResult<()> {
        // Ein geschlossener Kanal liefert den zuletzt gesetzten Status
        let _ = self.status.wait_for(|s| *s != AboStatus::Ausstehend).await;
        let status = self.status.borrow().clone();
        match status {
            AboStatus::Aktiv => Ok(()),
            AboStatus::Fehlgeschlagen(msg) => Err(RealtimeError::AboFehlgeschlagen(msg)),
            AboStatus::Ausstehend => Err(RealtimeError::intern(format!(
                "Abo {} ohne Ergebnis beendet",
                self.name
            ))),
        }
    }

    /// Referenz freigeben und einen eventuellen Abbau abwarten
    ///
    /// Der Abbau laeuft in einem eigenen Task und wird auch dann zu Ende
    /// gefuehrt, wenn der Aufrufer nicht mehr wartet.
    pub async fn freigeben(mut self) -> RealtimeResult<()> {
        let Some(registry) = self.registry.take() else {
            return Ok(());
        };
        let Some((abo_id, ticket)) = registry.referenz_freigeben(&self.name, self.generation, self.empfaenger_id) else {
            return Ok(());
        };
        let name = self.name.clone();
        tokio::spawn(async move { registry.abbauen(&name, abo_id, ticket).await })
            .await
            .map_err(|e| RealtimeError::intern(format!("Abbau-Task: {e}")))?
    }
}

impl Drop for AboGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.take() else {
            return;
        };
        let Some((abo_id, ticket)) = registry.referenz_freigeben(&self.name, self.generation, self.empfaenger_id) else {
            return;
        };

        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = registry.abbauen(&name, abo_id, ticket).await {
                        tracing::warn!(kanal = %name, fehler = %e, "Abbau fehlgeschlagen");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(kanal = %name, "Keine Tokio-Runtime, Abo kann nicht abgebaut werden");
            }
        }
    }
}
