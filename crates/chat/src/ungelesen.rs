//! Ungelesen-Tracking fuer direkte Konversationen
//!
//! Ein `UngelesenTracker` gehoert zu genau einem angemeldeten Benutzer.
//! Beim Start wird der Lesestand aller direkten Konversationen mit einer
//! einzigen Abfrage geladen; gezaehlt wird nur dort, wo ueberhaupt ungelesene
//! Nachrichten moeglich sind. Danach halten Realtime-Events die Zaehler
//! aktuell: neue fremde Nachrichten erhoehen um eins, Aenderungen an der
//! eigenen Teilnehmer-Zeile loesen eine Neuzaehlung aus. Konversations-Updates
//! schieben `last_message_at` nach, auch fuer eigene Nachrichten.
//!
//! Verfolgt werden nur Konversationen, die als direkte Konversation mit
//! eigener Teilnahme bestaetigt sind.
//!
//! Als-gelesen-Markieren ist optimistisch: der Zaehler springt sofort auf 0
//! und wird bei einem Schreibfehler auf den vorherigen Stand zurueckgesetzt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use agora_core::{AenderungsEvent, EventBus, KonversationId, UserId};
use agora_db::{
    models::KonversationsTyp, ChatMessageRepository, ConversationRepository,
    ParticipantRepository,
};

use crate::{error::ChatResult, ereignis_senden, types::UngelesenStand};

/// Ob in einer Konversation ungelesene Nachrichten moeglich sind
///
/// Vorabpruefung vor der Zaehl-Abfrage. Ohne Nachricht gibt es nichts zu
/// lesen; ohne Lesestand ist jede Nachricht potentiell ungelesen.
pub fn ungelesen_moeglich(
    last_read_at: Option<DateTime<Utc>>,
    last_message_at: Option<DateTime<Utc>>,
) -> bool {
    match (last_read_at, last_message_at) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(gelesen), Some(letzte)) => letzte > gelesen,
    }
}

/// Ob eine Konversation als ungelesen markiert wird
///
/// Ohne Lesestand immer; sonst wenn die juengste Nachricht neuer ist.
pub fn als_ungelesen_markiert(
    last_read_at: Option<DateTime<Utc>>,
    last_message_at: Option<DateTime<Utc>>,
) -> bool {
    match last_read_at {
        None => true,
        Some(gelesen) => last_message_at.is_some_and(|letzte| letzte > gelesen),
    }
}

/// Status einer lokalen Aenderung
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
    Bestaetigt,
    /// Als-gelesen laeuft noch; Werte fuer den Rollback
    Ausstehend {
        vorher_last_read: Option<DateTime<Utc>>,
        vorher_ungelesen: i64,
    },
}

#[derive(Debug, Clone)]
struct UngelesenZustand {
    last_read_at: Option<DateTime<Utc>>,
    last_message_at: Option<DateTime<Utc>>,
    ungelesen: i64,
    mutation: Mutation,
}

impl UngelesenZustand {
    fn hat_ungelesen(&self) -> bool {
        als_ungelesen_markiert(self.last_read_at, self.last_message_at)
    }

    /// `last_message_at` bewegt sich nur vorwaerts
    fn letzte_nachricht(&mut self, zeitpunkt: Option<DateTime<Utc>>) {
        self.last_message_at = self.last_message_at.max(zeitpunkt);
    }

    fn stand(&self, konversation_id: Uuid) -> UngelesenStand {
        UngelesenStand {
            conversation_id: konversation_id,
            last_read_at: self.last_read_at,
            last_message_at: self.last_message_at,
            unread_count: self.ungelesen,
            has_unread: self.hat_ungelesen(),
            pending: self.mutation != Mutation::Bestaetigt,
        }
    }
}

/// Ungelesen-Zaehler eines Benutzers ueber alle direkten Konversationen
pub struct UngelesenTracker<R>
where
    R: ConversationRepository + ParticipantRepository + ChatMessageRepository + 'static,
{
    repo: Arc<R>,
    user_id: Uuid,
    events: Arc<dyn EventBus>,
    zustand: RwLock<HashMap<Uuid, UngelesenZustand>>,
    /// false nach `beenden()`; spaete Ergebnisse werden dann verworfen
    aktiv: AtomicBool,
}

impl<R> UngelesenTracker<R>
where
    R: ConversationRepository + ParticipantRepository + ChatMessageRepository + 'static,
{
    pub fn neu(repo: Arc<R>, user_id: Uuid, events: Arc<dyn EventBus>) -> Arc<Self> {
        Arc::new(Self {
            repo,
            user_id,
            events,
            zustand: RwLock::new(HashMap::new()),
            aktiv: AtomicBool::new(true),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::Acquire)
    }

    /// Laedt Lesestand und Zaehler aller direkten Konversationen
    pub async fn initialisieren(&self) -> ChatResult<()> {
        let status = self
            .repo
            .lese_status_fuer_user(self.user_id, Some(KonversationsTyp::Direct))
            .await?;

        let mut neu = HashMap::with_capacity(status.len());
        let mut abfragen = 0usize;
        for s in status {
            let ungelesen = if ungelesen_moeglich(s.last_read_at, s.last_message_at) {
                abfragen += 1;
                self.repo
                    .count_unread(s.conversation_id, self.user_id, s.last_read_at)
                    .await?
            } else {
                0
            };
            neu.insert(
                s.conversation_id,
                UngelesenZustand {
                    last_read_at: s.last_read_at,
                    last_message_at: s.last_message_at,
                    ungelesen,
                    mutation: Mutation::Bestaetigt,
                },
            );
        }

        if !self.ist_aktiv() {
            tracing::debug!(user_id = %self.user_id, "Tracker beendet, Initialisierung verworfen");
            return Ok(());
        }

        tracing::debug!(
            user_id = %self.user_id,
            konversationen = neu.len(),
            zaehl_abfragen = abfragen,
            "Ungelesen-Tracker initialisiert"
        );
        *self.zustand.write().await = neu;
        Ok(())
    }

    /// Neue Nachricht eingegangen
    ///
    /// Eigene Nachrichten zaehlen nie, schieben aber `last_message_at` nach.
    pub async fn nachricht_eingefuegt(
        &self,
        konversation_id: Uuid,
        sender_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> ChatResult<()> {
        if !self.ist_aktiv() {
            return Ok(());
        }
        let fremd = sender_id != self.user_id;

        {
            let mut zustand = self.zustand.write().await;
            if let Some(z) = zustand.get_mut(&konversation_id) {
                z.letzte_nachricht(Some(created_at));
                if fremd && z.last_read_at.map_or(true, |gelesen| created_at > gelesen) {
                    z.ungelesen += 1;
                }
                return Ok(());
            }
        }

        if !fremd {
            return Ok(());
        }
        // Unbekannte Konversation: neu_zaehlen prueft Typ und Teilnahme
        self.neu_zaehlen(konversation_id).await
    }

    /// Konversations-Zeile geaendert; nur verfolgte Konversationen
    pub async fn konversation_aktualisiert(
        &self,
        konversation_id: Uuid,
        last_message_at: Option<DateTime<Utc>>,
    ) {
        if !self.ist_aktiv() {
            return;
        }
        if let Some(z) = self.zustand.write().await.get_mut(&konversation_id) {
            z.letzte_nachricht(last_message_at);
        }
    }

    /// Eigene Teilnehmer-Zeile hat sich geaendert
    pub async fn teilnehmer_aktualisiert(&self, konversation_id: Uuid, user_id: Uuid) -> ChatResult<()> {
        if user_id != self.user_id || !self.ist_aktiv() {
            return Ok(());
        }

        // Eigenes Als-gelesen laeuft noch und bestaetigt sich selbst
        let ausstehend = self
            .zustand
            .read()
            .await
            .get(&konversation_id)
            .is_some_and(|z| z.mutation != Mutation::Bestaetigt);
        if ausstehend {
            return Ok(());
        }

        self.neu_zaehlen(konversation_id).await
    }

    /// Optimistisch als gelesen markieren
    ///
    /// Der Zaehler steht sofort auf 0. Schlaegt das Schreiben fehl, wird der
    /// vorherige Stand wiederhergestellt und der Fehler zurueckgegeben.
    /// Nicht verfolgte Konversationen werden nur geschrieben, nie aufgenommen.
    pub async fn als_gelesen_markieren(&self, konversation_id: Uuid) -> ChatResult<Option<DateTime<Utc>>> {
        let jetzt = Utc::now();
        let verfolgt = {
            let mut zustand = self.zustand.write().await;
            match zustand.get_mut(&konversation_id) {
                Some(z) => {
                    // Bei mehrfachem Markieren zaehlt der urspruengliche Stand
                    if z.mutation == Mutation::Bestaetigt {
                        z.mutation = Mutation::Ausstehend {
                            vorher_last_read: z.last_read_at,
                            vorher_ungelesen: z.ungelesen,
                        };
                    }
                    z.ungelesen = 0;
                    z.last_read_at = Some(jetzt);
                    true
                }
                None => false,
            }
        };

        match self.repo.mark_read(konversation_id, self.user_id, jetzt).await {
            Ok(record) => {
                if verfolgt {
                    if let Some(z) = self.zustand.write().await.get_mut(&konversation_id) {
                        z.last_read_at = record.last_read_at;
                        z.mutation = Mutation::Bestaetigt;
                    }
                }
                tracing::debug!(konversation_id = %konversation_id, user_id = %self.user_id, "Als gelesen markiert");
                ereignis_senden(
                    self.events.as_ref(),
                    AenderungsEvent::TeilnehmerAktualisiert {
                        konversation_id: KonversationId(konversation_id),
                        user_id: UserId(self.user_id),
                        last_read_at: record.last_read_at,
                    },
                );
                Ok(record.last_read_at)
            }
            Err(e) => {
                let mut zustand = self.zustand.write().await;
                if let Some(z) = zustand.get_mut(&konversation_id).filter(|_| verfolgt) {
                    if let Mutation::Ausstehend {
                        vorher_last_read,
                        vorher_ungelesen,
                    } = z.mutation
                    {
                        z.last_read_at = vorher_last_read;
                        z.ungelesen = vorher_ungelesen;
                        z.mutation = Mutation::Bestaetigt;
                    }
                }
                tracing::warn!(
                    konversation_id = %konversation_id,
                    user_id = %self.user_id,
                    fehler = %e,
                    "Als-gelesen fehlgeschlagen, Stand zurueckgesetzt"
                );
                Err(e.into())
            }
        }
    }

    /// Stand einer einzelnen Konversation
    pub async fn stand(&self, konversation_id: Uuid) -> Option<UngelesenStand> {
        self.zustand
            .read()
            .await
            .get(&konversation_id)
            .map(|z| z.stand(konversation_id))
    }

    /// Stand aller verfolgten Konversationen
    pub async fn alle(&self) -> Vec<UngelesenStand> {
        self.zustand
            .read()
            .await
            .iter()
            .map(|(id, z)| z.stand(*id))
            .collect()
    }

    /// Summe aller Zaehler, ohne Datenbankabfrage
    pub async fn gesamt_ungelesen(&self) -> i64 {
        self.zustand.read().await.values().map(|z| z.ungelesen).sum()
    }

    pub async fn hat_ungelesen(&self, konversation_id: Uuid) -> bool {
        self.zustand
            .read()
            .await
            .get(&konversation_id)
            .is_some_and(UngelesenZustand::hat_ungelesen)
    }

    /// Sitzungsende: Zustand leeren, spaete Ergebnisse verwerfen
    pub async fn beenden(&self) {
        self.aktiv.store(false, Ordering::Release);
        self.zustand.write().await.clear();
        tracing::debug!(user_id = %self.user_id, "Ungelesen-Tracker beendet");
    }

    /// Zaehler einer Konversation komplett neu bestimmen
    ///
    /// Nimmt die Konversation nur auf, wenn sie direkt ist und der Benutzer
    /// Teilnehmer ist; andernfalls wird sie aus dem Zustand entfernt.
    async fn neu_zaehlen(&self, konversation_id: Uuid) -> ChatResult<()> {
        let konversation = self
            .repo
            .get_for_participant(konversation_id, self.user_id)
            .await?
            .filter(|k| k.conversation_type == KonversationsTyp::Direct);
        let teilnehmer = match konversation {
            Some(k) => self
                .repo
                .get(konversation_id, self.user_id)
                .await?
                .map(|t| (k, t)),
            None => None,
        };
        let Some((konversation, teilnehmer)) = teilnehmer else {
            self.zustand.write().await.remove(&konversation_id);
            return Ok(());
        };

        let ungelesen = self
            .repo
            .count_unread(konversation_id, self.user_id, teilnehmer.last_read_at)
            .await?;

        if !self.ist_aktiv() {
            return Ok(());
        }

        let mut zustand = self.zustand.write().await;
        let z = zustand.entry(konversation_id).or_insert(UngelesenZustand {
            last_read_at: teilnehmer.last_read_at,
            last_message_at: None,
            ungelesen: 0,
            mutation: Mutation::Bestaetigt,
        });
        z.letzte_nachricht(konversation.last_message_at);
        // Ein inzwischen gestartetes Als-gelesen hat Vorrang
        if z.mutation == Mutation::Bestaetigt {
            z.last_read_at = teilnehmer.last_read_at;
            z.ungelesen = ungelesen;
        }
        Ok(())
    }
}
