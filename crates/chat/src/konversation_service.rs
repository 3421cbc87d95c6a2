//! KonversationService – Konversationen anlegen, beitreten, verlassen

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use agora_auth::{AktuellerBenutzer, ZugriffsGate};
use agora_core::{AenderungsEvent, EventBus, KonversationId, UserId};
use agora_db::{
    models::{KonversationUpdate, NeueKonversation, NeuerTeilnehmer},
    ChatDatabase, ConversationRepository, ParticipantRepository,
};

use crate::{
    ereignis_senden,
    error::{ChatError, ChatResult},
    types::{
        BeitrittsStatus, ErstellteKonversation, Konversation, KonversationAenderung,
        KonversationsTyp, NeueKonversationAnfrage, Teilnehmer, TeilnehmerRolle,
    },
};

/// Maximale Titellaenge in Zeichen
const MAX_TITEL_ZEICHEN: usize = 200;

/// Verwaltet Konversationen und deren Teilnehmer
pub struct KonversationService<D: ChatDatabase> {
    db: Arc<D>,
    gate: ZugriffsGate<D>,
    events: Arc<dyn EventBus>,
}

impl<D: ChatDatabase> KonversationService<D> {
    pub fn neu(db: Arc<D>, events: Arc<dyn EventBus>) -> Arc<Self> {
        Arc::new(Self {
            gate: ZugriffsGate::neu(Arc::clone(&db)),
            db,
            events,
        })
    }

    /// Konversation mit allen Teilnehmern anlegen
    ///
    /// Der Ersteller wird Admin, alle anderen Mitglieder. Doppelte IDs werden
    /// zusammengefasst. Eine direkte Konversation hat hoechstens zwei Benutzer.
    pub async fn erstellen(
        &self,
        wer: &impl AktuellerBenutzer,
        anfrage: NeueKonversationAnfrage,
    ) -> ChatResult<ErstellteKonversation> {
        let ersteller = self.gate.teilnehmer_erfordern(wer, &anfrage.participant_ids)?;

        let mut gesehen = HashSet::new();
        let teilnehmer: Vec<NeuerTeilnehmer> = std::iter::once(ersteller)
            .chain(anfrage.participant_ids.iter().copied())
            .filter(|id| gesehen.insert(*id))
            .map(|user_id| NeuerTeilnehmer {
                user_id,
                role: if user_id == ersteller {
                    TeilnehmerRolle::Admin
                } else {
                    TeilnehmerRolle::Member
                },
            })
            .collect();

        if anfrage.conversation_type == KonversationsTyp::Direct && teilnehmer.len() > 2 {
            return Err(ChatError::ungueltig(format!(
                "Direkte Konversation mit {} Benutzern (Maximum: 2)",
                teilnehmer.len()
            )));
        }
        let title = titel_pruefen(anfrage.title.as_deref())?;

        let (record, teilnehmer_records) = self
            .db
            .create_with_participants(
                NeueKonversation {
                    conversation_type: anfrage.conversation_type,
                    title,
                    description: anfrage.description.as_deref(),
                    collective_id: anfrage.collective_id,
                    is_private: anfrage.is_private,
                    created_by: ersteller,
                },
                &teilnehmer,
            )
            .await?;

        tracing::info!(
            konversation_id = %record.id,
            typ = record.conversation_type.als_str(),
            teilnehmer = teilnehmer_records.len(),
            "Konversation erstellt"
        );

        for t in &teilnehmer_records {
            ereignis_senden(
                self.events.as_ref(),
                AenderungsEvent::TeilnehmerEingefuegt {
                    konversation_id: KonversationId(record.id),
                    user_id: UserId(t.user_id),
                },
            );
        }

        Ok(ErstellteKonversation {
            konversation: record.into(),
            participants: teilnehmer_records.into_iter().map(Teilnehmer::from).collect(),
        })
    }

    /// Alle Konversationen des Aufrufers
    pub async fn auflisten(&self, wer: &impl AktuellerBenutzer) -> ChatResult<Vec<Konversation>> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        let records = self.db.list_for_user(user_id).await?;
        Ok(records.into_iter().map(Konversation::from).collect())
    }

    /// Eine Konversation laden (nur fuer Teilnehmer sichtbar)
    pub async fn laden(&self, wer: &impl AktuellerBenutzer, id: Uuid) -> ChatResult<Konversation> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        self.db
            .get_for_participant(id, user_id)
            .await?
            .map(Konversation::from)
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Konversation {id}")))
    }

    /// Titel, Beschreibung oder Privatsphaere aendern (nur Admins)
    pub async fn aktualisieren(
        &self,
        wer: &impl AktuellerBenutzer,
        id: Uuid,
        aenderung: KonversationAenderung,
    ) -> ChatResult<Konversation> {
        let user_id = self.sichtbar_erfordern(wer, id).await?;
        if let Some(Some(titel)) = aenderung.title.as_ref() {
            titel_pruefen(Some(titel.as_str()))?;
        }

        let record = self
            .db
            .update(
                id,
                user_id,
                KonversationUpdate {
                    title: aenderung.title,
                    description: aenderung.description,
                    is_private: aenderung.is_private,
                },
            )
            .await?;

        tracing::debug!(konversation_id = %id, user_id = %user_id, "Konversation aktualisiert");
        Ok(record.into())
    }

    /// Idempotenter Beitritt
    ///
    /// Ohne `ziel` tritt der Aufrufer selbst bei. Das ist ohne Admin-Rolle nur
    /// bei oeffentlichen Kanaelen erlaubt. Andere Benutzer hinzufuegen darf
    /// nur ein Admin der Konversation.
    pub async fn beitreten(
        &self,
        wer: &impl AktuellerBenutzer,
        id: Uuid,
        ziel: Option<Uuid>,
    ) -> ChatResult<(Teilnehmer, BeitrittsStatus)> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        let ziel = ziel.unwrap_or(user_id);
        if ziel.is_nil() {
            return Err(ChatError::ungueltig("Nil-ID als Teilnehmer"));
        }

        // Bestehende Mitgliedschaft ist immer ein Erfolg
        let eigene = self.db.get(id, user_id).await?;
        if let Some(eigene) = eigene.as_ref() {
            let bestehend = if ziel == user_id {
                Some(eigene.clone())
            } else {
                self.db.get(id, ziel).await?
            };
            if let Some(t) = bestehend {
                return Ok((t.into(), BeitrittsStatus::BereitsMitglied));
            }
        }

        let konversation = ConversationRepository::get_by_id(self.db.as_ref(), id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Konversation {id}")))?;

        let oeffentlicher_kanal =
            konversation.conversation_type == KonversationsTyp::Channel && !konversation.is_private;
        if ziel != user_id || !oeffentlicher_kanal {
            match eigene.map(|t| t.role) {
                Some(TeilnehmerRolle::Admin) => {}
                // Private Konversationen bleiben fuer Aussenstehende unsichtbar
                None if konversation.is_private => {
                    return Err(ChatError::nicht_gefunden(format!("Konversation {id}")))
                }
                _ => {
                    return Err(ChatError::KeineBerechtigung(format!(
                        "Beitritt zu Konversation {id} erfordert Admin-Rolle"
                    )))
                }
            }
        }

        if konversation.conversation_type == KonversationsTyp::Direct
            && ParticipantRepository::list(self.db.as_ref(), id).await?.len() >= 2
        {
            return Err(ChatError::ungueltig(
                "Direkte Konversation hat bereits zwei Teilnehmer",
            ));
        }

        let ergebnis = self.db.join(id, ziel, TeilnehmerRolle::Member).await?;
        let status = if ergebnis.neu {
            tracing::info!(konversation_id = %id, user_id = %ziel, "Teilnehmer beigetreten");
            ereignis_senden(
                self.events.as_ref(),
                AenderungsEvent::TeilnehmerEingefuegt {
                    konversation_id: KonversationId(id),
                    user_id: UserId(ziel),
                },
            );
            BeitrittsStatus::Beigetreten
        } else {
            BeitrittsStatus::BereitsMitglied
        };

        Ok((ergebnis.teilnehmer.into(), status))
    }

    /// Konversation verlassen; bereits gesendete Nachrichten bleiben
    pub async fn verlassen(&self, wer: &impl AktuellerBenutzer, id: Uuid) -> ChatResult<()> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if !self.db.leave(id, user_id).await? {
            return Err(ChatError::nicht_gefunden(format!("Konversation {id}")));
        }

        tracing::info!(konversation_id = %id, user_id = %user_id, "Teilnehmer ausgetreten");
        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::TeilnehmerEntfernt {
                konversation_id: KonversationId(id),
                user_id: UserId(user_id),
            },
        );
        Ok(())
    }

    /// Teilnehmerliste (nur fuer Teilnehmer)
    pub async fn teilnehmer_auflisten(
        &self,
        wer: &impl AktuellerBenutzer,
        id: Uuid,
    ) -> ChatResult<Vec<Teilnehmer>> {
        self.sichtbar_erfordern(wer, id).await?;
        let records = ParticipantRepository::list(self.db.as_ref(), id).await?;
        Ok(records.into_iter().map(Teilnehmer::from).collect())
    }

    /// Unsichtbare Konversationen werden wie fehlende behandelt
    async fn sichtbar_erfordern(&self, wer: &impl AktuellerBenutzer, id: Uuid) -> ChatResult<Uuid> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if !self.gate.kann_konversation_sehen(&user_id, id).await {
            return Err(ChatError::nicht_gefunden(format!("Konversation {id}")));
        }
        Ok(user_id)
    }
}

fn titel_pruefen(titel: Option<&str>) -> ChatResult<Option<&str>> {
    match titel.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) if t.chars().count() > MAX_TITEL_ZEICHEN => Err(ChatError::ungueltig(format!(
            "Titel zu lang (Maximum: {MAX_TITEL_ZEICHEN} Zeichen)"
        ))),
        Some(t) => Ok(Some(t)),
    }
}
