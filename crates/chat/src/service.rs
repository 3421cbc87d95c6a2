//! ChatService – Nachrichten senden, empfangen, editieren, loeschen

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use agora_auth::{AktuellerBenutzer, ZugriffsGate};
use agora_core::{AenderungsEvent, EntitaetsRef, EventBus, KeinEventBus, KonversationId, UserId};
use agora_db::{
    models::{ChatNachrichtRecord, NachrichtenFilter, NeueNachricht},
    ChatDatabase, ChatMessageRepository, ParticipantRepository, ReactionRepository,
    UserRepository,
};

use crate::{
    ereignis_senden,
    error::{ChatError, ChatResult},
    link_vorschau::{self, VorschauLader},
    types::{
        Absender, AntwortVorschau, ChatKonfig, ChatNachricht, HistoryAnfrage, NachrichtOptionen,
        NachrichtenTyp, Reaktion, UngelesenUebersicht, ANTWORT_VORSCHAU_ZEICHEN,
        MAX_NACHRICHT_ZEICHEN,
    },
    ungelesen::UngelesenTracker,
};

/// Maximale Laenge eines Suchbegriffs
const MAX_SUCHBEGRIFF_ZEICHEN: usize = 200;

/// Maximale Emoji-Laenge (Zeichen / Bytes)
const MAX_EMOJI_ZEICHEN: usize = 16;
const MAX_EMOJI_BYTES: usize = 64;

/// ChatService verwaltet Nachrichten und Reaktionen in Konversationen
pub struct ChatService<D: ChatDatabase> {
    db: Arc<D>,
    gate: ZugriffsGate<D>,
    events: Arc<dyn EventBus>,
    vorschau: Option<Arc<dyn VorschauLader>>,
    konfig: ChatKonfig,
    /// user_id -> username (None wenn der Benutzer nicht existiert)
    benutzernamen: RwLock<HashMap<Uuid, Option<String>>>,
}

impl<D: ChatDatabase> ChatService<D> {
    /// Erstellt einen ChatService ohne Link-Vorschau
    pub fn neu(db: Arc<D>, events: Arc<dyn EventBus>) -> Arc<Self> {
        Self::mit_konfig(db, events, ChatKonfig::default(), None)
    }

    pub fn mit_konfig(
        db: Arc<D>,
        events: Arc<dyn EventBus>,
        konfig: ChatKonfig,
        vorschau: Option<Arc<dyn VorschauLader>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gate: ZugriffsGate::neu(Arc::clone(&db)),
            db,
            events,
            vorschau: vorschau.filter(|_| konfig.link_vorschau),
            konfig,
            benutzernamen: RwLock::new(HashMap::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Nachrichten
    // -----------------------------------------------------------------------

    /// Nachricht in einer Konversation senden
    ///
    /// Nur Teilnehmer duerfen senden. Die Datenbank prueft das beim Einfuegen
    /// ein zweites Mal.
    pub async fn nachricht_senden(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
        content: &str,
        optionen: NachrichtOptionen,
    ) -> ChatResult<ChatNachricht> {
        let sender_id = self.gate.angemeldet_erfordern(wer)?;
        inhalt_pruefen(content)?;
        let metadata = match optionen.metadata {
            None => serde_json::Value::Object(Default::default()),
            Some(wert) if wert.is_object() => wert,
            Some(_) => return Err(ChatError::ungueltig("metadata muss ein JSON-Objekt sein")),
        };

        if !self.gate.kann_nachricht_senden(&sender_id, konversation_id).await {
            return Err(ChatError::KeineBerechtigung(format!(
                "Kein Teilnehmer von Konversation {konversation_id}"
            )));
        }

        let message_type = optionen.message_type.unwrap_or(NachrichtenTyp::Text);
        let record = self
            .db
            .insert(NeueNachricht {
                conversation_id: konversation_id,
                sender_id,
                content,
                message_type,
                metadata,
                reply_to_id: optionen.reply_to_id,
            })
            .await?;

        tracing::debug!(
            nachricht_id = %record.id,
            konversation_id = %konversation_id,
            sender_id = %sender_id,
            "Nachricht gesendet"
        );

        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::NachrichtEingefuegt {
                nachricht_id: record.id,
                konversation_id: KonversationId(konversation_id),
                sender_id: UserId(sender_id),
                created_at: record.created_at,
            },
        );
        // last_message_at wurde in derselben Transaktion nachgezogen
        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::KonversationAktualisiert {
                konversation_id: KonversationId(konversation_id),
                last_message_at: Some(record.created_at),
            },
        );

        if message_type == NachrichtenTyp::Text {
            self.vorschau_starten(&record);
        }

        self.einzeln_anreichern(record).await
    }

    /// Nachricht editieren (nur eigene Nachrichten)
    pub async fn nachricht_editieren(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
        content: &str,
    ) -> ChatResult<ChatNachricht> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        inhalt_pruefen(content)?;
        self.eigene_nachricht_erfordern(user_id, nachricht_id).await?;

        let record = self.db.edit(nachricht_id, user_id, content).await?;
        tracing::debug!(nachricht_id = %nachricht_id, user_id = %user_id, "Nachricht editiert");

        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::NachrichtAktualisiert {
                nachricht_id,
                konversation_id: KonversationId(record.conversation_id),
                edited_at: record.edited_at,
                deleted_at: None,
            },
        );

        self.einzeln_anreichern(record).await
    }

    /// Nachricht soft-loeschen (nur eigene Nachrichten)
    pub async fn nachricht_loeschen(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
    ) -> ChatResult<()> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        self.eigene_nachricht_erfordern(user_id, nachricht_id).await?;

        let record = self.db.soft_delete(nachricht_id, user_id).await?;
        tracing::debug!(nachricht_id = %nachricht_id, user_id = %user_id, "Nachricht geloescht");

        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::NachrichtAktualisiert {
                nachricht_id,
                konversation_id: KonversationId(record.conversation_id),
                edited_at: record.edited_at,
                deleted_at: record.deleted_at,
            },
        );
        Ok(())
    }

    /// Einzelne sichtbare Nachricht laden
    pub async fn nachricht_laden(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
    ) -> ChatResult<ChatNachricht> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        let record = self
            .db
            .get_visible(nachricht_id, user_id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Nachricht {nachricht_id}")))?;
        self.einzeln_anreichern(record).await
    }

    /// Nachrichten-History einer Konversation, aelteste zuerst
    pub async fn history_laden(
        &self,
        wer: &impl AktuellerBenutzer,
        anfrage: HistoryAnfrage,
    ) -> ChatResult<Vec<ChatNachricht>> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if !self
            .gate
            .kann_konversation_sehen(&user_id, anfrage.conversation_id)
            .await
        {
            return Err(ChatError::nicht_gefunden(format!(
                "Konversation {}",
                anfrage.conversation_id
            )));
        }

        let records = self
            .db
            .history(
                NachrichtenFilter {
                    conversation_id: anfrage.conversation_id,
                    before: anfrage.before,
                    limit: Some(anfrage.limit.unwrap_or(self.konfig.history_limit)),
                },
                user_id,
            )
            .await?;

        self.anreichern(records).await
    }

    /// Volltextsuche ueber die eigenen Konversationen
    pub async fn nachrichten_suchen(
        &self,
        wer: &impl AktuellerBenutzer,
        query: &str,
    ) -> ChatResult<Vec<ChatNachricht>> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::ungueltig("Suchbegriff darf nicht leer sein"));
        }
        if query.chars().count() > MAX_SUCHBEGRIFF_ZEICHEN {
            return Err(ChatError::ungueltig(format!(
                "Suchbegriff zu lang (Maximum: {MAX_SUCHBEGRIFF_ZEICHEN} Zeichen)"
            )));
        }

        let records = self
            .db
            .search(user_id, query, self.konfig.such_limit)
            .await?;
        self.anreichern(records).await
    }

    // -----------------------------------------------------------------------
    // Reaktionen
    // -----------------------------------------------------------------------

    /// Reaktion hinzufuegen; `true` wenn sie neu ist
    pub async fn reaktion_hinzufuegen(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
        emoji: &str,
    ) -> ChatResult<(Reaktion, bool)> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        emoji_pruefen(emoji)?;
        EntitaetsRef::nachricht(nachricht_id)
            .reaktion_pruefen()
            .map_err(ChatError::UngueltigeEingabe)?;

        if self.db.get_visible(nachricht_id, user_id).await?.is_none() {
            return Err(ChatError::nicht_gefunden(format!("Nachricht {nachricht_id}")));
        }

        let (record, neu) = self.db.add(nachricht_id, user_id, emoji).await?;
        if neu {
            tracing::debug!(nachricht_id = %nachricht_id, user_id = %user_id, emoji, "Reaktion hinzugefuegt");
        }
        Ok((record.into(), neu))
    }

    /// Eigene Reaktion entfernen
    pub async fn reaktion_entfernen(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
        emoji: &str,
    ) -> ChatResult<()> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if !self.db.remove(nachricht_id, user_id, emoji).await? {
            return Err(ChatError::nicht_gefunden(format!(
                "Reaktion {emoji} auf Nachricht {nachricht_id}"
            )));
        }
        tracing::debug!(nachricht_id = %nachricht_id, user_id = %user_id, emoji, "Reaktion entfernt");
        Ok(())
    }

    /// Alle Reaktionen einer sichtbaren Nachricht
    pub async fn reaktionen_auflisten(
        &self,
        wer: &impl AktuellerBenutzer,
        nachricht_id: Uuid,
    ) -> ChatResult<Vec<Reaktion>> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if self.db.get_visible(nachricht_id, user_id).await?.is_none() {
            return Err(ChatError::nicht_gefunden(format!("Nachricht {nachricht_id}")));
        }
        let records = ReactionRepository::list(self.db.as_ref(), nachricht_id).await?;
        Ok(records.into_iter().map(Reaktion::from).collect())
    }

    // -----------------------------------------------------------------------
    // Lesestand
    // -----------------------------------------------------------------------

    /// Konversation als gelesen markieren, liefert den gespeicherten Zeitpunkt
    pub async fn als_gelesen_markieren(
        &self,
        wer: &impl AktuellerBenutzer,
        konversation_id: Uuid,
    ) -> ChatResult<Option<DateTime<Utc>>> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        if self.db.get(konversation_id, user_id).await?.is_none() {
            return Err(ChatError::nicht_gefunden(format!("Konversation {konversation_id}")));
        }

        let record = self.db.mark_read(konversation_id, user_id, Utc::now()).await?;
        ereignis_senden(
            self.events.as_ref(),
            AenderungsEvent::TeilnehmerAktualisiert {
                konversation_id: KonversationId(konversation_id),
                user_id: UserId(user_id),
                last_read_at: record.last_read_at,
            },
        );
        Ok(record.last_read_at)
    }

    /// Ungelesen-Zaehler aller direkten Konversationen, serverseitig berechnet
    pub async fn ungelesen_uebersicht(
        &self,
        wer: &impl AktuellerBenutzer,
    ) -> ChatResult<UngelesenUebersicht> {
        let user_id = self.gate.angemeldet_erfordern(wer)?;
        let tracker = UngelesenTracker::neu(Arc::clone(&self.db), user_id, Arc::new(KeinEventBus));
        tracker.initialisieren().await?;

        let mut conversations = tracker.alle().await;
        conversations.sort_by_key(|s| s.conversation_id);
        let total = conversations.iter().map(|s| s.unread_count).sum();
        tracker.beenden().await;

        Ok(UngelesenUebersicht {
            conversations,
            total,
        })
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    /// Sichtbar und vom Aufrufer gesendet
    async fn eigene_nachricht_erfordern(&self, user_id: Uuid, nachricht_id: Uuid) -> ChatResult<()> {
        let record = self
            .db
            .get_visible(nachricht_id, user_id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Nachricht {nachricht_id}")))?;

        // TODO: Admins der Konversation sollen fremde Nachrichten moderieren koennen
        if record.sender_id != user_id {
            return Err(ChatError::KeineBerechtigung(
                "Nur eigene Nachrichten koennen geaendert werden".into(),
            ));
        }
        Ok(())
    }

    fn vorschau_starten(&self, record: &ChatNachrichtRecord) {
        let Some(lader) = self.vorschau.as_ref() else {
            return;
        };
        let Some(url) = link_vorschau::erste_url(&record.content) else {
            return;
        };

        tokio::spawn(link_vorschau::vorschau_anhaengen(
            Arc::clone(&self.db),
            Arc::clone(&self.events),
            Arc::clone(lader),
            record.id,
            record.conversation_id,
            url.to_string(),
            record.metadata.clone(),
        ));
    }

    async fn einzeln_anreichern(&self, record: ChatNachrichtRecord) -> ChatResult<ChatNachricht> {
        self.anreichern(vec![record])
            .await?
            .pop()
            .ok_or_else(|| ChatError::Anyhow(anyhow::anyhow!("Anreicherung ohne Ergebnis")))
    }

    /// Haengt Absender und Antwort-Vorschau an
    async fn anreichern(&self, records: Vec<ChatNachrichtRecord>) -> ChatResult<Vec<ChatNachricht>> {
        let mut antworten: HashMap<Uuid, AntwortVorschau> = HashMap::new();
        for record in &records {
            antworten.insert(record.id, antwort_vorschau(record));
        }
        for reply_id in records.iter().filter_map(|r| r.reply_to_id) {
            if antworten.contains_key(&reply_id) {
                continue;
            }
            if let Some(original) = ChatMessageRepository::get_by_id(self.db.as_ref(), reply_id).await? {
                antworten.insert(reply_id, antwort_vorschau(&original));
            }
        }

        let mut ergebnis = Vec::with_capacity(records.len());
        for record in records {
            let username = self.benutzername(record.sender_id).await?;
            let reply_to = record.reply_to_id.and_then(|id| antworten.get(&id).cloned());
            ergebnis.push(ChatNachricht {
                id: record.id,
                conversation_id: record.conversation_id,
                sender: Absender {
                    id: record.sender_id,
                    username,
                },
                content: record.content,
                message_type: record.message_type,
                metadata: record.metadata,
                reply_to,
                created_at: record.created_at,
                edited_at: record.edited_at,
            });
        }
        Ok(ergebnis)
    }

    async fn benutzername(&self, user_id: Uuid) -> ChatResult<Option<String>> {
        if let Some(name) = self.benutzernamen.read().await.get(&user_id) {
            return Ok(name.clone());
        }
        let name = UserRepository::get_by_id(self.db.as_ref(), user_id)
            .await?
            .map(|b| b.username);
        self.benutzernamen
            .write()
            .await
            .insert(user_id, name.clone());
        Ok(name)
    }
}

fn inhalt_pruefen(content: &str) -> ChatResult<()> {
    if content.trim().is_empty() {
        return Err(ChatError::ungueltig("Nachrichteninhalt darf nicht leer sein"));
    }
    let zeichen = content.chars().count();
    if zeichen > MAX_NACHRICHT_ZEICHEN {
        return Err(ChatError::ungueltig(format!(
            "Nachricht zu lang: {zeichen} Zeichen (Maximum: {MAX_NACHRICHT_ZEICHEN})"
        )));
    }
    Ok(())
}

fn emoji_pruefen(emoji: &str) -> ChatResult<()> {
    if emoji.is_empty()
        || emoji.chars().any(char::is_whitespace)
        || emoji.chars().count() > MAX_EMOJI_ZEICHEN
        || emoji.len() > MAX_EMOJI_BYTES
    {
        return Err(ChatError::ungueltig(format!("Ungueltiges Emoji: {emoji:?}")));
    }
    Ok(())
}

fn antwort_vorschau(original: &ChatNachrichtRecord) -> AntwortVorschau {
    AntwortVorschau {
        id: original.id,
        sender_id: original.sender_id,
        content: original
            .deleted_at
            .is_none()
            .then(|| original.content.chars().take(ANTWORT_VORSCHAU_ZEICHEN).collect()),
    }
}
