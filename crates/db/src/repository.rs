//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Die Methoden liefern `Send`-Futures, damit
//! Services sie aus `tokio::spawn` und Realtime-Callbacks heraus nutzen koennen.
//!
//! Schreibende Methoden pruefen die Teilnehmerschaft selbst nochmal in SQL
//! (Row-Level-Security-Emulation). Ablehnungen erscheinen als
//! `DbError::ZugriffVerweigert`, fehlende Zeilen als `DbError::NichtGefunden`.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    BeitrittsErgebnis, BenutzerRecord, ChatNachrichtRecord, KonversationRecord,
    KonversationUpdate, KonversationsTyp, LeseStatus, NachrichtenFilter, NeueKonversation,
    NeueNachricht, NeuerBenutzer, NeuerTeilnehmer, ReaktionRecord, TeilnehmerRecord,
    TeilnehmerRolle,
};

/// Ergebnis-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://agora.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://agora.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, data: NeuerBenutzer<'_>) -> impl Future<Output = DbResult<BenutzerRecord>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DbResult<Option<BenutzerRecord>>> + Send;

    fn get_by_name(
        &self,
        username: &str,
    ) -> impl Future<Output = DbResult<Option<BenutzerRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// Konversationen
// ---------------------------------------------------------------------------

pub trait ConversationRepository: Send + Sync {
    /// Legt Konversation und alle initialen Teilnehmer in einer Transaktion an
    fn create_with_participants(
        &self,
        data: NeueKonversation<'_>,
        teilnehmer: &[NeuerTeilnehmer],
    ) -> impl Future<Output = DbResult<(KonversationRecord, Vec<TeilnehmerRecord>)>> + Send;

    /// Laedt eine Konversation ohne Zugriffspruefung
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = DbResult<Option<KonversationRecord>>> + Send;

    /// Laedt eine Konversation nur wenn `user_id` Teilnehmer ist
    fn get_for_participant(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = DbResult<Option<KonversationRecord>>> + Send;

    /// Alle Konversationen des Benutzers, juengste Aktivitaet zuerst
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<KonversationRecord>>> + Send;

    /// Aktualisiert Titel/Beschreibung/Privatsphaere (nur Admins der Konversation)
    fn update(
        &self,
        id: Uuid,
        admin_id: Uuid,
        data: KonversationUpdate,
    ) -> impl Future<Output = DbResult<KonversationRecord>> + Send;
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

pub trait ParticipantRepository: Send + Sync {
    fn get(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = DbResult<Option<TeilnehmerRecord>>> + Send;

    /// Idempotenter Beitritt; eine bestehende Zeile bleibt unveraendert
    fn join(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: TeilnehmerRolle,
    ) -> impl Future<Output = DbResult<BeitrittsErgebnis>> + Send;

    /// Entfernt die Teilnehmer-Zeile; `false` wenn keine existierte
    fn leave(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    fn list(
        &self,
        conversation_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<TeilnehmerRecord>>> + Send;

    /// Setzt `last_read_at` der eigenen Teilnehmer-Zeile
    fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        zeitpunkt: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<TeilnehmerRecord>> + Send;

    /// Lesestand aller Konversationen des Benutzers in einer einzigen Abfrage
    fn lese_status_fuer_user(
        &self,
        user_id: Uuid,
        typ: Option<KonversationsTyp>,
    ) -> impl Future<Output = DbResult<Vec<LeseStatus>>> + Send;
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

pub trait ChatMessageRepository: Send + Sync {
    /// Fuegt eine Nachricht ein und schiebt `last_message_at` atomar nach vorne
    fn insert(
        &self,
        data: NeueNachricht<'_>,
    ) -> impl Future<Output = DbResult<ChatNachrichtRecord>> + Send;

    /// Laedt eine Nachricht ohne Zugriffspruefung (auch geloeschte)
    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = DbResult<Option<ChatNachrichtRecord>>> + Send;

    /// Laedt eine nicht geloeschte Nachricht, sofern `leser_id` Teilnehmer ist
    fn get_visible(
        &self,
        id: Uuid,
        leser_id: Uuid,
    ) -> impl Future<Output = DbResult<Option<ChatNachrichtRecord>>> + Send;

    /// Cursor-History, aelteste zuerst, geloeschte ausgeblendet
    fn history(
        &self,
        filter: NachrichtenFilter,
        leser_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<ChatNachrichtRecord>>> + Send;

    /// Editiert den Inhalt (nur Absender)
    fn edit(
        &self,
        id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> impl Future<Output = DbResult<ChatNachrichtRecord>> + Send;

    /// Soft-Delete (nur Absender)
    fn soft_delete(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> impl Future<Output = DbResult<ChatNachrichtRecord>> + Send;

    /// Ersetzt die Metadaten (Hintergrund-Anreicherung, z.B. Link-Vorschau)
    fn update_metadata(
        &self,
        id: Uuid,
        metadata: serde_json::Value,
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Zaehlt fremde, nicht geloeschte Nachrichten nach `seit`
    fn count_unread(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        seit: Option<DateTime<Utc>>,
    ) -> impl Future<Output = DbResult<i64>> + Send;

    /// Volltextsuche ueber die Konversationen des Benutzers
    fn search(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> impl Future<Output = DbResult<Vec<ChatNachrichtRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// Reaktionen
// ---------------------------------------------------------------------------

pub trait ReactionRepository: Send + Sync {
    /// Idempotent; `bool` ist `true` wenn die Reaktion neu angelegt wurde
    fn add(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> impl Future<Output = DbResult<(ReaktionRecord, bool)>> + Send;

    fn remove(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    fn list(
        &self,
        message_id: Uuid,
    ) -> impl Future<Output = DbResult<Vec<ReaktionRecord>>> + Send;
}

/// Sammel-Trait fuer alle Chat-Repositories
pub trait ChatDatabase:
    UserRepository
    + ConversationRepository
    + ParticipantRepository
    + ChatMessageRepository
    + ReactionRepository
    + Clone
    + 'static
{
}

impl<T> ChatDatabase for T where
    T: UserRepository
        + ConversationRepository
        + ParticipantRepository
        + ChatMessageRepository
        + ReactionRepository
        + Clone
        + 'static
{
}
