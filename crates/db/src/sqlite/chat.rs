//! SQLite-Implementierung des ChatMessageRepository

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{ChatNachrichtRecord, NachrichtenFilter, NachrichtenTyp, NeueNachricht};
use crate::repository::{ChatMessageRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit;

const SPALTEN: &str = "m.id, m.conversation_id, m.sender_id, m.content, m.message_type,
                       m.metadata, m.reply_to_id, m.created_at, m.edited_at, m.deleted_at";

/// Obergrenze fuer eine History-Seite
const MAX_LIMIT: i64 = 100;

impl ChatMessageRepository for SqliteDb {
    async fn insert(&self, data: NeueNachricht<'_>) -> DbResult<ChatNachrichtRecord> {
        let id = Uuid::new_v4();
        let konv_str = data.conversation_id.to_string();
        let sender_str = data.sender_id.to_string();

        let mut tx = self.pool.begin().await?;

        // Row-Level-Security: nur Teilnehmer duerfen schreiben
        let ist_teilnehmer = sqlx::query(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(&konv_str)
        .bind(&sender_str)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
        if !ist_teilnehmer {
            return Err(DbError::verweigert(format!(
                "Benutzer {} ist kein Teilnehmer von Konversation {}",
                data.sender_id, data.conversation_id
            )));
        }

        if let Some(reply_id) = data.reply_to_id {
            let gleiche_konversation = sqlx::query(
                "SELECT 1 FROM messages WHERE id = ? AND conversation_id = ?",
            )
            .bind(reply_id.to_string())
            .bind(&konv_str)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
            if !gleiche_konversation {
                return Err(DbError::UngueltigeDaten(format!(
                    "Antwort-Ziel {reply_id} liegt nicht in dieser Konversation"
                )));
            }
        }

        let letzte = sqlx::query_scalar::<_, Option<String>>(
            "SELECT last_message_at FROM conversations WHERE id = ?",
        )
        .bind(&konv_str)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();
        let created_at = zeit::strikt_nach(zeit::parsen_opt(letzte)?);
        let created_str = zeit::formatieren(created_at);

        sqlx::query(
            "INSERT INTO messages
             (id, conversation_id, sender_id, content, message_type, metadata,
              reply_to_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&konv_str)
        .bind(&sender_str)
        .bind(data.content)
        .bind(data.message_type.als_str())
        .bind(serde_json::to_string(&data.metadata)?)
        .bind(data.reply_to_id.map(|r| r.to_string()))
        .bind(&created_str)
        .execute(&mut *tx)
        .await?;

        // last_message_at laeuft nur vorwaerts
        sqlx::query(
            "UPDATE conversations SET last_message_at = ?
             WHERE id = ? AND (last_message_at IS NULL OR last_message_at < ?)",
        )
        .bind(&created_str)
        .bind(&konv_str)
        .bind(&created_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ChatNachrichtRecord {
            id,
            conversation_id: data.conversation_id,
            sender_id: data.sender_id,
            content: data.content.to_string(),
            message_type: data.message_type,
            metadata: data.metadata,
            reply_to_id: data.reply_to_id,
            created_at,
            edited_at: None,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<ChatNachrichtRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM messages m WHERE m.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_nachricht(&r)).transpose()
    }

    async fn get_visible(&self, id: Uuid, leser_id: Uuid) -> DbResult<Option<ChatNachrichtRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM messages m
             WHERE m.id = ? AND m.deleted_at IS NULL
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = m.conversation_id AND p.user_id = ?)"
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(leser_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_nachricht(&r)).transpose()
    }

    async fn history(
        &self,
        filter: NachrichtenFilter,
        leser_id: Uuid,
    ) -> DbResult<Vec<ChatNachrichtRecord>> {
        let limit = filter.limit.unwrap_or(50).clamp(1, MAX_LIMIT);
        let sql = format!(
            "SELECT {SPALTEN} FROM messages m
             WHERE m.conversation_id = ? AND m.deleted_at IS NULL
               AND (? IS NULL OR m.created_at < ?)
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = m.conversation_id AND p.user_id = ?)
             ORDER BY m.created_at DESC
             LIMIT ?"
        );
        let before = filter.before.map(zeit::formatieren);

        let rows = sqlx::query(&sql)
            .bind(filter.conversation_id.to_string())
            .bind(&before)
            .bind(&before)
            .bind(leser_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        // Chronologisch sortieren (aelteste zuerst)
        let mut records: Vec<ChatNachrichtRecord> =
            rows.iter().map(row_to_nachricht).collect::<DbResult<_>>()?;
        records.reverse();
        Ok(records)
    }

    async fn edit(&self, id: Uuid, sender_id: Uuid, content: &str) -> DbResult<ChatNachrichtRecord> {
        let now_str = zeit::formatieren(Utc::now());

        let affected = sqlx::query(
            "UPDATE messages SET content = ?, edited_at = ?
             WHERE id = ? AND sender_id = ? AND deleted_at IS NULL
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = messages.conversation_id
                             AND p.user_id = messages.sender_id)",
        )
        .bind(content)
        .bind(&now_str)
        .bind(id.to_string())
        .bind(sender_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(self.ablehnung_erklaeren(id, sender_id).await);
        }

        ChatMessageRepository::get_by_id(self, id)
            .await?
            .ok_or_else(|| DbError::intern("Nachricht nach Update nicht gefunden"))
    }

    async fn soft_delete(&self, id: Uuid, sender_id: Uuid) -> DbResult<ChatNachrichtRecord> {
        let now_str = zeit::formatieren(Utc::now());

        // last_message_at bleibt unveraendert
        let affected = sqlx::query(
            "UPDATE messages SET deleted_at = ?
             WHERE id = ? AND sender_id = ? AND deleted_at IS NULL
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = messages.conversation_id
                             AND p.user_id = messages.sender_id)",
        )
        .bind(&now_str)
        .bind(id.to_string())
        .bind(sender_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(self.ablehnung_erklaeren(id, sender_id).await);
        }

        ChatMessageRepository::get_by_id(self, id)
            .await?
            .ok_or_else(|| DbError::intern("Nachricht nach Loeschen nicht gefunden"))
    }

    async fn update_metadata(&self, id: Uuid, metadata: serde_json::Value) -> DbResult<()> {
        let affected = sqlx::query("UPDATE messages SET metadata = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(serde_json::to_string(&metadata)?)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Nachricht {id}")));
        }
        Ok(())
    }

    async fn count_unread(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        seit: Option<chrono::DateTime<Utc>>,
    ) -> DbResult<i64> {
        let seit = seit.map(zeit::formatieren);
        let anzahl: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ? AND sender_id != ? AND deleted_at IS NULL
               AND (? IS NULL OR created_at > ?)",
        )
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .bind(&seit)
        .bind(&seit)
        .fetch_one(&self.pool)
        .await?;

        Ok(anzahl)
    }

    async fn search(&self, user_id: Uuid, query: &str, limit: i64) -> DbResult<Vec<ChatNachrichtRecord>> {
        let pattern = format!(
            "%{}%",
            query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let sql = format!(
            "SELECT {SPALTEN} FROM messages m
             JOIN conversation_participants p
               ON p.conversation_id = m.conversation_id AND p.user_id = ?
             WHERE m.content LIKE ? ESCAPE '\\' AND m.deleted_at IS NULL
             ORDER BY m.created_at DESC
             LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(&pattern)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_nachricht).collect()
    }
}

impl SqliteDb {
    /// Unterscheidet nach einer abgelehnten Aenderung zwischen
    /// "gibt es nicht" und "gehoert jemand anderem"
    async fn ablehnung_erklaeren(&self, id: Uuid, sender_id: Uuid) -> DbError {
        match ChatMessageRepository::get_by_id(self, id).await {
            Ok(Some(m)) if m.deleted_at.is_none() && m.sender_id != sender_id => {
                DbError::verweigert(format!("Nachricht {id} gehoert nicht {sender_id}"))
            }
            Ok(Some(m)) if m.deleted_at.is_none() => {
                DbError::verweigert(format!("{sender_id} ist kein Teilnehmer mehr"))
            }
            Ok(_) => DbError::nicht_gefunden(format!("Nachricht {id}")),
            Err(e) => e,
        }
    }
}

pub(crate) fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<ChatNachrichtRecord> {
    use sqlx::Row as _;

    let id: String = row.try_get("id")?;
    let conversation_id: String = row.try_get("conversation_id")?;
    let sender_id: String = row.try_get("sender_id")?;
    let typ_str: String = row.try_get("message_type")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ChatNachrichtRecord {
        id: zeit::uuid_parsen(&id, "Nachrichten")?,
        conversation_id: zeit::uuid_parsen(&conversation_id, "conversation_id")?,
        sender_id: zeit::uuid_parsen(&sender_id, "sender_id")?,
        content: row.try_get("content")?,
        message_type: typ_str.parse::<NachrichtenTyp>().map_err(DbError::intern)?,
        metadata: serde_json::from_str(&metadata)?,
        reply_to_id: zeit::uuid_parsen_opt(row.try_get("reply_to_id")?, "reply_to_id")?,
        created_at: zeit::parsen(&created_at)?,
        edited_at: zeit::parsen_opt(row.try_get("edited_at")?)?,
        deleted_at: zeit::parsen_opt(row.try_get("deleted_at")?)?,
    })
}
