//! SQLite-Implementierung des ReactionRepository

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::ReaktionRecord;
use crate::repository::{DbResult, ReactionRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit;

impl ReactionRepository for SqliteDb {
    async fn add(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> DbResult<(ReaktionRecord, bool)> {
        let msg_str = message_id.to_string();
        let user_str = user_id.to_string();

        let mut tx = self.pool.begin().await?;

        // (existiert, ist Teilnehmer) fuer nicht geloeschte Nachrichten
        let sicht: Option<i64> = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM conversation_participants p
                            WHERE p.conversation_id = m.conversation_id AND p.user_id = ?)
             FROM messages m WHERE m.id = ? AND m.deleted_at IS NULL",
        )
        .bind(&user_str)
        .bind(&msg_str)
        .fetch_optional(&mut *tx)
        .await?;

        match sicht {
            None => return Err(DbError::nicht_gefunden(format!("Nachricht {message_id}"))),
            Some(0) => {
                return Err(DbError::verweigert(format!(
                    "Benutzer {user_id} darf auf Nachricht {message_id} nicht reagieren"
                )))
            }
            Some(_) => {}
        }

        let affected = sqlx::query(
            "INSERT OR IGNORE INTO message_reactions (message_id, user_id, emoji, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&msg_str)
        .bind(&user_str)
        .bind(emoji)
        .bind(zeit::formatieren(Utc::now()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let created_at: String = sqlx::query_scalar(
            "SELECT created_at FROM message_reactions
             WHERE message_id = ? AND user_id = ? AND emoji = ?",
        )
        .bind(&msg_str)
        .bind(&user_str)
        .bind(emoji)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let record = ReaktionRecord {
            message_id,
            user_id,
            emoji: emoji.to_string(),
            created_at: zeit::parsen(&created_at)?,
        };
        Ok((record, affected > 0))
    }

    async fn remove(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> DbResult<bool> {
        // Nur die eigene Reaktion: user_id ist Teil der Bedingung
        let affected = sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = ? AND user_id = ? AND emoji = ?",
        )
        .bind(message_id.to_string())
        .bind(user_id.to_string())
        .bind(emoji)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn list(&self, message_id: Uuid) -> DbResult<Vec<ReaktionRecord>> {
        let rows = sqlx::query(
            "SELECT message_id, user_id, emoji, created_at
             FROM message_reactions
             WHERE message_id = ?
             ORDER BY created_at, emoji",
        )
        .bind(message_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> DbResult<ReaktionRecord> {
                use sqlx::Row as _;
                let message_id: String = row.try_get("message_id")?;
                let user_id: String = row.try_get("user_id")?;
                let created_at: String = row.try_get("created_at")?;
                Ok(ReaktionRecord {
                    message_id: zeit::uuid_parsen(&message_id, "message_id")?,
                    user_id: zeit::uuid_parsen(&user_id, "user_id")?,
                    emoji: row.try_get("emoji")?,
                    created_at: zeit::parsen(&created_at)?,
                })
            })
            .collect()
    }
}
