//! SQLite-Implementierung des ParticipantRepository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    BeitrittsErgebnis, KonversationsTyp, LeseStatus, TeilnehmerRecord, TeilnehmerRolle,
};
use crate::repository::{DbResult, ParticipantRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit;

impl ParticipantRepository for SqliteDb {
    async fn get(&self, conversation_id: Uuid, user_id: Uuid) -> DbResult<Option<TeilnehmerRecord>> {
        let row = sqlx::query(
            "SELECT conversation_id, user_id, role, joined_at, last_read_at
             FROM conversation_participants
             WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_teilnehmer(&r)).transpose()
    }

    async fn join(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: TeilnehmerRolle,
    ) -> DbResult<BeitrittsErgebnis> {
        let now_str = zeit::formatieren(Utc::now());

        // Primaerschluessel (conversation_id, user_id) macht den Beitritt idempotent
        let affected = sqlx::query(
            "INSERT OR IGNORE INTO conversation_participants
             (conversation_id, user_id, role, joined_at, last_read_at)
             VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .bind(role.als_str())
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY") {
                DbError::nicht_gefunden(format!(
                    "Konversation {conversation_id} oder Benutzer {user_id}"
                ))
            } else {
                DbError::Sqlx(e)
            }
        })?
        .rows_affected();

        let teilnehmer = self
            .get(conversation_id, user_id)
            .await?
            .ok_or_else(|| DbError::intern("Teilnehmer nach Beitritt nicht gefunden"))?;

        Ok(BeitrittsErgebnis {
            teilnehmer,
            neu: affected > 0,
        })
    }

    async fn leave(&self, conversation_id: Uuid, user_id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query(
            "DELETE FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn list(&self, conversation_id: Uuid) -> DbResult<Vec<TeilnehmerRecord>> {
        let rows = sqlx::query(
            "SELECT conversation_id, user_id, role, joined_at, last_read_at
             FROM conversation_participants
             WHERE conversation_id = ?
             ORDER BY joined_at, user_id",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_teilnehmer).collect()
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        zeitpunkt: DateTime<Utc>,
    ) -> DbResult<TeilnehmerRecord> {
        // Nur die eigene Zeile: user_id ist Teil der Bedingung
        let affected = sqlx::query(
            "UPDATE conversation_participants SET last_read_at = ?
             WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(zeit::formatieren(zeitpunkt))
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!(
                "Teilnehmer {user_id} in Konversation {conversation_id}"
            )));
        }

        self.get(conversation_id, user_id)
            .await?
            .ok_or_else(|| DbError::intern("Teilnehmer nach Update nicht gefunden"))
    }

    async fn lese_status_fuer_user(
        &self,
        user_id: Uuid,
        typ: Option<KonversationsTyp>,
    ) -> DbResult<Vec<LeseStatus>> {
        let rows = sqlx::query(
            "SELECT c.id, c.conversation_type, c.last_message_at, p.last_read_at
             FROM conversation_participants p
             JOIN conversations c ON c.id = p.conversation_id
             WHERE p.user_id = ? AND (? IS NULL OR c.conversation_type = ?)",
        )
        .bind(user_id.to_string())
        .bind(typ.map(|t| t.als_str()))
        .bind(typ.map(|t| t.als_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> DbResult<LeseStatus> {
                use sqlx::Row as _;
                let id: String = row.try_get("id")?;
                let typ: String = row.try_get("conversation_type")?;
                Ok(LeseStatus {
                    conversation_id: zeit::uuid_parsen(&id, "Konversations")?,
                    conversation_type: typ.parse().map_err(DbError::intern)?,
                    last_read_at: zeit::parsen_opt(row.try_get("last_read_at")?)?,
                    last_message_at: zeit::parsen_opt(row.try_get("last_message_at")?)?,
                })
            })
            .collect()
    }
}

fn row_to_teilnehmer(row: &sqlx::sqlite::SqliteRow) -> DbResult<TeilnehmerRecord> {
    use sqlx::Row as _;

    let conversation_id: String = row.try_get("conversation_id")?;
    let user_id: String = row.try_get("user_id")?;
    let role: String = row.try_get("role")?;
    let joined_at: String = row.try_get("joined_at")?;

    Ok(TeilnehmerRecord {
        conversation_id: zeit::uuid_parsen(&conversation_id, "Konversations")?,
        user_id: zeit::uuid_parsen(&user_id, "Benutzer")?,
        role: role.parse::<TeilnehmerRolle>().map_err(DbError::intern)?,
        joined_at: zeit::parsen(&joined_at)?,
        last_read_at: zeit::parsen_opt(row.try_get("last_read_at")?)?,
    })
}
