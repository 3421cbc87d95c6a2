//! SQLite-Implementierung des ConversationRepository

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    KonversationRecord, KonversationUpdate, KonversationsTyp, NeueKonversation, NeuerTeilnehmer,
    TeilnehmerRecord,
};
use crate::repository::{ConversationRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit;

const SPALTEN: &str = "c.id, c.conversation_type, c.title, c.description, c.collective_id,
                       c.is_private, c.created_by, c.created_at, c.last_message_at";

impl ConversationRepository for SqliteDb {
    async fn create_with_participants(
        &self,
        data: NeueKonversation<'_>,
        teilnehmer: &[NeuerTeilnehmer],
    ) -> DbResult<(KonversationRecord, Vec<TeilnehmerRecord>)> {
        if teilnehmer.is_empty() {
            return Err(DbError::UngueltigeDaten(
                "Konversation braucht mindestens einen Teilnehmer".into(),
            ));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now();
        let now_str = zeit::formatieren(now);

        // Konversation und Teilnehmer atomar: schlaegt ein Teilnehmer fehl,
        // rollt der Drop der Transaktion alles zurueck
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations
             (id, conversation_type, title, description, collective_id, is_private,
              created_by, created_at, last_message_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&id_str)
        .bind(data.conversation_type.als_str())
        .bind(data.title)
        .bind(data.description)
        .bind(data.collective_id.map(|c| c.to_string()))
        .bind(data.is_private as i64)
        .bind(data.created_by.to_string())
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| fremdschluessel_abbilden(e, "Ersteller", data.created_by))?;

        let mut records = Vec::with_capacity(teilnehmer.len());
        for t in teilnehmer {
            sqlx::query(
                "INSERT INTO conversation_participants
                 (conversation_id, user_id, role, joined_at, last_read_at)
                 VALUES (?, ?, ?, ?, NULL)",
            )
            .bind(&id_str)
            .bind(t.user_id.to_string())
            .bind(t.role.als_str())
            .bind(&now_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| fremdschluessel_abbilden(e, "Teilnehmer", t.user_id))?;

            records.push(TeilnehmerRecord {
                conversation_id: id,
                user_id: t.user_id,
                role: t.role,
                joined_at: now,
                last_read_at: None,
            });
        }

        tx.commit().await?;

        let konversation = KonversationRecord {
            id,
            conversation_type: data.conversation_type,
            title: data.title.map(str::to_string),
            description: data.description.map(str::to_string),
            collective_id: data.collective_id,
            is_private: data.is_private,
            created_by: data.created_by,
            created_at: now,
            last_message_at: None,
        };
        Ok((konversation, records))
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<KonversationRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM conversations c WHERE c.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_konversation(&r)).transpose()
    }

    async fn get_for_participant(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Option<KonversationRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM conversations c
             WHERE c.id = ?
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = c.id AND p.user_id = ?)"
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_konversation(&r)).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> DbResult<Vec<KonversationRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM conversations c
             JOIN conversation_participants p ON p.conversation_id = c.id
             WHERE p.user_id = ?
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_konversation).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        admin_id: Uuid,
        data: KonversationUpdate,
    ) -> DbResult<KonversationRecord> {
        // Dynamisches UPDATE – nur gesetzte Felder aendern
        let mut sets: Vec<&str> = Vec::new();
        if data.title.is_some() {
            sets.push("title = ?");
        }
        if data.description.is_some() {
            sets.push("description = ?");
        }
        if data.is_private.is_some() {
            sets.push("is_private = ?");
        }
        // Ohne Aenderung trotzdem die Admin-Bedingung pruefen
        if sets.is_empty() {
            sets.push("id = id");
        }

        let sql = format!(
            "UPDATE conversations SET {} WHERE id = ?
               AND EXISTS (SELECT 1 FROM conversation_participants p
                           WHERE p.conversation_id = conversations.id
                             AND p.user_id = ? AND p.role = 'admin')",
            sets.join(", ")
        );
        let mut q = sqlx::query(&sql);
        if let Some(ref v) = data.title {
            q = q.bind(v.clone());
        }
        if let Some(ref v) = data.description {
            q = q.bind(v.clone());
        }
        if let Some(v) = data.is_private {
            q = q.bind(v as i64);
        }
        q = q.bind(id.to_string()).bind(admin_id.to_string());

        let affected = q.execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            return match ConversationRepository::get_by_id(self, id).await? {
                Some(_) => Err(DbError::verweigert(format!(
                    "Benutzer {admin_id} ist kein Admin von Konversation {id}"
                ))),
                None => Err(DbError::nicht_gefunden(format!("Konversation {id}"))),
            };
        }

        ConversationRepository::get_by_id(self, id)
            .await?
            .ok_or_else(|| DbError::intern("Konversation nach Update nicht gefunden"))
    }
}

fn fremdschluessel_abbilden(e: sqlx::Error, rolle: &str, user_id: Uuid) -> DbError {
    let msg = e.to_string();
    if msg.contains("FOREIGN KEY") {
        DbError::UngueltigeDaten(format!("{rolle} {user_id} existiert nicht"))
    } else if msg.contains("UNIQUE") {
        DbError::Eindeutigkeit(format!("{rolle} {user_id} doppelt"))
    } else {
        DbError::Sqlx(e)
    }
}

pub(crate) fn row_to_konversation(row: &sqlx::sqlite::SqliteRow) -> DbResult<KonversationRecord> {
    use sqlx::Row as _;

    let id: String = row.try_get("id")?;
    let typ: String = row.try_get("conversation_type")?;
    let collective_id: Option<String> = row.try_get("collective_id")?;
    let created_by: String = row.try_get("created_by")?;
    let created_at: String = row.try_get("created_at")?;
    let is_private: i64 = row.try_get("is_private")?;

    Ok(KonversationRecord {
        id: zeit::uuid_parsen(&id, "Konversations")?,
        conversation_type: typ.parse::<KonversationsTyp>().map_err(DbError::intern)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        collective_id: zeit::uuid_parsen_opt(collective_id, "collective_id")?,
        is_private: is_private != 0,
        created_by: zeit::uuid_parsen(&created_by, "created_by")?,
        created_at: zeit::parsen(&created_at)?,
        last_message_at: zeit::parsen_opt(row.try_get("last_message_at")?)?,
    })
}
