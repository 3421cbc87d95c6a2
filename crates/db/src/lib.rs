//! agora-db – Datenbank-Abstraktion
//!
//! Repository-Traits fuer Benutzer, Konversationen, Teilnehmer, Nachrichten
//! und Reaktionen sowie deren SQLite-Implementierung (`SqliteDb`).

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    ChatDatabase, ChatMessageRepository, ConversationRepository, DatabaseConfig, DbResult,
    ParticipantRepository, ReactionRepository, UserRepository,
};
pub use sqlite::SqliteDb;
