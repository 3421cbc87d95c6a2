//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod chat;
pub mod conversations;
pub mod participants;
pub mod pool;
pub mod reactions;
pub mod users;
pub(crate) mod zeit;

pub use pool::SqliteDb;
