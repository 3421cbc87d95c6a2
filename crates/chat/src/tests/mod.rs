//! Tests fuer das Chat-Crate (In-Memory SQLite)

mod konversation_tests;

use std::sync::{Arc, Mutex};

use agora_core::{AenderungsEvent, EventBus};
use agora_db::{models::NeuerBenutzer, SqliteDb, UserRepository};
use uuid::Uuid;

pub(crate) async fn test_db() -> Arc<SqliteDb> {
    Arc::new(
        SqliteDb::in_memory()
            .await
            .expect("In-Memory-DB konnte nicht geoeffnet werden"),
    )
}

pub(crate) async fn benutzer(db: &SqliteDb, name: &str) -> Uuid {
    UserRepository::create(db, NeuerBenutzer { username: name })
        .await
        .expect("User anlegen fehlgeschlagen")
        .id
}

/// Sammelt alle gesendeten Events
#[derive(Default)]
pub(crate) struct EventProtokoll {
    pub events: Mutex<Vec<AenderungsEvent>>,
}

impl EventProtokoll {
    pub fn alle(&self) -> Vec<AenderungsEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventBus for EventProtokoll {
    fn senden(&self, event: AenderungsEvent) -> agora_core::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
