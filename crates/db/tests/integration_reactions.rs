//! Integration-Tests fuer Reaktionen (In-Memory SQLite)

use agora_db::{
    models::{
        KonversationsTyp, NachrichtenTyp, NeueKonversation, NeueNachricht, NeuerBenutzer,
        NeuerTeilnehmer, TeilnehmerRolle,
    },
    ChatMessageRepository, ConversationRepository, DbError, ReactionRepository, SqliteDb,
    UserRepository,
};
use uuid::Uuid;

async fn nachricht_vorbereiten() -> (SqliteDb, Uuid, Uuid, Uuid) {
    let db = SqliteDb::in_memory().await.expect("In-Memory DB");
    let alice = UserRepository::create(&db, NeuerBenutzer { username: "alice" })
        .await
        .unwrap()
        .id;
    let carol = UserRepository::create(&db, NeuerBenutzer { username: "carol" })
        .await
        .unwrap()
        .id;
    let (konv, _) = ConversationRepository::create_with_participants(
        &db,
        NeueKonversation {
            conversation_type: KonversationsTyp::Group,
            title: Some("Reaktionen"),
            description: None,
            collective_id: None,
            is_private: false,
            created_by: alice,
        },
        &[NeuerTeilnehmer { user_id: alice, role: TeilnehmerRolle::Admin }],
    )
    .await
    .unwrap();
    let m = ChatMessageRepository::insert(
        &db,
        NeueNachricht {
            conversation_id: konv.id,
            sender_id: alice,
            content: "Reagiert mal",
            message_type: NachrichtenTyp::Text,
            metadata: serde_json::json!({}),
            reply_to_id: None,
        },
    )
    .await
    .unwrap();
    (db, alice, carol, m.id)
}

#[tokio::test]
async fn reaktion_hinzufuegen_ist_idempotent() {
    let (db, alice, _, msg) = nachricht_vorbereiten().await;

    let (_, neu) = ReactionRepository::add(&db, msg, alice, "👍").await.unwrap();
    assert!(neu);
    let (_, neu) = ReactionRepository::add(&db, msg, alice, "👍").await.unwrap();
    assert!(!neu);

    assert_eq!(ReactionRepository::list(&db, msg).await.unwrap().len(), 1);

    assert!(ReactionRepository::remove(&db, msg, alice, "👍").await.unwrap());
    assert!(!ReactionRepository::remove(&db, msg, alice, "👍").await.unwrap());
    assert!(ReactionRepository::list(&db, msg).await.unwrap().is_empty());
}

#[tokio::test]
async fn reaktion_von_aussenstehenden_abgelehnt() {
    let (db, _, carol, msg) = nachricht_vorbereiten().await;

    let err = ReactionRepository::add(&db, msg, carol, "🎉").await.unwrap_err();
    assert!(matches!(err, DbError::ZugriffVerweigert(_)));

    let err = ReactionRepository::add(&db, Uuid::new_v4(), carol, "🎉").await.unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}

#[tokio::test]
async fn reaktion_auf_geloeschte_nachricht() {
    let (db, alice, _, msg) = nachricht_vorbereiten().await;
    ChatMessageRepository::soft_delete(&db, msg, alice).await.unwrap();

    let err = ReactionRepository::add(&db, msg, alice, "👍").await.unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}
