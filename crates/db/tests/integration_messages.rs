//! Integration-Tests fuer Nachrichten (In-Memory SQLite)

use agora_db::{
    models::{
        KonversationsTyp, NachrichtenFilter, NachrichtenTyp, NeueKonversation, NeueNachricht,
        NeuerBenutzer, NeuerTeilnehmer, TeilnehmerRolle,
    },
    ChatMessageRepository, ConversationRepository, DbError, ParticipantRepository, SqliteDb,
    UserRepository,
};
use chrono::Utc;
use uuid::Uuid;

struct Umgebung {
    db: SqliteDb,
    alice: Uuid,
    bob: Uuid,
    carol: Uuid,
    konv: Uuid,
}

/// Direkte Konversation alice <-> bob, carol ist aussen vor
async fn umgebung() -> Umgebung {
    let db = SqliteDb::in_memory().await.expect("In-Memory DB");
    let mut ids = Vec::new();
    for name in ["alice", "bob", "carol"] {
        ids.push(
            UserRepository::create(&db, NeuerBenutzer { username: name })
                .await
                .unwrap()
                .id,
        );
    }
    let (alice, bob, carol) = (ids[0], ids[1], ids[2]);
    let (konv, _) = ConversationRepository::create_with_participants(
        &db,
        NeueKonversation {
            conversation_type: KonversationsTyp::Direct,
            title: None,
            description: None,
            collective_id: None,
            is_private: true,
            created_by: alice,
        },
        &[
            NeuerTeilnehmer { user_id: alice, role: TeilnehmerRolle::Admin },
            NeuerTeilnehmer { user_id: bob, role: TeilnehmerRolle::Member },
        ],
    )
    .await
    .unwrap();

    Umgebung { db, alice, bob, carol, konv: konv.id }
}

fn text<'a>(konv: Uuid, sender: Uuid, content: &'a str) -> NeueNachricht<'a> {
    NeueNachricht {
        conversation_id: konv,
        sender_id: sender,
        content,
        message_type: NachrichtenTyp::Text,
        metadata: serde_json::json!({}),
        reply_to_id: None,
    }
}

#[tokio::test]
async fn last_message_at_folgt_jeder_nachricht() {
    let u = umgebung().await;

    for i in 0..5 {
        let content = format!("Nachricht {i}");
        let m = ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, &content))
            .await
            .unwrap();
        let konv = ConversationRepository::get_by_id(&u.db, u.konv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(konv.last_message_at, Some(m.created_at));
    }
}

#[tokio::test]
async fn nicht_teilnehmer_wird_abgelehnt() {
    let u = umgebung().await;

    let err = ChatMessageRepository::insert(&u.db, text(u.konv, u.carol, "hallo"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ZugriffVerweigert(_)), "Fehler: {err:?}");

    // Auch fuer nicht existierende Konversationen: kein Unterschied sichtbar
    let err = ChatMessageRepository::insert(&u.db, text(Uuid::new_v4(), u.alice, "hallo"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ZugriffVerweigert(_)));

    let konv = ConversationRepository::get_by_id(&u.db, u.konv).await.unwrap().unwrap();
    assert!(konv.last_message_at.is_none());
}

#[tokio::test]
async fn antwort_ueber_konversationen_hinweg_abgelehnt() {
    let u = umgebung().await;
    let (andere, _) = ConversationRepository::create_with_participants(
        &u.db,
        NeueKonversation {
            conversation_type: KonversationsTyp::Group,
            title: Some("Team"),
            description: None,
            collective_id: None,
            is_private: false,
            created_by: u.alice,
        },
        &[NeuerTeilnehmer { user_id: u.alice, role: TeilnehmerRolle::Admin }],
    )
    .await
    .unwrap();
    let fremd = ChatMessageRepository::insert(&u.db, text(andere.id, u.alice, "woanders"))
        .await
        .unwrap();

    let mut antwort = text(u.konv, u.alice, "Antwort");
    antwort.reply_to_id = Some(fremd.id);
    let err = ChatMessageRepository::insert(&u.db, antwort).await.unwrap_err();
    assert!(matches!(err, DbError::UngueltigeDaten(_)));

    let original = ChatMessageRepository::insert(&u.db, text(u.konv, u.bob, "Frage"))
        .await
        .unwrap();
    let mut antwort = text(u.konv, u.alice, "Antwort");
    antwort.reply_to_id = Some(original.id);
    let m = ChatMessageRepository::insert(&u.db, antwort).await.unwrap();
    assert_eq!(m.reply_to_id, Some(original.id));
}

#[tokio::test]
async fn history_mit_cursor_und_soft_delete() {
    let u = umgebung().await;
    let mut ids = Vec::new();
    for i in 0..6 {
        let content = format!("m{i}");
        let m = ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, &content))
            .await
            .unwrap();
        ids.push(m);
    }
    ChatMessageRepository::soft_delete(&u.db, ids[5].id, u.alice)
        .await
        .unwrap();

    let seite = ChatMessageRepository::history(
        &u.db,
        NachrichtenFilter { conversation_id: u.konv, before: None, limit: Some(3) },
        u.bob,
    )
    .await
    .unwrap();
    let inhalte: Vec<_> = seite.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(inhalte, ["m2", "m3", "m4"]);

    let vorher = ChatMessageRepository::history(
        &u.db,
        NachrichtenFilter {
            conversation_id: u.konv,
            before: Some(seite[0].created_at),
            limit: None,
        },
        u.bob,
    )
    .await
    .unwrap();
    let inhalte: Vec<_> = vorher.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(inhalte, ["m0", "m1"]);

    // Aussenstehende sehen nichts
    let leer = ChatMessageRepository::history(
        &u.db,
        NachrichtenFilter { conversation_id: u.konv, before: None, limit: None },
        u.carol,
    )
    .await
    .unwrap();
    assert!(leer.is_empty());
}

#[tokio::test]
async fn soft_delete_laesst_last_message_at_stehen() {
    let u = umgebung().await;
    let m = ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "weg damit"))
        .await
        .unwrap();

    let geloescht = ChatMessageRepository::soft_delete(&u.db, m.id, u.alice).await.unwrap();
    assert!(geloescht.deleted_at.is_some());

    let konv = ConversationRepository::get_by_id(&u.db, u.konv).await.unwrap().unwrap();
    assert_eq!(konv.last_message_at, Some(m.created_at));

    assert!(ChatMessageRepository::get_visible(&u.db, m.id, u.bob)
        .await
        .unwrap()
        .is_none());
    // Zweites Loeschen findet nichts mehr
    let err = ChatMessageRepository::soft_delete(&u.db, m.id, u.alice).await.unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}

#[tokio::test]
async fn edit_nur_durch_absender() {
    let u = umgebung().await;
    let m = ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "Tippfehlr"))
        .await
        .unwrap();

    let err = ChatMessageRepository::edit(&u.db, m.id, u.bob, "gekapert")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ZugriffVerweigert(_)));

    let neu = ChatMessageRepository::edit(&u.db, m.id, u.alice, "Tippfehler")
        .await
        .unwrap();
    assert_eq!(neu.content, "Tippfehler");
    assert!(neu.edited_at.is_some());
    assert!(neu.deleted_at.is_none());

    ChatMessageRepository::soft_delete(&u.db, m.id, u.alice).await.unwrap();
    let err = ChatMessageRepository::edit(&u.db, m.id, u.alice, "zu spaet")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}

#[tokio::test]
async fn ungelesene_zaehlen() {
    let u = umgebung().await;
    ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "eins")).await.unwrap();
    ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "zwei")).await.unwrap();
    ChatMessageRepository::insert(&u.db, text(u.konv, u.bob, "eigene")).await.unwrap();

    let anzahl = ChatMessageRepository::count_unread(&u.db, u.konv, u.bob, None)
        .await
        .unwrap();
    assert_eq!(anzahl, 2);

    let gelesen = ParticipantRepository::mark_read(&u.db, u.konv, u.bob, Utc::now())
        .await
        .unwrap();
    let anzahl = ChatMessageRepository::count_unread(&u.db, u.konv, u.bob, gelesen.last_read_at)
        .await
        .unwrap();
    assert_eq!(anzahl, 0);

    ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "drei")).await.unwrap();
    let anzahl = ChatMessageRepository::count_unread(&u.db, u.konv, u.bob, gelesen.last_read_at)
        .await
        .unwrap();
    assert_eq!(anzahl, 1);
}

#[tokio::test]
async fn mark_read_ohne_teilnahme_schlaegt_fehl() {
    let u = umgebung().await;
    let err = ParticipantRepository::mark_read(&u.db, u.konv, u.carol, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}

#[tokio::test]
async fn suche_nur_in_eigenen_konversationen() {
    let u = umgebung().await;
    ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "Treffen um 100% sicher"))
        .await
        .unwrap();
    ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "Treffen morgen"))
        .await
        .unwrap();

    let treffer = ChatMessageRepository::search(&u.db, u.bob, "treffen", 50).await.unwrap();
    assert_eq!(treffer.len(), 2);

    // Platzhalter werden woertlich genommen
    let treffer = ChatMessageRepository::search(&u.db, u.bob, "100%", 50).await.unwrap();
    assert_eq!(treffer.len(), 1);

    let treffer = ChatMessageRepository::search(&u.db, u.carol, "treffen", 50).await.unwrap();
    assert!(treffer.is_empty());
}

#[tokio::test]
async fn metadaten_nachtraeglich_setzen() {
    let u = umgebung().await;
    let m = ChatMessageRepository::insert(&u.db, text(u.konv, u.alice, "https://example.org"))
        .await
        .unwrap();

    let meta = serde_json::json!({ "link_preview": { "title": "Beispiel" } });
    ChatMessageRepository::update_metadata(&u.db, m.id, meta.clone())
        .await
        .unwrap();

    let geladen = ChatMessageRepository::get_by_id(&u.db, m.id).await.unwrap().unwrap();
    assert_eq!(geladen.metadata, meta);
}
