//! Ende-zu-Ende: ChatService -> RealtimeHub -> UngelesenSync -> Tracker

use std::sync::Arc;

use agora_chat::{ChatService, NachrichtOptionen, UngelesenTracker};
use agora_db::{
    models::{KonversationsTyp, NeueKonversation, NeuerBenutzer, NeuerTeilnehmer, TeilnehmerRolle},
    ConversationRepository, SqliteDb, UserRepository,
};
use uuid::Uuid;

use super::warten_bis;
use crate::hub::RealtimeHub;
use crate::registry::{ungelesen_schluessel, AboRegistry};
use crate::sync::UngelesenSync;

struct Aufbau {
    db: Arc<SqliteDb>,
    hub: Arc<RealtimeHub>,
    registry: Arc<AboRegistry>,
    chat: Arc<ChatService<SqliteDb>>,
    x: Uuid,
    y: Uuid,
    konv: Uuid,
}

async fn aufbau() -> Aufbau {
    let db = Arc::new(
        SqliteDb::in_memory()
            .await
            .expect("In-Memory-DB konnte nicht geoeffnet werden"),
    );
    let x = UserRepository::create(db.as_ref(), NeuerBenutzer { username: "x" })
        .await
        .unwrap()
        .id;
    let y = UserRepository::create(db.as_ref(), NeuerBenutzer { username: "y" })
        .await
        .unwrap()
        .id;
    let konv = ConversationRepository::create_with_participants(
        db.as_ref(),
        NeueKonversation {
            conversation_type: KonversationsTyp::Direct,
            title: None,
            description: None,
            collective_id: None,
            is_private: true,
            created_by: x,
        },
        &[
            NeuerTeilnehmer { user_id: x, role: TeilnehmerRolle::Admin },
            NeuerTeilnehmer { user_id: y, role: TeilnehmerRolle::Member },
        ],
    )
    .await
    .unwrap()
    .0
    .id;

    let hub = RealtimeHub::neu(64);
    let registry = AboRegistry::neu(hub.clone());
    let chat = ChatService::neu(db.clone(), hub.clone());
    Aufbau { db, hub, registry, chat, x, y, konv }
}

async fn ungelesen_erreicht(tracker: &Arc<UngelesenTracker<SqliteDb>>, konv: Uuid, erwartet: i64) -> bool {
    warten_bis(|| {
        let tracker = tracker.clone();
        async move {
            tracker
                .stand(konv)
                .await
                .is_some_and(|s| s.unread_count == erwartet)
        }
    })
    .await
}

async fn senden(a: &Aufbau, von: Uuid, text: &str) {
    a.chat
        .nachricht_senden(&von, a.konv, text, NachrichtOptionen::default())
        .await
        .expect("Senden fehlgeschlagen");
}

#[tokio::test]
async fn test_fremde_nachrichten_kommen_an() {
    let a = aufbau().await;
    let tracker = UngelesenTracker::neu(a.db.clone(), a.x, a.hub.clone());
    tracker.initialisieren().await.unwrap();

    let mut sync = UngelesenSync::starten(&a.registry, tracker.clone());
    sync.bereit().await.unwrap();
    assert!(a.hub.ist_abonniert(&ungelesen_schluessel(a.x)));

    senden(&a, a.y, "eins").await;
    senden(&a, a.y, "zwei").await;
    assert!(ungelesen_erreicht(&tracker, a.konv, 2).await);

    // Eigene Nachrichten werden schon vom Filter verworfen
    senden(&a, a.x, "antwort").await;
    senden(&a, a.y, "drei").await;
    assert!(ungelesen_erreicht(&tracker, a.konv, 3).await);
    assert!(sync.tracker().hat_ungelesen(a.konv).await);

    // Nach dem Lesen markiert eine eigene Nachricht ueber das Konversations-Update
    a.chat.als_gelesen_markieren(&a.x, a.konv).await.unwrap();
    assert!(ungelesen_erreicht(&tracker, a.konv, 0).await);
    let antwort = a
        .chat
        .nachricht_senden(&a.x, a.konv, "noch eine", NachrichtOptionen::default())
        .await
        .unwrap();
    let (konv, erwartet) = (a.konv, Some(antwort.created_at));
    let angekommen = warten_bis(|| {
        let tracker = tracker.clone();
        async move {
            tracker
                .stand(konv)
                .await
                .is_some_and(|s| s.last_message_at == erwartet)
        }
    })
    .await;
    assert!(angekommen);
    assert!(tracker.hat_ungelesen(a.konv).await);
    assert_eq!(tracker.stand(a.konv).await.unwrap().unread_count, 0);

    sync.beenden().await.unwrap();
    assert!(!a.hub.ist_abonniert(&ungelesen_schluessel(a.x)));
    assert!(!tracker.ist_aktiv());
}

/// Lesen auf einem zweiten Geraet setzt den Zaehler des ersten zurueck
#[tokio::test]
async fn test_lesen_auf_anderem_geraet() {
    let a = aufbau().await;
    let tracker = UngelesenTracker::neu(a.db.clone(), a.x, a.hub.clone());
    tracker.initialisieren().await.unwrap();
    let mut sync = UngelesenSync::starten(&a.registry, tracker.clone());
    sync.bereit().await.unwrap();

    for i in 0..4 {
        senden(&a, a.y, &format!("nachricht {i}")).await;
    }
    assert!(ungelesen_erreicht(&tracker, a.konv, 4).await);

    // Y liest ebenfalls: das darf X nicht beeinflussen
    a.chat.als_gelesen_markieren(&a.y, a.konv).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(tracker.stand(a.konv).await.unwrap().unread_count, 4);

    a.chat.als_gelesen_markieren(&a.x, a.konv).await.unwrap();
    assert!(ungelesen_erreicht(&tracker, a.konv, 0).await);
    assert!(!tracker.hat_ungelesen(a.konv).await);

    sync.beenden().await.unwrap();
}

/// Zwei Sitzungen desselben Benutzers teilen sich ein Abo
#[tokio::test]
async fn test_zwei_sitzungen_ein_abo() {
    let a = aufbau().await;
    let t1 = UngelesenTracker::neu(a.db.clone(), a.x, a.hub.clone());
    let t2 = UngelesenTracker::neu(a.db.clone(), a.x, a.hub.clone());
    t1.initialisieren().await.unwrap();
    t2.initialisieren().await.unwrap();

    let mut s1 = UngelesenSync::starten(&a.registry, t1.clone());
    let mut s2 = UngelesenSync::starten(&a.registry, t2.clone());
    s1.bereit().await.unwrap();
    s2.bereit().await.unwrap();

    let name = ungelesen_schluessel(a.x);
    assert_eq!(a.registry.referenzen(&name), 2);
    assert_eq!(a.hub.anzahl_kanaele(), 1);

    senden(&a, a.y, "an beide").await;
    assert!(ungelesen_erreicht(&t1, a.konv, 1).await);
    assert!(ungelesen_erreicht(&t2, a.konv, 1).await);

    s1.beenden().await.unwrap();
    assert!(a.hub.ist_abonniert(&name));
    assert_eq!(a.registry.referenzen(&name), 1);

    // Die verbleibende Sitzung wird weiter versorgt
    senden(&a, a.y, "nur noch zwei").await;
    assert!(ungelesen_erreicht(&t2, a.konv, 2).await);

    s2.beenden().await.unwrap();
    assert!(!a.hub.ist_abonniert(&name));
    assert_eq!(a.registry.anzahl(), 0);
}
