//! Tests fuer den KonversationService

use std::sync::Arc;

use agora_core::{AenderungsEvent, KeinEventBus, UserId};
use uuid::Uuid;

use super::{benutzer, test_db, EventProtokoll};
use crate::{
    error::ChatError,
    konversation_service::KonversationService,
    types::{BeitrittsStatus, KonversationAenderung, KonversationsTyp, NeueKonversationAnfrage, TeilnehmerRolle},
};

fn anfrage(typ: KonversationsTyp, teilnehmer: Vec<Uuid>) -> NeueKonversationAnfrage {
    NeueKonversationAnfrage {
        conversation_type: typ,
        participant_ids: teilnehmer,
        title: None,
        description: None,
        collective_id: None,
        is_private: false,
    }
}

#[tokio::test]
async fn test_erstellen_mit_ersteller_als_admin() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let events = Arc::new(EventProtokoll::default());
    let service = KonversationService::neu(db, events.clone());

    // bob doppelt, alice fehlt in der Liste
    let erstellt = service
        .erstellen(&alice, anfrage(KonversationsTyp::Group, vec![bob, bob]))
        .await
        .expect("Erstellen fehlgeschlagen");

    assert_eq!(erstellt.participants.len(), 2);
    let admin = erstellt.participants.iter().find(|t| t.user_id == alice).unwrap();
    assert_eq!(admin.role, TeilnehmerRolle::Admin);
    let mitglied = erstellt.participants.iter().find(|t| t.user_id == bob).unwrap();
    assert_eq!(mitglied.role, TeilnehmerRolle::Member);
    assert_eq!(erstellt.konversation.created_by, alice);

    let eingefuegt = events
        .alle()
        .into_iter()
        .filter(|e| matches!(e, AenderungsEvent::TeilnehmerEingefuegt { .. }))
        .count();
    assert_eq!(eingefuegt, 2);
}

#[tokio::test]
async fn test_erstellen_validierung() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let carol = benutzer(&db, "carol").await;
    let service = KonversationService::neu(db, Arc::new(KeinEventBus));

    let leer = service.erstellen(&alice, anfrage(KonversationsTyp::Group, vec![])).await;
    assert!(matches!(leer, Err(ChatError::UngueltigeEingabe(_))));

    let zu_viele = service
        .erstellen(&alice, anfrage(KonversationsTyp::Direct, vec![bob, carol]))
        .await;
    assert!(matches!(zu_viele, Err(ChatError::UngueltigeEingabe(_))));

    let anonym = service
        .erstellen(&Uuid::nil(), anfrage(KonversationsTyp::Group, vec![bob]))
        .await;
    assert!(matches!(anonym, Err(ChatError::NichtAngemeldet)));

    let unbekannt = service
        .erstellen(&alice, anfrage(KonversationsTyp::Group, vec![Uuid::new_v4()]))
        .await;
    assert!(unbekannt.is_err(), "Unbekannter Benutzer muss abgelehnt werden");
    assert!(service.auflisten(&alice).await.unwrap().is_empty(), "Transaktion muss zurueckgerollt sein");
}

/// Erneuter Beitritt erzeugt keine zweite Zeile
#[tokio::test]
async fn test_beitritt_ist_idempotent() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let events = Arc::new(EventProtokoll::default());
    let service = KonversationService::neu(db, events.clone());

    let kanal = service
        .erstellen(&alice, anfrage(KonversationsTyp::Channel, vec![alice]))
        .await
        .unwrap()
        .konversation;

    let (t1, s1) = service.beitreten(&bob, kanal.id, None).await.unwrap();
    let (t2, s2) = service.beitreten(&bob, kanal.id, None).await.unwrap();

    assert_eq!(s1, BeitrittsStatus::Beigetreten);
    assert_eq!(s2, BeitrittsStatus::BereitsMitglied);
    assert_eq!(t1.joined_at, t2.joined_at);
    assert_eq!(service.teilnehmer_auflisten(&bob, kanal.id).await.unwrap().len(), 2);

    // Nur der erste Beitritt erzeugt ein Event fuer bob
    let fuer_bob = events
        .alle()
        .into_iter()
        .filter(|e| {
            matches!(e, AenderungsEvent::TeilnehmerEingefuegt { user_id, .. } if *user_id == UserId(bob))
        })
        .count();
    assert_eq!(fuer_bob, 1);
}

#[tokio::test]
async fn test_beitritt_berechtigungen() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let carol = benutzer(&db, "carol").await;
    let service = KonversationService::neu(db, Arc::new(KeinEventBus));

    let gruppe = service
        .erstellen(&alice, anfrage(KonversationsTyp::Group, vec![bob]))
        .await
        .unwrap()
        .konversation;

    // Selbst-Beitritt zu einer Gruppe ist nicht erlaubt
    let selbst = service.beitreten(&carol, gruppe.id, None).await;
    assert!(matches!(selbst, Err(ChatError::KeineBerechtigung(_))));

    // Mitglied ohne Admin-Rolle darf niemanden hinzufuegen
    let durch_bob = service.beitreten(&bob, gruppe.id, Some(carol)).await;
    assert!(matches!(durch_bob, Err(ChatError::KeineBerechtigung(_))));

    // Admin darf
    let (t, status) = service.beitreten(&alice, gruppe.id, Some(carol)).await.unwrap();
    assert_eq!(status, BeitrittsStatus::Beigetreten);
    assert_eq!(t.user_id, carol);
    assert_eq!(t.role, TeilnehmerRolle::Member);

    // Private Konversationen sind fuer Aussenstehende unsichtbar
    let mut privat = anfrage(KonversationsTyp::Channel, vec![alice]);
    privat.is_private = true;
    let privat = service.erstellen(&alice, privat).await.unwrap().konversation;
    let fremd = service.beitreten(&bob, privat.id, None).await;
    assert!(matches!(fremd, Err(ChatError::NichtGefunden(_))));

    let fehlt = service.beitreten(&bob, Uuid::new_v4(), None).await;
    assert!(matches!(fehlt, Err(ChatError::NichtGefunden(_))));
}

#[tokio::test]
async fn test_direkt_bleibt_bei_zwei_teilnehmern() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let carol = benutzer(&db, "carol").await;
    let service = KonversationService::neu(db, Arc::new(KeinEventBus));

    let direkt = service
        .erstellen(&alice, anfrage(KonversationsTyp::Direct, vec![bob]))
        .await
        .unwrap()
        .konversation;

    let ergebnis = service.beitreten(&alice, direkt.id, Some(carol)).await;
    assert!(matches!(ergebnis, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_verlassen_und_sichtbarkeit() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let events = Arc::new(EventProtokoll::default());
    let service = KonversationService::neu(db, events.clone());

    let gruppe = service
        .erstellen(&alice, anfrage(KonversationsTyp::Group, vec![bob]))
        .await
        .unwrap()
        .konversation;

    assert!(service.laden(&bob, gruppe.id).await.is_ok());
    service.verlassen(&bob, gruppe.id).await.unwrap();

    assert!(matches!(service.laden(&bob, gruppe.id).await, Err(ChatError::NichtGefunden(_))));
    assert!(matches!(
        service.teilnehmer_auflisten(&bob, gruppe.id).await,
        Err(ChatError::NichtGefunden(_))
    ));
    assert!(matches!(service.verlassen(&bob, gruppe.id).await, Err(ChatError::NichtGefunden(_))));
    assert!(events
        .alle()
        .iter()
        .any(|e| matches!(e, AenderungsEvent::TeilnehmerEntfernt { .. })));
}

#[tokio::test]
async fn test_aktualisieren_nur_admin() {
    let db = test_db().await;
    let alice = benutzer(&db, "alice").await;
    let bob = benutzer(&db, "bob").await;
    let carol = benutzer(&db, "carol").await;
    let service = KonversationService::neu(db, Arc::new(KeinEventBus));

    let gruppe = service
        .erstellen(&alice, anfrage(KonversationsTyp::Group, vec![bob]))
        .await
        .unwrap()
        .konversation;

    let aenderung = KonversationAenderung {
        title: Some(Some("Neuer Titel".into())),
        ..Default::default()
    };

    let geaendert = service.aktualisieren(&alice, gruppe.id, aenderung.clone()).await.unwrap();
    assert_eq!(geaendert.title.as_deref(), Some("Neuer Titel"));

    assert!(matches!(
        service.aktualisieren(&bob, gruppe.id, aenderung.clone()).await,
        Err(ChatError::KeineBerechtigung(_))
    ));
    assert!(matches!(
        service.aktualisieren(&carol, gruppe.id, aenderung).await,
        Err(ChatError::NichtGefunden(_))
    ));

    let zu_lang = KonversationAenderung {
        title: Some(Some("x".repeat(201))),
        ..Default::default()
    };
    assert!(matches!(
        service.aktualisieren(&alice, gruppe.id, zu_lang).await,
        Err(ChatError::UngueltigeEingabe(_))
    ));
}
