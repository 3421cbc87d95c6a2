//! Tests fuer Registry und Ungelesen-Synchronisation

mod sync_tests;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;

use crate::error::{RealtimeError, RealtimeResult};
use crate::transport::{AboCallback, AboId, AboSpec, RealtimeTransport};

/// Transport-Attrappe mit Zaehlern und einstellbarer Verzoegerung
#[derive(Default)]
pub(crate) struct ZaehlTransport {
    pub aktiv: Mutex<HashMap<String, AboId>>,
    pub abonniert: AtomicUsize,
    pub abbestellt: AtomicUsize,
    pub verzoegerung_ms: AtomicUsize,
    pub fehler: AtomicBool,
}

impl ZaehlTransport {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mit_verzoegerung(ms: usize) -> Arc<Self> {
        let t = Self::default();
        t.verzoegerung_ms.store(ms, Ordering::SeqCst);
        Arc::new(t)
    }

    pub fn anzahl_aktiv(&self) -> usize {
        self.aktiv.lock().len()
    }
}

#[async_trait]
impl RealtimeTransport for ZaehlTransport {
    async fn abonnieren(&self, spec: AboSpec, _callback: AboCallback) -> RealtimeResult<AboId> {
        self.abonniert.fetch_add(1, Ordering::SeqCst);
        let ms = self.verzoegerung_ms.load(Ordering::SeqCst) as u64;
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.fehler.load(Ordering::SeqCst) {
            return Err(RealtimeError::intern("Verbindung abgelehnt"));
        }

        let mut aktiv = self.aktiv.lock();
        if aktiv.contains_key(&spec.name) {
            return Err(RealtimeError::BereitsAbonniert(spec.name));
        }
        let id = AboId::new();
        aktiv.insert(spec.name, id);
        Ok(id)
    }

    async fn abbestellen(&self, name: &str, abo_id: AboId) -> RealtimeResult<()> {
        self.abbestellt.fetch_add(1, Ordering::SeqCst);
        let mut aktiv = self.aktiv.lock();
        if aktiv.get(name) == Some(&abo_id) {
            aktiv.remove(name);
        }
        Ok(())
    }
}

pub(crate) fn leerer_callback() -> AboCallback {
    Arc::new(|_event| async {}.boxed())
}

/// Wartet bis die Bedingung gilt (maximal ~2 Sekunden)
pub(crate) async fn warten_bis<F, Fut>(mut bedingung: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if bedingung().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
