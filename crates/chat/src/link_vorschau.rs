//! Link-Vorschau fuer Text-Nachrichten
//!
//! Enthaelt eine Nachricht eine http(s)-URL, wird im Hintergrund die Seite
//! geladen und Titel, Beschreibung und Bild aus `<title>` bzw. den
//! OpenGraph-Tags unter `metadata.link_preview` abgelegt. Fehler werden
//! geloggt und verschluckt; die Nachricht selbst ist davon nie betroffen.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use agora_core::{AenderungsEvent, EventBus, KonversationId};
use agora_db::ChatMessageRepository;

use crate::ereignis_senden;

/// Standard-Obergrenze fuer den geladenen HTML-Anteil
pub const STANDARD_MAX_BYTES: usize = 256 * 1024;

/// Ergebnis einer Link-Vorschau
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkVorschau {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}

impl LinkVorschau {
    fn ist_leer(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }
}

/// Laedt Vorschaudaten fuer eine URL
#[async_trait]
pub trait VorschauLader: Send + Sync {
    /// `Ok(None)` wenn die Seite nichts Verwertbares liefert
    async fn laden(&self, url: &str) -> anyhow::Result<Option<LinkVorschau>>;
}

/// HTTP-Implementierung ueber `reqwest`
pub struct HttpVorschauLader {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpVorschauLader {
    pub fn neu(timeout: Duration, max_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("agora-link-preview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl VorschauLader for HttpVorschauLader {
    async fn laden(&self, url: &str) -> anyhow::Result<Option<LinkVorschau>> {
        let mut resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            anyhow::bail!("Server antwortete mit {}", resp.status());
        }

        let ist_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !ist_html {
            return Ok(None);
        }

        // Nur den Kopf der Seite lesen
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= self.max_bytes {
                body.truncate(self.max_bytes);
                break;
            }
        }

        let html = String::from_utf8_lossy(&body);
        Ok(html_auswerten(url, &html))
    }
}

/// Erste gueltige http(s)-URL mit Host im Text, ohne abschliessende Satzzeichen
pub fn erste_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .map(|wort| {
            wort.trim_start_matches(['(', '<', '"', '\''])
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '>', '"', '\''])
        })
        .find(|kandidat| url_gueltig(kandidat))
}

fn url_gueltig(kandidat: &str) -> bool {
    match Url::parse(kandidat) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Extrahiert Titel und OpenGraph-Angaben aus HTML
pub fn html_auswerten(url: &str, html: &str) -> Option<LinkVorschau> {
    let vorschau = LinkVorschau {
        url: url.to_string(),
        title: meta_inhalt(html, "og:title").or_else(|| titel_tag(html)),
        description: meta_inhalt(html, "og:description")
            .or_else(|| meta_inhalt(html, "description")),
        image: meta_inhalt(html, "og:image"),
        site_name: meta_inhalt(html, "og:site_name"),
    };
    (!vorschau.ist_leer()).then_some(vorschau)
}

fn titel_tag(html: &str) -> Option<String> {
    let klein = html.to_ascii_lowercase();
    let start = klein.find("<title")?;
    let inhalt_start = start + klein[start..].find('>')? + 1;
    let ende = inhalt_start + klein[inhalt_start..].find("</title>")?;
    bereinigen(&html[inhalt_start..ende])
}

/// Sucht `<meta property|name="schluessel" content="...">`
fn meta_inhalt(html: &str, schluessel: &str) -> Option<String> {
    let klein = html.to_ascii_lowercase();
    let mut rest = 0;
    while let Some(pos) = klein[rest..].find("<meta") {
        let start = rest + pos;
        let ende = start + klein[start..].find('>')?;
        let tag = &html[start..ende];
        let tag_klein = &klein[start..ende];
        rest = ende;

        let passt = ["property", "name"].iter().any(|attr| {
            attribut(tag, tag_klein, attr).is_some_and(|wert| wert.eq_ignore_ascii_case(schluessel))
        });
        if passt {
            if let Some(wert) = attribut(tag, tag_klein, "content") {
                return bereinigen(wert);
            }
        }
    }
    None
}

/// Wert eines Attributs in einfachen oder doppelten Anfuehrungszeichen
fn attribut<'a>(tag: &'a str, tag_klein: &str, name: &str) -> Option<&'a str> {
    let muster = format!("{name}=");
    let mut suche = 0;
    loop {
        let pos = suche + tag_klein[suche..].find(&muster)?;
        suche = pos + muster.len();
        // "og:content=" o.ae. nicht als Attribut werten
        let davor = tag_klein[..pos].chars().last();
        if !matches!(davor, Some(c) if c.is_ascii_whitespace()) {
            continue;
        }
        let quote = tag[suche..].chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let wert_start = suche + 1;
        let wert_ende = wert_start + tag[wert_start..].find(quote)?;
        return Some(&tag[wert_start..wert_ende]);
    }
}

fn bereinigen(s: &str) -> Option<String> {
    let text = s
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text: String = text.chars().take(300).collect();
    (!text.is_empty()).then_some(text)
}

/// Laedt die Vorschau und haengt sie an die Nachricht an
///
/// Laeuft in einem eigenen Task; alle Fehler enden hier im Log.
pub(crate) async fn vorschau_anhaengen<R>(
    repo: Arc<R>,
    events: Arc<dyn EventBus>,
    lader: Arc<dyn VorschauLader>,
    nachricht_id: Uuid,
    konversation_id: Uuid,
    url: String,
    mut metadata: serde_json::Value,
) where
    R: ChatMessageRepository + 'static,
{
    let vorschau = match lader.laden(&url).await {
        Ok(Some(v)) => v,
        Ok(None) => {
            tracing::debug!(nachricht_id = %nachricht_id, url = %url, "Keine Link-Vorschau verfuegbar");
            return;
        }
        Err(e) => {
            tracing::warn!(nachricht_id = %nachricht_id, url = %url, fehler = %e, "Link-Vorschau fehlgeschlagen");
            return;
        }
    };

    let Some(objekt) = metadata.as_object_mut() else {
        return;
    };
    match serde_json::to_value(&vorschau) {
        Ok(wert) => {
            objekt.insert("link_preview".into(), wert);
        }
        Err(e) => {
            tracing::warn!(nachricht_id = %nachricht_id, fehler = %e, "Link-Vorschau nicht serialisierbar");
            return;
        }
    }

    if let Err(e) = repo.update_metadata(nachricht_id, metadata).await {
        // Nachricht kann inzwischen geloescht sein
        tracing::warn!(nachricht_id = %nachricht_id, fehler = %e, "Link-Vorschau nicht gespeichert");
        return;
    }

    tracing::debug!(nachricht_id = %nachricht_id, url = %url, "Link-Vorschau gespeichert");
    ereignis_senden(
        events.as_ref(),
        AenderungsEvent::NachrichtAktualisiert {
            nachricht_id,
            konversation_id: KonversationId(konversation_id),
            edited_at: None,
            deleted_at: None,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_im_text_finden() {
        assert_eq!(
            erste_url("Schau mal (https://example.org/a?b=1)."),
            Some("https://example.org/a?b=1")
        );
        assert_eq!(erste_url("http://x.de, cool"), Some("http://x.de"));
        assert_eq!(erste_url("ftp://example.org und https://"), None);
        assert_eq!(erste_url("keine Links hier"), None);
    }

    #[test]
    fn kaputte_urls_werden_uebersprungen() {
        assert_eq!(erste_url("http://[ kaputt"), None);
        assert_eq!(
            erste_url("erst http://[::1 dann https://example.org/ok"),
            Some("https://example.org/ok")
        );
        assert_eq!(erste_url("mailto:jemand@example.org"), None);
    }

    #[test]
    fn opengraph_hat_vorrang() {
        let html = r#"<html><head>
            <title>Fallback</title>
            <meta property="og:title" content="Echter &amp; Titel">
            <meta name="description" content='Kurze Beschreibung'>
            <META PROPERTY="og:image" CONTENT="https://example.org/bild.png">
        </head></html>"#;

        let v = html_auswerten("https://example.org", html).unwrap();
        assert_eq!(v.title.as_deref(), Some("Echter & Titel"));
        assert_eq!(v.description.as_deref(), Some("Kurze Beschreibung"));
        assert_eq!(v.image.as_deref(), Some("https://example.org/bild.png"));
        assert!(v.site_name.is_none());
    }

    #[test]
    fn titel_tag_als_fallback() {
        let v = html_auswerten("https://x.de", "<title>\n  Nur   Titel </title>").unwrap();
        assert_eq!(v.title.as_deref(), Some("Nur Titel"));
    }

    #[test]
    fn leere_seite_ergibt_keine_vorschau() {
        assert!(html_auswerten("https://x.de", "<html><body>Hallo</body></html>").is_none());
    }
}
