//! Live translation seam.
//!
//! The TRANSLATION state forwards every utterance here. The provider API
//! transport is external; what the hub relies on is the contract: `None` on
//! failure, never an error into the loop. The offline fallback keeps the
//! live feed working without network access or an API key.

use async_trait::async_trait;
use tracing::warn;

/// Translation backend contract.
#[async_trait]
pub trait Translator: Send {
    /// Translate `text` to the configured target language. `None` means the
    /// backend could not translate this utterance.
    async fn translate(&self, text: &str) -> Option<String>;
}

/// Dictionary-backed fallback translator. Covers common phrases for French
/// and tags everything else with the target language code so the live feed
/// stays visibly alive in demos.
pub struct OfflineTranslator {
    target_lang: String,
}

impl OfflineTranslator {
    #[must_use]
    pub fn new(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_uppercase(),
        }
    }
}

/// Common-phrase dictionary for the French fallback.
const FRENCH_PHRASES: [(&str, &str); 12] = [
    ("hello", "bonjour"),
    ("goodbye", "au revoir"),
    ("thank you", "merci"),
    ("please", "s'il vous plaît"),
    ("yes", "oui"),
    ("no", "non"),
    ("how are you", "comment allez-vous"),
    ("good morning", "bonjour"),
    ("good evening", "bonsoir"),
    ("water", "eau"),
    ("food", "nourriture"),
    ("help", "aide"),
];

#[async_trait]
impl Translator for OfflineTranslator {
    async fn translate(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.target_lang == "FR" {
            let lowered = text.to_lowercase();
            for (english, french) in FRENCH_PHRASES {
                if lowered.contains(english) {
                    return Some(format!("[FR] {french}"));
                }
            }
        }
        Some(format!("[{}] {text}", self.target_lang))
    }
}

/// HTTP translation client in the DeepL request shape. Falls back to `None`
/// on any failure; the orchestrator keeps the last good line on screen.
pub struct HttpTranslator {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    source_lang: String,
    target_lang: String,
}

impl HttpTranslator {
    /// Build a client from an API key found in the environment, or `None`
    /// when no key is configured.
    #[must_use]
    pub fn from_env(source_lang: &str, target_lang: &str) -> Option<Self> {
        let api_key = std::env::var("DEEPL_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: "https://api-free.deepl.com/v2/translate".to_owned(),
            source_lang: source_lang.to_uppercase(),
            target_lang: target_lang.to_uppercase(),
        })
    }

    /// Point the client at a different endpoint (tests, self-hosted proxy).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_owned();
        self
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let body = serde_json::json!({
            "text": [text],
            "source_lang": self.source_lang,
            "target_lang": self.target_lang,
        });
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("translation request failed: {e}");
                return None;
            }
        };

        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("translation response unreadable: {e}");
                return None;
            }
        };

        body.get("translations")?
            .get(0)?
            .get("text")?
            .as_str()
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn offline_french_hits_dictionary() {
        let translator = OfflineTranslator::new("fr");
        let out = translator.translate("hello there").await.unwrap();
        assert_eq!(out, "[FR] bonjour");
    }

    #[tokio::test]
    async fn offline_unknown_phrase_is_tagged() {
        let translator = OfflineTranslator::new("es");
        let out = translator.translate("where is the station").await.unwrap();
        assert_eq!(out, "[ES] where is the station");
    }

    #[tokio::test]
    async fn offline_empty_is_none() {
        let translator = OfflineTranslator::new("fr");
        assert!(translator.translate("   ").await.is_none());
    }
}
