//! Google Translate API backend
//!
//! Integrates with Google Translate API v2. The API key travels in the query
//! string; obtain one from https://console.cloud.google.com/.

use crate::lang::{Lang, Languages};
use crate::mt::error::{MtError, MtResult};
use crate::mt::http::HttpRequest;
use crate::mt::translator::{
    BackendSettings, TranslationRequest, Translator, normalize_locale, normalized_translation,
};
use serde_json::{Value, json};
use tracing::error;

const KEY: &str = "Google";

/// Google Translate API v2 backend
#[derive(Debug, Clone)]
pub struct GoogleTranslateProvider {
    /// Base URL for Google Translate API
    base_url: String,
}

impl Default for GoogleTranslateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleTranslateProvider {
    /// Maximum characters per string (30KB per Google Translate API limits)
    const MAX_CHARS_PER_STRING: usize = 30_000;

    pub fn new() -> Self {
        Self {
            base_url: "https://translation.googleapis.com/language/translate/v2".to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Google's code for a language
    ///
    /// Chinese keeps its script-bearing region (`zh-CN`, `zh-TW`); every other
    /// code is reduced to its primary subtag.
    fn google_code(lang: &Lang) -> String {
        if lang.primary() == "zh" {
            lang.code.to_string()
        } else {
            normalize_locale(lang.code)
        }
    }
}

impl Translator for GoogleTranslateProvider {
    fn key(&self) -> &str {
        KEY
    }

    fn name(&self) -> &str {
        "Google Translate"
    }

    fn supported_languages(&self) -> &[Lang] {
        Languages::all()
    }

    fn needs_app_key(&self) -> bool {
        true
    }

    fn app_key_display(&self) -> &str {
        "API Key"
    }

    fn request_url(&self, _request: &TranslationRequest<'_>, settings: &BackendSettings) -> String {
        let key: String = url::form_urlencoded::byte_serialize(settings.app_key().as_bytes()).collect();
        format!("{}?key={}", self.base_url, key)
    }

    fn request_body(
        &self,
        request: &TranslationRequest<'_>,
        _settings: &BackendSettings,
    ) -> MtResult<Vec<u8>> {
        let len = request.text.chars().count();
        if len > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::TextTooLong {
                len,
                max: Self::MAX_CHARS_PER_STRING,
            });
        }

        let mut body = json!({
            "q": [request.text],
            "target": Self::google_code(&request.to),
            "format": "text"
        });
        if !request.from.is_auto() {
            body["source"] = Value::String(Self::google_code(&request.from));
        }

        serde_json::to_vec(&body)
            .map_err(|e| MtError::Config(format!("Failed to serialize request: {}", e)))
    }

    fn configure_request(&self, request: &mut HttpRequest, _settings: &BackendSettings) {
        request.set_header("Content-Type", "application/json");
    }

    fn parse_result(&self, request: &TranslationRequest<'_>, body: &str) -> String {
        let json: Value = match serde_json::from_str(body) {
            Ok(json) => json,
            Err(e) => {
                error!(backend = KEY, error = %e, "Failed to parse API response");
                return request.text.to_string();
            }
        };

        // Extract translatedText from the nested response
        if let Some(text) = json["data"]["translations"][0]["translatedText"].as_str() {
            return text.to_string();
        }
        if let Some(text) = normalized_translation(body) {
            return text;
        }

        error!(
            backend = KEY,
            body, "Invalid API response: missing 'data.translations' array"
        );
        request.text.to_string()
    }
}
