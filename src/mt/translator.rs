//! Translator trait and utilities
//!
//! This module defines the `Translator` trait for backend abstraction. A
//! backend never talks to the network itself: it builds the outbound request
//! (URL, body, headers) for one piece of text and turns the raw response body
//! back into translated text. The dispatcher owns sending, timeouts and
//! retries, so every backend gets them for free.
//!
//! # Example
//!
//! ```ignore
//! use values_mt::mt::{BackendSettings, ChatGptTranslator, TranslationRequest, Translator};
//! use values_mt::lang::Languages;
//!
//! let backend = ChatGptTranslator::new();
//! let settings = BackendSettings::with_app_key("sk-...");
//! let spanish = Languages::find("es").unwrap();
//! let request = TranslationRequest::new(Languages::ENGLISH, spanish, "Save");
//!
//! let http_request = backend.build_request(&request, &settings)?;
//! // ... send it, then:
//! let translated = backend.parse_result(&request, &response_body);
//! ```

use crate::lang::Lang;
use crate::mt::error::{MtError, MtResult};
use crate::mt::http::HttpRequest;
use serde::Deserialize;
use std::fmt;

/// Credentials and model selection supplied by the caller for one backend
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub model: Option<String>,
}

impl BackendSettings {
    pub fn with_app_key(app_key: impl Into<String>) -> Self {
        Self {
            app_key: Some(app_key.into()),
            ..Self::default()
        }
    }

    /// The app id, or an empty string when unset
    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or_default()
    }

    /// The app key, or an empty string when unset
    pub fn app_key(&self) -> &str {
        self.app_key.as_deref().unwrap_or_default()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().filter(|model| !model.trim().is_empty())
    }

    pub fn has_app_id(&self) -> bool {
        !self.app_id().trim().is_empty()
    }

    pub fn has_app_key(&self) -> bool {
        !self.app_key().trim().is_empty()
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("BackendSettings")
            .field("app_id", &mask(&self.app_id))
            .field("app_key", &mask(&self.app_key))
            .field("model", &self.model)
            .finish()
    }
}

/// One piece of text to translate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRequest<'a> {
    pub from: Lang,
    pub to: Lang,
    pub text: &'a str,
}

impl<'a> TranslationRequest<'a> {
    pub fn new(from: Lang, to: Lang, text: &'a str) -> Self {
        Self { from, to, text }
    }
}

/// Static description of a backend, for pickers and credential forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorDescriptor {
    pub key: String,
    pub display_name: String,
    pub requires_app_id: bool,
    pub requires_app_key: bool,
    pub app_id_label: String,
    pub app_key_label: String,
    pub supported_languages: Vec<Lang>,
}

/// Generic trait for translation backends
///
/// Implementations shape requests and interpret responses for one provider.
/// They are registered once in a [`TranslatorRegistry`](crate::mt::TranslatorRegistry)
/// and shared read-only between concurrent runs.
pub trait Translator: Send + Sync {
    /// Stable unique identifier, used as the registry key and persisted
    /// "selected backend" preference
    fn key(&self) -> &str;

    /// Human readable provider name
    fn name(&self) -> &str;

    /// Languages this backend can translate into
    fn supported_languages(&self) -> &[Lang];

    fn needs_app_id(&self) -> bool {
        false
    }

    fn needs_app_key(&self) -> bool {
        false
    }

    fn app_id_display(&self) -> &str {
        "APP ID"
    }

    fn app_key_display(&self) -> &str {
        "APP KEY"
    }

    /// Endpoint for translating `request`
    fn request_url(&self, request: &TranslationRequest<'_>, settings: &BackendSettings) -> String;

    /// Serialized request payload
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The body to send
    /// * `Err(MtError)` - The text cannot be sent to this backend (too long,
    ///   not serializable)
    fn request_body(
        &self,
        request: &TranslationRequest<'_>,
        settings: &BackendSettings,
    ) -> MtResult<Vec<u8>>;

    /// Attach backend-specific headers (auth, content type)
    fn configure_request(&self, _request: &mut HttpRequest, _settings: &BackendSettings) {}

    /// Turn a raw response body into translated text
    ///
    /// Must never fail: when the body cannot be decoded or holds no
    /// translation, implementations log an error and return
    /// `request.text` unchanged.
    fn parse_result(&self, request: &TranslationRequest<'_>, body: &str) -> String;

    fn descriptor(&self) -> TranslatorDescriptor {
        TranslatorDescriptor {
            key: self.key().to_string(),
            display_name: self.name().to_string(),
            requires_app_id: self.needs_app_id(),
            requires_app_key: self.needs_app_key(),
            app_id_label: self.app_id_display().to_string(),
            app_key_label: self.app_key_display().to_string(),
            supported_languages: self.supported_languages().to_vec(),
        }
    }

    fn supports(&self, lang: &Lang) -> bool {
        self.supported_languages()
            .iter()
            .any(|supported| supported.code.eq_ignore_ascii_case(lang.code))
    }

    /// Check target language and credentials before anything is sent
    fn validate(&self, to: &Lang, settings: &BackendSettings) -> MtResult<()> {
        if !self.supports(to) {
            return Err(MtError::UnsupportedLanguage {
                backend: self.key().to_string(),
                language: to.code.to_string(),
            });
        }
        if self.needs_app_id() && !settings.has_app_id() {
            return Err(MtError::MissingCredential {
                backend: self.key().to_string(),
                field: self.app_id_display().to_string(),
            });
        }
        if self.needs_app_key() && !settings.has_app_key() {
            return Err(MtError::MissingCredential {
                backend: self.key().to_string(),
                field: self.app_key_display().to_string(),
            });
        }
        Ok(())
    }

    /// Assemble the full outbound request for `request`
    fn build_request(
        &self,
        request: &TranslationRequest<'_>,
        settings: &BackendSettings,
    ) -> MtResult<HttpRequest> {
        let url = self.request_url(request, settings);
        let body = self.request_body(request, settings)?;
        let mut http_request = HttpRequest::post(url, body);
        self.configure_request(&mut http_request, settings);
        Ok(http_request)
    }
}

#[derive(Deserialize)]
struct NormalizedResponse {
    translation: Option<String>,
}

/// Read the provider-neutral `{"translation": "..."}` response shape
///
/// Every bundled backend accepts it in addition to its provider's own shape,
/// which lets proxies and test doubles answer in one format.
pub fn normalized_translation(body: &str) -> Option<String> {
    serde_json::from_str::<NormalizedResponse>(body)
        .ok()
        .and_then(|response| response.translation)
}

/// Escape text the way a JSON string literal would
///
/// Used by prompt-style backends that embed the user's text inside an
/// instruction: the escaped form keeps newlines and quotes visible to the
/// model instead of breaking the prompt.
pub fn escape_json_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\u{8}', "\\b")
        .replace('\u{c}', "\\f")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Normalize a locale code by stripping region information
///
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `en` → `en` (unchanged)
pub fn normalize_locale(locale: &str) -> String {
    locale.split('-').next().unwrap_or(locale).to_lowercase()
}
