//! DeepL API backend
//!
//! Free-plan keys end in `:fx` and are served from a separate host; the
//! backend picks the endpoint from the key.

use crate::lang::{Lang, Languages};
use crate::mt::error::MtResult;
use crate::mt::http::HttpRequest;
use crate::mt::translator::{
    BackendSettings, TranslationRequest, Translator, normalized_translation,
};
use serde::Deserialize;
use tracing::error;

const KEY: &str = "DeepL";
const FREE_API_URL: &str = "https://api-free.deepl.com/v2/translate";
const PRO_API_URL: &str = "https://api.deepl.com/v2/translate";

const SUPPORTED_CODES: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "in", "it", "ja",
    "ko", "lt", "lv", "nb", "nl", "pl", "pt", "pt-BR", "ro", "ru", "sk", "sl", "sv", "tr", "uk",
    "zh-CN", "zh-TW",
];

#[derive(Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

/// DeepL backend
#[derive(Debug, Clone)]
pub struct DeepLTranslator {
    languages: Vec<Lang>,
}

impl Default for DeepLTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeepLTranslator {
    pub fn new() -> Self {
        let languages = Languages::all()
            .iter()
            .filter(|lang| SUPPORTED_CODES.contains(&lang.code))
            .copied()
            .collect();
        Self { languages }
    }

    /// DeepL's target code: upper case, English and Portuguese need a variant
    fn target_code(lang: &Lang) -> String {
        match lang.code {
            "en" => "EN-US".to_string(),
            "pt" => "PT-PT".to_string(),
            "pt-BR" => "PT-BR".to_string(),
            "zh-CN" => "ZH-HANS".to_string(),
            "zh-TW" => "ZH-HANT".to_string(),
            "in" => "ID".to_string(),
            _ => lang.primary().to_ascii_uppercase(),
        }
    }

    /// Source codes never carry a variant
    fn source_code(lang: &Lang) -> String {
        match lang.code {
            "in" => "ID".to_string(),
            _ => lang.primary().to_ascii_uppercase(),
        }
    }
}

impl Translator for DeepLTranslator {
    fn key(&self) -> &str {
        KEY
    }

    fn name(&self) -> &str {
        "DeepL"
    }

    fn supported_languages(&self) -> &[Lang] {
        &self.languages
    }

    fn needs_app_key(&self) -> bool {
        true
    }

    fn app_key_display(&self) -> &str {
        "Auth Key"
    }

    fn request_url(&self, _request: &TranslationRequest<'_>, settings: &BackendSettings) -> String {
        if settings.app_key().trim_end().ends_with(":fx") {
            FREE_API_URL.to_string()
        } else {
            PRO_API_URL.to_string()
        }
    }

    fn request_body(
        &self,
        request: &TranslationRequest<'_>,
        _settings: &BackendSettings,
    ) -> MtResult<Vec<u8>> {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("text", request.text)
            .append_pair("target_lang", &Self::target_code(&request.to));
        if !request.from.is_auto() {
            form.append_pair("source_lang", &Self::source_code(&request.from));
        }
        Ok(form.finish().into_bytes())
    }

    fn configure_request(&self, request: &mut HttpRequest, settings: &BackendSettings) {
        request
            .set_header(
                "Authorization",
                format!("DeepL-Auth-Key {}", settings.app_key()),
            )
            .set_header("Content-Type", "application/x-www-form-urlencoded");
    }

    fn parse_result(&self, request: &TranslationRequest<'_>, body: &str) -> String {
        let translated = serde_json::from_str::<DeepLResponse>(body)
            .ok()
            .and_then(|response| response.translations.into_iter().next())
            .map(|translation| translation.text)
            .or_else(|| normalized_translation(body));

        match translated {
            Some(text) => text,
            None => {
                error!(backend = KEY, body, "No translation found in response");
                request.text.to_string()
            }
        }
    }
}
