//! OpenAI chat-completion backend
//!
//! Sends each string with a system instruction tuned for Android UI text and
//! reads the first completion back.
//!
//! # Request shape
//!
//! ```text
//! POST https://api.openai.com/v1/chat/completions
//! Authorization: Bearer <app key>
//! Content-Type: application/json
//!
//! {"model": "...", "messages": [
//!     {"role": "system", "text": "Translate the user provided text into ..."},
//!     {"role": "user", "text": "Text to translate: ..."}
//! ]}
//! ```

use crate::lang::{Lang, Languages};
use crate::mt::error::{MtError, MtResult};
use crate::mt::http::HttpRequest;
use crate::mt::translator::{BackendSettings, TranslationRequest, Translator, escape_json_text};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Registry key of this backend
pub const KEY: &str = "ChatGPT";
const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model used when the caller does not select one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    translation: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
    text: Option<String>,
}

impl ChatResponse {
    fn into_translation(self) -> Option<String> {
        let completion = self.choices.into_iter().next().and_then(|choice| {
            choice
                .message
                .and_then(|message| message.content.or(message.text))
                .or(choice.text)
                .map(|text| text.trim().to_string())
        });
        completion.or(self.translation)
    }
}

/// OpenAI ChatGPT backend
#[derive(Debug, Clone)]
pub struct ChatGptTranslator {
    api_url: String,
}

impl Default for ChatGptTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatGptTranslator {
    pub fn new() -> Self {
        Self {
            api_url: API_URL.to_string(),
        }
    }

    /// Point the backend at a compatible endpoint (proxy, self-hosted gateway)
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    fn system_instruction(to: &Lang) -> String {
        let lang = to.english_name;
        format!(
            "Translate the user provided text into high quality, well written {lang}. \
             Apply these 4 translation rules; \
             1.Keep the exact original formatting and style, \
             2.Keep translations concise and just repeat the original text for unchanged translations (e.g. 'OK'), \
             3.Audience: native {lang} speakers, \
             4.Text can be used in Android app UI (limited space, concise translations!)."
        )
    }
}

impl Translator for ChatGptTranslator {
    fn key(&self) -> &str {
        KEY
    }

    fn name(&self) -> &str {
        "OpenAI ChatGPT"
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

    fn request_url(&self, _request: &TranslationRequest<'_>, _settings: &BackendSettings) -> String {
        self.api_url.clone()
    }

    fn request_body(
        &self,
        request: &TranslationRequest<'_>,
        settings: &BackendSettings,
    ) -> MtResult<Vec<u8>> {
        let body = ChatRequest {
            model: settings.model().unwrap_or(DEFAULT_MODEL),
            messages: vec![
                ChatMessage {
                    role: "system",
                    text: Self::system_instruction(&request.to),
                },
                ChatMessage {
                    role: "user",
                    text: format!("Text to translate: {}", escape_json_text(request.text)),
                },
            ],
        };
        serde_json::to_vec(&body)
            .map_err(|e| MtError::Config(format!("Failed to serialize request: {}", e)))
    }

    fn configure_request(&self, request: &mut HttpRequest, settings: &BackendSettings) {
        request
            .set_header("Authorization", format!("Bearer {}", settings.app_key()))
            .set_header("Content-Type", "application/json");
    }

    fn parse_result(&self, request: &TranslationRequest<'_>, body: &str) -> String {
        match serde_json::from_str::<ChatResponse>(body) {
            Ok(response) => match response.into_translation() {
                Some(translation) => translation,
                None => {
                    error!(backend = KEY, body, "No translation found in response");
                    request.text.to_string()
                }
            },
            Err(e) => {
                error!(backend = KEY, error = %e, "Error parsing translation result");
                request.text.to_string()
            }
        }
    }
}
