//! Mock backend and transport for testing
//!
//! [`MockTranslator`] computes its "translation" locally and puts it in the
//! request body as `{"translation": "..."}`; [`MockTransport`] echoes request
//! bodies back (or fails on purpose), so the whole dispatch path runs without
//! API keys or network access.
//!
//! # Example
//!
//! ```ignore
//! use values_mt::mt::{MockMode, MockTranslator, MockTransport};
//!
//! let translator = MockTranslator::new(MockMode::Suffix);
//! let transport = MockTransport::loopback();
//! // hand both to a Dispatcher; "hello" comes back as "hello_fr"
//! ```

use crate::lang::{Lang, Languages};
use crate::mt::error::{MtError, MtResult};
use crate::mt::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::mt::translator::{
    BackendSettings, TranslationRequest, Translator, normalized_translation,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::error;

const KEY: &str = "Mock";
const MOCK_URL: &str = "mock://translate";

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append locale suffix: "hello" → "hello_fr"
    Suffix,

    /// Use predefined mappings for realistic translations
    /// (text, target_locale) → translation, falling back to [`MockMode::Suffix`]
    Mappings(HashMap<(String, String), String>),

    /// No-op: return input unchanged
    Echo,

    /// Produce a response body that is not JSON
    Malformed,
}

/// Backend that translates deterministically without a provider
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self { mode }
    }

    /// Apply translation logic based on the mode
    fn apply_translation(&self, text: &str, target: &str) -> String {
        match &self.mode {
            MockMode::Suffix => format!("{}_{}", text, target),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                map.get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target))
            }
            MockMode::Echo | MockMode::Malformed => text.to_string(),
        }
    }
}

impl Translator for MockTranslator {
    fn key(&self) -> &str {
        KEY
    }

    fn name(&self) -> &str {
        "Mock Translator"
    }

    fn supported_languages(&self) -> &[Lang] {
        Languages::all()
    }

    fn request_url(&self, _request: &TranslationRequest<'_>, _settings: &BackendSettings) -> String {
        MOCK_URL.to_string()
    }

    fn request_body(
        &self,
        request: &TranslationRequest<'_>,
        _settings: &BackendSettings,
    ) -> MtResult<Vec<u8>> {
        if let MockMode::Malformed = self.mode {
            return Ok(b"<html>502 Bad Gateway</html>".to_vec());
        }
        let translation = self.apply_translation(request.text, request.to.code);
        Ok(json!({ "translation": translation }).to_string().into_bytes())
    }

    fn configure_request(&self, request: &mut HttpRequest, _settings: &BackendSettings) {
        request.set_header("Content-Type", "application/json");
    }

    fn parse_result(&self, request: &TranslationRequest<'_>, body: &str) -> String {
        normalized_translation(body).unwrap_or_else(|| {
            error!(backend = KEY, body, "No translation found in response");
            request.text.to_string()
        })
    }
}

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer 200 with the request body
    Loopback,
    /// Answer with a fixed status and body
    Respond(HttpResponse),
    /// Fail at the transport level
    Fail(MtError),
}

/// Transport that answers from a script instead of the network
///
/// Scripted replies are consumed in order; once the script is empty every
/// request gets the default reply.
#[derive(Debug)]
pub struct MockTransport {
    default_reply: MockReply,
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl MockTransport {
    pub fn new(default_reply: MockReply) -> Self {
        Self {
            default_reply,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Echo every request body back with status 200
    pub fn loopback() -> Self {
        Self::new(MockReply::Loopback)
    }

    /// Fail every request with `error`
    pub fn failing(error: MtError) -> Self {
        Self::new(MockReply::Fail(error))
    }

    /// Simulated latency applied to every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue replies used before falling back to the default
    pub fn with_script(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(replies);
        }
        self
    }

    /// Number of requests received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> MtResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let reply = self.next_reply();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            MockReply::Loopback => Ok(HttpResponse::ok(request.body_text())),
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(error) => Err(error),
        }
    }
}
