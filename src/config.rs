//! Run configuration
//!
//! Settings come from three layers, later ones winning: a TOML file, the
//! `VALUES_MT_*` environment variables, and command line flags (applied by
//! the binary through the public fields).
//!
//! ```toml
//! backend = "ChatGPT"
//! source_language = "en"
//! target_languages = ["es", "pt-BR"]
//! skip_non_translatable = true
//! max_concurrency = 8
//!
//! [credentials.ChatGPT]
//! app_key = "sk-..."
//! model = "gpt-4o"
//! ```

use crate::lang::{Lang, Languages};
use crate::mt::chatgpt;
use crate::mt::dispatch::RunOptions;
use crate::mt::translator::BackendSettings;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_BACKEND: &str = "VALUES_MT_BACKEND";
pub const ENV_APP_ID: &str = "VALUES_MT_APP_ID";
pub const ENV_APP_KEY: &str = "VALUES_MT_APP_KEY";
pub const ENV_MODEL: &str = "VALUES_MT_MODEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown language code '{0}'")]
    UnknownLanguage(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Settings for a translation run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Registry key of the backend to use
    pub backend: String,
    /// Source language code; `auto` lets the backend detect it
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub skip_non_translatable: bool,
    pub overwrite_existing: bool,
    pub keep_non_translatable: bool,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Per-backend credentials, keyed by backend key
    pub credentials: HashMap<String, BackendSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let options = RunOptions::default();
        Self {
            backend: chatgpt::KEY.to_string(),
            source_language: Languages::AUTO.code.to_string(),
            target_languages: Vec::new(),
            skip_non_translatable: options.skip_non_translatable,
            overwrite_existing: options.overwrite_existing,
            keep_non_translatable: options.keep_non_translatable,
            max_concurrency: options.max_concurrency,
            request_timeout_secs: options.request_timeout.as_secs(),
            max_retries: options.max_retries,
            credentials: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), backend = %settings.backend, "loaded config file");
        Ok(settings)
    }

    /// Apply `VALUES_MT_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`
    ///
    /// The backend override is applied first, so credential overrides land on
    /// the backend that will actually be used.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(backend) = get(ENV_BACKEND) {
            self.backend = backend;
        }
        if let Some(app_id) = get(ENV_APP_ID) {
            self.credentials_mut().app_id = Some(app_id);
        }
        if let Some(app_key) = get(ENV_APP_KEY) {
            self.credentials_mut().app_key = Some(app_key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.credentials_mut().model = Some(model);
        }
    }

    /// Credentials of the selected backend, created empty when missing
    pub fn credentials_mut(&mut self) -> &mut BackendSettings {
        self.credentials.entry(self.backend.clone()).or_default()
    }

    /// Credentials of the selected backend
    pub fn backend_settings(&self) -> BackendSettings {
        self.credentials
            .get(&self.backend)
            .cloned()
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.trim().is_empty() {
            return Err(ConfigError::Invalid("backend must not be empty".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            skip_non_translatable: self.skip_non_translatable,
            overwrite_existing: self.overwrite_existing,
            keep_non_translatable: self.keep_non_translatable,
            max_concurrency: self.max_concurrency,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            ..RunOptions::default()
        }
    }

    pub fn source_lang(&self) -> Result<Lang, ConfigError> {
        find_lang(&self.source_language)
    }

    /// Target languages in configured order
    pub fn target_langs(&self) -> Result<Vec<Lang>, ConfigError> {
        self.target_languages
            .iter()
            .map(|code| find_lang(code))
            .collect()
    }
}

fn find_lang(code: &str) -> Result<Lang, ConfigError> {
    Languages::find(code.trim()).ok_or_else(|| ConfigError::UnknownLanguage(code.to_string()))
}
