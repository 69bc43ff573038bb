//! Backend registry
//!
//! Maps backend keys to shared [`Translator`] instances. The registry only
//! grows: backends are added at startup and never replaced or removed, so it
//! can be shared read-only between concurrent runs without locking.

use crate::mt::chatgpt::ChatGptTranslator;
use crate::mt::deepl::DeepLTranslator;
use crate::mt::error::{MtError, MtResult};
use crate::mt::google_translate::GoogleTranslateProvider;
use crate::mt::translator::{Translator, TranslatorDescriptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

fn chatgpt() -> Arc<dyn Translator> {
    Arc::new(ChatGptTranslator::new())
}

fn google() -> Arc<dyn Translator> {
    Arc::new(GoogleTranslateProvider::new())
}

fn deepl() -> Arc<dyn Translator> {
    Arc::new(DeepLTranslator::new())
}

/// Known backend constructors, in presentation order
const DEFAULT_BACKENDS: &[fn() -> Arc<dyn Translator>] = &[chatgpt, google, deepl];

/// Append-only collection of translation backends
#[derive(Default)]
pub struct TranslatorRegistry {
    order: Vec<String>,
    backends: HashMap<String, Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every bundled backend
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for constructor in DEFAULT_BACKENDS {
            if let Err(e) = registry.register(constructor()) {
                warn!(error = %e, "skipping bundled backend");
            }
        }
        registry
    }

    /// The process-wide registry, built from the bundled backends on first use
    pub fn global() -> &'static TranslatorRegistry {
        static GLOBAL: OnceLock<TranslatorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_defaults)
    }

    /// Add a backend under its own key
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The backend was added
    /// * `Err(MtError::DuplicateBackend)` - The key is taken; the existing
    ///   backend stays registered
    pub fn register(&mut self, translator: Arc<dyn Translator>) -> MtResult<()> {
        let key = translator.key().to_string();
        if self.backends.contains_key(&key) {
            return Err(MtError::DuplicateBackend(key));
        }
        debug!(backend = %key, "registered translation backend");
        self.order.push(key.clone());
        self.backends.insert(key, translator);
        Ok(())
    }

    /// Look up a backend by exact, case-sensitive key
    pub fn get(&self, key: &str) -> MtResult<Arc<dyn Translator>> {
        self.backends
            .get(key)
            .cloned()
            .ok_or_else(|| MtError::BackendNotFound(key.to_string()))
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn descriptors(&self) -> Vec<TranslatorDescriptor> {
        self.order
            .iter()
            .filter_map(|key| self.backends.get(key))
            .map(|backend| backend.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("backends", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::mock::{MockMode, MockTranslator};

    #[test]
    fn test_defaults_registered_in_order() {
        let registry = TranslatorRegistry::with_defaults();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(keys, vec!["ChatGPT", "Google", "DeepL"]);
    }

    #[test]
    fn test_every_bundled_backend_registered() {
        let registry = TranslatorRegistry::with_defaults();
        assert_eq!(registry.len(), DEFAULT_BACKENDS.len());
        for constructor in DEFAULT_BACKENDS {
            let backend = constructor();
            assert!(registry.get(backend.key()).is_ok());
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = TranslatorRegistry::with_defaults();
        assert!(registry.get("ChatGPT").is_ok());
        assert_eq!(
            registry.get("chatgpt").err(),
            Some(MtError::BackendNotFound("chatgpt".to_string()))
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TranslatorRegistry::new();
        registry
            .register(Arc::new(MockTranslator::new(MockMode::Suffix)))
            .unwrap();
        let result = registry.register(Arc::new(MockTranslator::new(MockMode::Echo)));
        assert_eq!(result, Err(MtError::DuplicateBackend("Mock".to_string())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_custom_backend() {
        let mut registry = TranslatorRegistry::with_defaults();
        registry
            .register(Arc::new(MockTranslator::new(MockMode::Suffix)))
            .unwrap();
        assert_eq!(registry.get("Mock").unwrap().name(), "Mock Translator");
        assert_eq!(registry.keys().last(), Some("Mock"));
    }

    #[test]
    fn test_descriptors() {
        let registry = TranslatorRegistry::with_defaults();
        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].display_name, "OpenAI ChatGPT");
        assert!(descriptors.iter().all(|d| d.requires_app_key));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(
            TranslatorRegistry::global(),
            TranslatorRegistry::global()
        ));
        assert!(!TranslatorRegistry::global().is_empty());
    }
}
