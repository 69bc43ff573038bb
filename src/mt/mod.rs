//! Machine Translation Module
//!
//! This module sends the entries of an Android values file to a machine
//! translation backend and merges the results into per-language values files.
//!
//! # Overview
//!
//! The MT module consists of several components working together:
//!
//! 1. **Translator Trait & Backends** - Per-provider request shaping and response
//!    normalization (ChatGPT, Google Translate, DeepL, and a mock for tests)
//! 2. **Registry** - Append-only lookup of backends by key
//! 3. **HTTP Transport** - The only place that talks to the network
//! 4. **Dispatcher** - Bounded concurrent fan-out with timeouts, retries and
//!    cancellation
//! 5. **Merge** - Combines translations with an existing destination file
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use values_mt::lang::Languages;
//! use values_mt::mt::{BackendSettings, CancelFlag, Dispatcher, ReqwestTransport, RunOptions, TranslatorRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(30))?);
//!     let dispatcher = Dispatcher::from_registry(
//!         TranslatorRegistry::global(),
//!         "ChatGPT",
//!         transport,
//!         BackendSettings::with_app_key(std::env::var("OPENAI_API_KEY")?),
//!         RunOptions::default(),
//!     )?;
//!
//!     let targets = [Languages::find("es").unwrap(), Languages::find("pt-BR").unwrap()];
//!     let results = dispatcher
//!         .translate_file(
//!             "app/src/main/res/values/strings.xml".as_ref(),
//!             "app/src/main/res".as_ref(),
//!             Languages::AUTO,
//!             &targets,
//!             &CancelFlag::new(),
//!         )
//!         .await?;
//!
//!     for result in results {
//!         println!("{:?}", result?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chatgpt;
pub mod deepl;
pub mod dispatch;
pub mod error;
pub mod google_translate;
pub mod http;
pub mod merge;
pub mod mock;
pub mod registry;
pub mod translator;

#[cfg(test)]
mod integration_tests;

pub use chatgpt::ChatGptTranslator;
pub use deepl::DeepLTranslator;
pub use dispatch::{
    CancelFlag, DispatchError, Dispatcher, MergeReport, RunJob, RunOptions, RunState,
};
pub use error::{MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use merge::{MergeOutcome, merge_entries};
pub use mock::{MockMode, MockReply, MockTranslator, MockTransport};
pub use registry::TranslatorRegistry;
pub use translator::{BackendSettings, TranslationRequest, Translator, TranslatorDescriptor};
