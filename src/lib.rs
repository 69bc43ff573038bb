//! Machine translation for Android string resources
//!
//! Reads a `values/strings.xml` style resource file, sends its translatable
//! entries to a machine translation backend and merges the results into the
//! matching `values-<lang>` files.

pub mod config;
pub mod lang;
pub mod mt;
pub mod resource;
pub mod values;

pub use config::{ConfigError, Settings};
pub use lang::{Lang, Languages};
pub use resource::{ResourceDocument, ResourceEntry, ResourceError, extract};
