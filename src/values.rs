//! Android `values-*` directory layout
//!
//! Translations for a language live in `<res>/values-<lang>/<file>.xml`, with
//! the region subtag written as `-r<REGION>` (`values-pt-rBR`). This module
//! maps languages to those locations and writes output files atomically.

use crate::lang::Lang;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::debug;

static VALUES_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+\.xml$").expect("valid values file pattern"));

/// Location of a language's copy of `file_name` under `resource_dir`
///
/// # Example
///
/// ```ignore
/// let path = value_file(Path::new("app/src/main/res"), &spanish, "strings.xml");
/// assert_eq!(path, Path::new("app/src/main/res/values-es/strings.xml"));
/// ```
pub fn value_file(resource_dir: &Path, lang: &Lang, file_name: &str) -> PathBuf {
    resource_dir
        .join(lang.values_directory_name())
        .join(file_name)
}

/// Whether `path` looks like a string resource file in a values directory
///
/// The parent directory name must start with `values` and the file name must
/// end in `.xml`.
pub fn is_value_file(path: &Path) -> bool {
    let parent_is_values = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("values"));
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| VALUES_FILE_NAME.is_match(name));
    parent_is_values && name_matches
}

/// The `res` directory holding a values file: `res/values/strings.xml` → `res`
pub fn resource_dir_of(value_file: &Path) -> Option<&Path> {
    value_file.parent().and_then(Path::parent)
}

/// Write `contents` to `path` without ever exposing a partial file
///
/// The data goes to a temporary file in the destination directory, which is
/// then renamed over `path`. Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote values file");
    Ok(())
}
