//! Android string resource documents
//!
//! A resource document is an XML file with a single root element (normally
//! `<resources>`) whose direct children are the entries: `<string>`,
//! `<plurals>`, `<string-array>` and friends. This module extracts those
//! children as owned [`ResourceEntry`] values, keeping each entry's exact
//! source text so untouched entries can be written back byte for byte.
//!
//! # Example
//!
//! ```ignore
//! use values_mt::resource::ResourceDocument;
//!
//! let document = ResourceDocument::parse(r#"<resources>
//!     <string name="app_name">Notes</string>
//!     <string name="debug_label" translatable="false">DEBUG</string>
//! </resources>"#)?;
//!
//! let keys: Vec<_> = document.eligible(true).map(|e| e.key()).collect();
//! assert_eq!(keys, vec!["app_name"]);
//! ```

use quick_xml::Reader;
use quick_xml::escape::{partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while reading resource documents
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The document is not well-formed markup
    #[error("malformed resource document at byte {position}: {message}")]
    Parse { position: usize, message: String },

    /// The document has no root element
    #[error("resource document has no root element")]
    EmptyDocument,

    /// The document could not be read from disk
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ResourceResult<T> = Result<T, ResourceError>;

fn parse_error(position: usize, message: impl Into<String>) -> ResourceError {
    ResourceError::Parse {
        position,
        message: message.into(),
    }
}

/// One entry of a resource document
///
/// `raw` is the exact source text of the element, from its opening `<` to the
/// end of its closing tag. `segments` are byte ranges inside `raw` holding the
/// text that gets translated: the element's content for a `<string>`, or the
/// content of each direct `<item>` child for `<plurals>` and `<string-array>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    key: String,
    tag: String,
    raw: String,
    translatable: bool,
    segments: Vec<Range<usize>>,
}

impl ResourceEntry {
    /// The `name` attribute, or the tag name when the element has none
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Exact source text of the element
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// False only when the element carries `translatable="false"`
    pub fn is_translatable(&self) -> bool {
        self.translatable
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether the entry is sent for translation under the given skip mode
    pub fn is_eligible(&self, skip_non_translatable: bool) -> bool {
        !skip_non_translatable || self.translatable
    }

    /// The text of every translatable segment, in document order
    ///
    /// Plain-text segments are returned with XML entities decoded. Segments
    /// holding inline markup (`<b>`, `<xliff:g>`, CDATA) are returned verbatim
    /// so the backend sees, and can preserve, the markup.
    pub fn segment_texts(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|range| decode_segment(&self.raw[range.clone()]))
            .collect()
    }

    /// Whether `translated` can replace segment `index`
    ///
    /// A segment holding inline markup accepts only a reply whose tags are
    /// balanced and whose entities are well-formed; anything else would leave
    /// an unparsable file behind.
    pub fn accepts_translation(&self, index: usize, translated: &str) -> bool {
        self.segments
            .get(index)
            .is_some_and(|range| encode_segment(&self.raw[range.clone()], translated).is_some())
    }

    /// Build a copy of this entry with its segments replaced
    ///
    /// `translations[i]` replaces segment `i`; segments without a
    /// corresponding translation, or whose translation is rejected by
    /// [`accepts_translation`](Self::accepts_translation), keep their original
    /// text. Everything outside the segments (tags, attributes, whitespace) is
    /// copied unchanged.
    pub fn with_translations(&self, translations: &[String]) -> ResourceEntry {
        let mut raw = String::with_capacity(self.raw.len());
        let mut segments = Vec::with_capacity(self.segments.len());
        let mut cursor = 0;

        for (index, range) in self.segments.iter().enumerate() {
            raw.push_str(&self.raw[cursor..range.start]);
            let original = &self.raw[range.clone()];
            let start = raw.len();
            let encoded = translations
                .get(index)
                .and_then(|translated| encode_segment(original, translated));
            match encoded {
                Some(encoded) => raw.push_str(&encoded),
                None => raw.push_str(original),
            }
            segments.push(start..raw.len());
            cursor = range.end;
        }
        raw.push_str(&self.raw[cursor..]);

        ResourceEntry {
            key: self.key.clone(),
            tag: self.tag.clone(),
            raw,
            translatable: self.translatable,
            segments,
        }
    }
}

fn has_markup(raw: &str) -> bool {
    raw.contains('<')
}

fn decode_segment(raw: &str) -> String {
    if has_markup(raw) {
        return raw.to_string();
    }
    match unescape(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Encode a translation for splicing into the document
///
/// Returns `None` when a markup segment's translation is not well-formed.
fn encode_segment(original: &str, translated: &str) -> Option<String> {
    if decode_segment(original) == translated {
        return Some(original.to_string());
    }
    if has_markup(original) {
        if !is_well_formed_fragment(translated) {
            return None;
        }
        return Some(escape_markup_text(translated));
    }
    Some(escape_quotes(&partial_escape(translated)))
}

/// Whether `text` parses as element content with every tag closed
fn is_well_formed_fragment(text: &str) -> bool {
    let wrapped = format!("<fragment>{}</fragment>", text);
    let mut reader = Reader::from_str(&wrapped);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            Ok(Event::Text(text)) => {
                if text.unescape().is_err() {
                    return false;
                }
            }
            Ok(Event::Eof) => return depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Escape quotes in the text runs of a markup segment
///
/// Tags, comments and CDATA sections are copied as they are, so attribute
/// quoting survives.
fn escape_markup_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        escaped.push_str(&escape_quotes(&rest[..open]));
        let markup = &rest[open..];
        let close = if markup.starts_with("<![CDATA[") {
            markup.find("]]>").map(|end| end + 3)
        } else if markup.starts_with("<!--") {
            markup.find("-->").map(|end| end + 3)
        } else {
            markup.find('>').map(|end| end + 1)
        };
        let end = close.unwrap_or(markup.len());
        escaped.push_str(&markup[..end]);
        rest = &markup[end..];
    }
    escaped.push_str(&escape_quotes(rest));
    escaped
}

/// Android treats a bare `'` as an error and drops a bare `"`; escape the
/// ones a backend returned unescaped.
fn escape_quotes(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut backslashes = 0usize;
    for c in text.chars() {
        if (c == '\'' || c == '"') && backslashes % 2 == 0 {
            escaped.push('\\');
        }
        if c == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
        escaped.push(c);
    }
    escaped
}

fn is_translatable_text(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && !trimmed.starts_with('@') && !trimmed.starts_with('?')
}

/// Entry being assembled while its element is open
struct PendingEntry {
    key: String,
    tag: String,
    translatable: bool,
    start: usize,
    content_start: usize,
    items: Vec<Range<usize>>,
    item_start: Option<usize>,
}

impl PendingEntry {
    fn open(element: &BytesStart<'_>, start: usize, content_start: usize) -> ResourceResult<Self> {
        let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut key = None;
        let mut translatable = true;

        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| parse_error(start, e.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| parse_error(start, e.to_string()))?;
            match attribute.key.as_ref() {
                b"name" => key = Some(value.into_owned()),
                b"translatable" => translatable = value.as_ref() != "false",
                _ => {}
            }
        }

        Ok(Self {
            key: key.unwrap_or_else(|| tag.clone()),
            tag,
            translatable,
            start,
            content_start,
            items: Vec::new(),
            item_start: None,
        })
    }

    fn finish(self, source: &str, end: usize, content_end: Option<usize>) -> ResourceEntry {
        let raw = source[self.start..end].to_string();
        let base = self.start;
        let relative = |range: Range<usize>| (range.start - base)..(range.end - base);

        let mut segments: Vec<Range<usize>> = if !self.items.is_empty() {
            self.items.into_iter().map(relative).collect()
        } else if let Some(content_end) = content_end {
            vec![relative(self.content_start..content_end)]
        } else {
            Vec::new()
        };
        segments.retain(|range| is_translatable_text(&raw[range.clone()]));

        ResourceEntry {
            key: self.key,
            tag: self.tag,
            raw,
            translatable: self.translatable,
            segments,
        }
    }
}

/// A parsed resource document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDocument {
    root_name: String,
    root_tag: String,
    entries: Vec<ResourceEntry>,
}

impl Default for ResourceDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl ResourceDocument {
    /// A `<resources>` document with no entries
    pub fn empty() -> Self {
        Self {
            root_name: "resources".to_string(),
            root_tag: "<resources>".to_string(),
            entries: Vec::new(),
        }
    }

    /// Parse a resource document
    ///
    /// # Returns
    ///
    /// * `Ok(ResourceDocument)` - Every direct child element of the root, in
    ///   document order
    /// * `Err(ResourceError::Parse)` - The markup is not well-formed
    /// * `Err(ResourceError::EmptyDocument)` - There is no root element
    pub fn parse(source: &str) -> ResourceResult<Self> {
        let mut reader = Reader::from_str(source);
        let mut depth = 0usize;
        let mut root: Option<(String, String)> = None;
        let mut pending: Option<PendingEntry> = None;
        let mut entries = Vec::new();

        loop {
            let before = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| parse_error(before, e.to_string()))?;
            let after = reader.buffer_position();

            match event {
                Event::Start(element) => {
                    match depth {
                        0 => {
                            if root.is_some() {
                                return Err(parse_error(before, "multiple root elements"));
                            }
                            root = Some(root_of(&element, &source[before..after]));
                        }
                        1 => pending = Some(PendingEntry::open(&element, before, after)?),
                        2 => {
                            if let Some(entry) = pending.as_mut() {
                                if element.name().as_ref() == b"item" {
                                    entry.item_start = Some(after);
                                }
                            }
                        }
                        _ => {}
                    }
                    depth += 1;
                }
                Event::Empty(element) => match depth {
                    0 => {
                        if root.is_some() {
                            return Err(parse_error(before, "multiple root elements"));
                        }
                        let tag = &source[before..after];
                        let open = format!("{}>", tag.trim_end_matches("/>").trim_end());
                        root = Some(root_of(&element, &open));
                    }
                    1 => {
                        let entry = PendingEntry::open(&element, before, after)?;
                        entries.push(entry.finish(source, after, None));
                    }
                    _ => {}
                },
                Event::End(_) => {
                    if depth == 0 {
                        return Err(parse_error(before, "closing tag without an open element"));
                    }
                    depth -= 1;
                    match depth {
                        1 => {
                            if let Some(entry) = pending.take() {
                                entries.push(entry.finish(source, after, Some(before)));
                            }
                        }
                        2 => {
                            if let Some(entry) = pending.as_mut() {
                                if let Some(start) = entry.item_start.take() {
                                    entry.items.push(start..before);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth > 0 {
            return Err(parse_error(source.len(), "unexpected end of document"));
        }
        let (root_name, root_tag) = root.ok_or(ResourceError::EmptyDocument)?;

        warn_duplicate_keys(&entries);
        debug!(root = %root_name, entries = entries.len(), "parsed resource document");

        Ok(Self {
            root_name,
            root_tag,
            entries,
        })
    }

    /// Parse a document, treating a missing root element as zero entries
    pub fn parse_or_empty(source: &str) -> ResourceResult<Self> {
        match Self::parse(source) {
            Err(ResourceError::EmptyDocument) => Ok(Self::empty()),
            other => other,
        }
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_or_empty(&source)
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ResourceEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sent for translation, lazily and in document order
    ///
    /// With skip mode disabled every entry is eligible. With it enabled,
    /// entries marked `translatable="false"` are left out. The iterator can be
    /// cloned or recreated; each pass yields the same sequence.
    pub fn eligible(
        &self,
        skip_non_translatable: bool,
    ) -> impl Iterator<Item = &ResourceEntry> + Clone + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.is_eligible(skip_non_translatable))
    }

    /// Serialize entries under this document's root element
    ///
    /// The output holds an XML declaration, the root's original opening tag,
    /// one entry's raw text per line and the closing tag.
    pub fn render<'a>(&self, entries: impl IntoIterator<Item = &'a ResourceEntry>) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str(&self.root_tag);
        out.push('\n');
        for entry in entries {
            out.push_str("    ");
            out.push_str(entry.raw());
            out.push('\n');
        }
        out.push_str("</");
        out.push_str(&self.root_name);
        out.push_str(">\n");
        out
    }
}

fn root_of(element: &BytesStart<'_>, open_tag: &str) -> (String, String) {
    (
        String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        open_tag.to_string(),
    )
}

fn warn_duplicate_keys(entries: &[ResourceEntry]) {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.key()) {
            warn!(key = entry.key(), "duplicate resource key, first occurrence wins on merge");
        }
    }
}

/// Extract the entries eligible for translation from a document
///
/// A document without a root element yields no entries.
pub fn extract(source: &str, skip_non_translatable: bool) -> ResourceResult<Vec<ResourceEntry>> {
    let document = ResourceDocument::parse_or_empty(source)?;
    Ok(document.eligible(skip_non_translatable).cloned().collect())
}
