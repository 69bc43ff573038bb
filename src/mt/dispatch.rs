//! Dispatch and merge engine
//!
//! A run translates one source document into one target language and writes
//! the result to that language's values file. Runs for different languages
//! are independent and can execute concurrently; they share only the
//! read-only source document, the backend and the transport.
//!
//! # Run lifecycle
//!
//! ```text
//! Idle -> Extracting -> Translating(i) [-> Failed(i)] ... -> Merging -> Done
//!                  \-> Aborted (validation, parse or write error)
//!                  \-> Cancelled (cancel flag raised)
//! ```
//!
//! `Translating(i)` is entered when the first request for planned entry `i`
//! gets a concurrency permit, and `Failed(i)` when one of its segments falls
//! back. Segments run concurrently, so these transitions are logged as they
//! happen rather than held in a single state value.
//!
//! Individual segment failures never abort a run: the segment keeps its
//! source text and the failure is logged and counted in the [`MergeReport`].
//! A reply that would break a markup segment counts as a failure too.

use crate::lang::Lang;
use crate::mt::error::{MtError, MtResult};
use crate::mt::http::{HttpRequest, HttpTransport};
use crate::mt::merge::{existing_keys, merge_entries};
use crate::mt::registry::TranslatorRegistry;
use crate::mt::translator::{BackendSettings, TranslationRequest, Translator};
use crate::resource::{ResourceDocument, ResourceEntry, ResourceError};
use crate::values::{value_file, write_atomic};
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Per-run behaviour switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Leave entries marked `translatable="false"` untranslated
    pub skip_non_translatable: bool,
    /// Replace the destination file instead of merging into it
    pub overwrite_existing: bool,
    /// Copy non-eligible entries into the output unchanged
    pub keep_non_translatable: bool,
    /// Maximum number of requests in flight for one run
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    /// Extra attempts for a request that failed with a retryable error
    pub max_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_non_translatable: false,
            overwrite_existing: false,
            keep_non_translatable: false,
            max_concurrency: 4,
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Shared cancellation signal
///
/// Clones observe the same flag. Once raised, runs stop issuing requests,
/// discard responses that arrive afterwards and write nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of a run; the index is the entry's position among the planned entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Translating(usize),
    Failed(usize),
    Merging,
    Done,
    Aborted,
    Cancelled,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Extracting => write!(f, "extracting"),
            RunState::Translating(i) => write!(f, "translating #{}", i),
            RunState::Failed(i) => write!(f, "failed #{}", i),
            RunState::Merging => write!(f, "merging"),
            RunState::Done => write!(f, "done"),
            RunState::Aborted => write!(f, "aborted"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub language: Lang,
    pub destination: PathBuf,
    /// Entries sent to the backend
    pub translated: usize,
    /// Segments that kept their source text because the backend call failed
    /// or its reply was not usable
    pub failed_segments: usize,
    /// Non-eligible entries copied through unchanged
    pub carried: usize,
    /// Destination entries kept as they were
    pub preserved: usize,
    /// Entries added to the destination
    pub appended: usize,
}

/// Run-level failures
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A source or destination document could not be read
    #[error("failed to read resource document '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ResourceError,
    },

    /// The backend cannot serve the run (language, credentials, registry)
    #[error("{backend} cannot translate into '{language}': {source}")]
    Config {
        backend: String,
        language: String,
        #[source]
        source: MtError,
    },

    /// The output file could not be written; nothing was changed on disk
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled; nothing was written
    #[error("translation into '{language}' was cancelled")]
    Cancelled { language: String },

    /// The same target language was requested twice for one file
    #[error("target language '{0}' requested more than once")]
    DuplicateTarget(String),
}

/// One translate-and-write operation
#[derive(Debug, Clone)]
pub struct RunJob<'a> {
    pub source: &'a ResourceDocument,
    pub from: Lang,
    pub to: Lang,
    pub destination: PathBuf,
}

enum Planned<'a> {
    Translate(&'a ResourceEntry),
    Carry(&'a ResourceEntry),
}

impl<'a> Planned<'a> {
    fn entry(&self) -> &'a ResourceEntry {
        match self {
            Planned::Translate(entry) | Planned::Carry(entry) => entry,
        }
    }
}

/// Outcome of translating one segment
enum SegmentOutcome {
    Translated(String),
    Fallback,
    Cancelled,
}

fn advance(state: &mut RunState, next: RunState, language: &str) {
    debug!(language, from = %state, to = %next, "run state changed");
    *state = next;
}

fn enter_segment_state(next: RunState, language: &str) {
    debug!(language, to = %next, "run state changed");
}

/// Runs translations through one backend and transport
#[derive(Clone)]
pub struct Dispatcher {
    translator: Arc<dyn Translator>,
    transport: Arc<dyn HttpTransport>,
    settings: BackendSettings,
    options: RunOptions,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backend", &self.translator.key())
            .field("settings", &self.settings)
            .field("options", &self.options)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        translator: Arc<dyn Translator>,
        transport: Arc<dyn HttpTransport>,
        settings: BackendSettings,
        options: RunOptions,
    ) -> Self {
        Self {
            translator,
            transport,
            settings,
            options,
        }
    }

    /// Build a dispatcher for the backend registered under `key`
    pub fn from_registry(
        registry: &TranslatorRegistry,
        key: &str,
        transport: Arc<dyn HttpTransport>,
        settings: BackendSettings,
        options: RunOptions,
    ) -> MtResult<Self> {
        let translator = registry.get(key)?;
        Ok(Self::new(translator, transport, settings, options))
    }

    pub fn backend_key(&self) -> &str {
        self.translator.key()
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Translate `job.source` into `job.to` and write the merged result
    ///
    /// # Returns
    ///
    /// * `Ok(MergeReport)` - The destination was written
    /// * `Err(DispatchError)` - Nothing was written; see the variant for why
    pub async fn translate_and_merge(
        &self,
        job: &RunJob<'_>,
        cancel: &CancelFlag,
    ) -> Result<MergeReport, DispatchError> {
        let mut state = RunState::Idle;
        let result = self.run(job, cancel, &mut state).await;
        match &result {
            Ok(report) => info!(
                language = job.to.code,
                backend = self.backend_key(),
                destination = %report.destination.display(),
                translated = report.translated,
                failed = report.failed_segments,
                preserved = report.preserved,
                appended = report.appended,
                "translation run finished"
            ),
            Err(DispatchError::Cancelled { .. }) => {
                advance(&mut state, RunState::Cancelled, job.to.code);
                info!(language = job.to.code, "translation run cancelled");
            }
            Err(e) => {
                advance(&mut state, RunState::Aborted, job.to.code);
                error!(language = job.to.code, error = %e, "translation run aborted");
            }
        }
        result
    }

    async fn run(
        &self,
        job: &RunJob<'_>,
        cancel: &CancelFlag,
        state: &mut RunState,
    ) -> Result<MergeReport, DispatchError> {
        let language = job.to.code;
        advance(state, RunState::Extracting, language);

        self.translator
            .validate(&job.to, &self.settings)
            .map_err(|source| DispatchError::Config {
                backend: self.backend_key().to_string(),
                language: language.to_string(),
                source,
            })?;

        let existing = if !self.options.overwrite_existing && job.destination.exists() {
            let document =
                ResourceDocument::load(&job.destination).map_err(|source| DispatchError::Parse {
                    path: job.destination.clone(),
                    source,
                })?;
            Some(document)
        } else {
            None
        };
        let existing_entries = existing.as_ref().map_or(&[][..], |d| d.entries());
        let known = existing_keys(existing_entries);

        let planned = self.plan(job.source, &known);
        let texts: Vec<Vec<String>> = planned
            .iter()
            .map(|plan| match plan {
                Planned::Translate(entry) => entry.segment_texts(),
                Planned::Carry(_) => Vec::new(),
            })
            .collect();

        let semaphore = Semaphore::new(self.options.max_concurrency.max(1));
        let started: Vec<AtomicBool> = texts.iter().map(|_| AtomicBool::new(false)).collect();
        let requests = texts.iter().enumerate().flat_map(|(entry, segments)| {
            segments.iter().map(move |text| (entry, text))
        });
        let outcomes = join_all(requests.map(|(entry, text)| {
            let request = TranslationRequest::new(job.from, job.to, text);
            let semaphore = &semaphore;
            let started = &started[entry];
            async move {
                let outcome = self
                    .translate_segment(entry, request, semaphore, started, cancel)
                    .await;
                (entry, outcome)
            }
        }))
        .await;

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled {
                language: language.to_string(),
            });
        }

        let mut translations: Vec<Vec<String>> = texts.iter().map(|_| Vec::new()).collect();
        let mut failed_entries = HashSet::new();
        let mut failed_segments = 0;
        for (entry, outcome) in outcomes {
            let segment = translations[entry].len();
            let text = match outcome {
                SegmentOutcome::Translated(text)
                    if planned[entry].entry().accepts_translation(segment, &text) =>
                {
                    text
                }
                SegmentOutcome::Translated(text) => {
                    warn!(
                        backend = self.backend_key(),
                        language,
                        key = planned[entry].entry().key(),
                        reply = %text,
                        "translation breaks the segment's markup, keeping source text"
                    );
                    if failed_entries.insert(entry) {
                        enter_segment_state(RunState::Failed(entry), language);
                    }
                    failed_segments += 1;
                    texts[entry][segment].clone()
                }
                SegmentOutcome::Fallback => {
                    failed_entries.insert(entry);
                    failed_segments += 1;
                    texts[entry][segment].clone()
                }
                SegmentOutcome::Cancelled => {
                    return Err(DispatchError::Cancelled {
                        language: language.to_string(),
                    });
                }
            };
            translations[entry].push(text);
        }

        let mut produced = Vec::with_capacity(planned.len());
        let mut translated = 0;
        let mut carried = 0;
        for (index, plan) in planned.iter().enumerate() {
            match plan {
                Planned::Translate(entry) => {
                    produced.push(entry.with_translations(&translations[index]));
                    translated += 1;
                }
                Planned::Carry(entry) => {
                    produced.push((*entry).clone());
                    carried += 1;
                }
            }
        }

        advance(state, RunState::Merging, language);
        let outcome = merge_entries(existing_entries, produced, self.options.overwrite_existing);
        let template = existing.as_ref().unwrap_or(job.source);
        let contents = template.render(&outcome.entries);

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled {
                language: language.to_string(),
            });
        }
        write_atomic(&job.destination, &contents).map_err(|source| {
            error!(path = %job.destination.display(), error = %source, "failed to write values file");
            DispatchError::Write {
                path: job.destination.clone(),
                source,
            }
        })?;

        advance(state, RunState::Done, language);
        Ok(MergeReport {
            language: job.to,
            destination: job.destination.clone(),
            translated,
            failed_segments,
            carried,
            preserved: outcome.preserved,
            appended: outcome.appended,
        })
    }

    /// Decide what happens to each source entry, in source order
    fn plan<'a>(&self, source: &'a ResourceDocument, known: &HashSet<&str>) -> Vec<Planned<'a>> {
        let skip = self.options.skip_non_translatable;
        source
            .entries()
            .iter()
            .filter_map(|entry| {
                if !entry.is_eligible(skip) {
                    return self
                        .options
                        .keep_non_translatable
                        .then_some(Planned::Carry(entry));
                }
                if !self.options.overwrite_existing && known.contains(entry.key()) {
                    debug!(key = entry.key(), "already translated, keeping destination entry");
                    return None;
                }
                Some(Planned::Translate(entry))
            })
            .collect()
    }

    async fn translate_segment(
        &self,
        entry: usize,
        request: TranslationRequest<'_>,
        semaphore: &Semaphore,
        started: &AtomicBool,
        cancel: &CancelFlag,
    ) -> SegmentOutcome {
        let Ok(_permit) = semaphore.acquire().await else {
            return SegmentOutcome::Cancelled;
        };
        if !started.swap(true, Ordering::Relaxed) {
            enter_segment_state(RunState::Translating(entry), request.to.code);
        }
        match self.request_translation(&request, cancel).await {
            Ok(text) => SegmentOutcome::Translated(text),
            Err(MtError::Cancelled) => SegmentOutcome::Cancelled,
            Err(e) => {
                warn!(
                    backend = self.backend_key(),
                    language = request.to.code,
                    text = request.text,
                    error = %e,
                    "translation failed, keeping source text"
                );
                enter_segment_state(RunState::Failed(entry), request.to.code);
                SegmentOutcome::Fallback
            }
        }
    }

    /// Send one segment, retrying retryable failures with linear backoff
    async fn request_translation(
        &self,
        request: &TranslationRequest<'_>,
        cancel: &CancelFlag,
    ) -> MtResult<String> {
        let http_request = self.translator.build_request(request, &self.settings)?;
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(MtError::Cancelled);
            }
            match self.send(http_request.clone()).await {
                Ok(body) => {
                    if cancel.is_cancelled() {
                        return Err(MtError::Cancelled);
                    }
                    return Ok(self.translator.parse_result(request, &body));
                }
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "retrying translation request");
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt under the per-request timeout; non-2xx counts as failure
    async fn send(&self, request: HttpRequest) -> MtResult<String> {
        let limit = self.options.request_timeout;
        let response = timeout(limit, self.transport.send(request))
            .await
            .map_err(|_| MtError::Timeout(limit))??;
        if !response.is_success() {
            return Err(MtError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    /// Translate a values file into several languages concurrently
    ///
    /// Each target gets its own run writing to
    /// `<resource_dir>/values-<lang>/<source file name>`. Results are returned
    /// in the order of `targets`.
    ///
    /// # Returns
    ///
    /// * `Ok(results)` - One result per target language
    /// * `Err(DispatchError)` - The source could not be read, or a target was
    ///   listed twice; no run was started
    pub async fn translate_file(
        &self,
        source_path: &Path,
        resource_dir: &Path,
        from: Lang,
        targets: &[Lang],
        cancel: &CancelFlag,
    ) -> Result<Vec<Result<MergeReport, DispatchError>>, DispatchError> {
        let mut seen = HashSet::new();
        for target in targets {
            if !seen.insert(target.code) {
                return Err(DispatchError::DuplicateTarget(target.code.to_string()));
            }
        }

        let source = ResourceDocument::load(source_path).map_err(|source| DispatchError::Parse {
            path: source_path.to_path_buf(),
            source,
        })?;
        let file_name = source_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("strings.xml");

        debug!(
            source = %source_path.display(),
            entries = source.len(),
            targets = targets.len(),
            "starting translation runs"
        );

        let jobs: Vec<RunJob<'_>> = targets
            .iter()
            .map(|to| RunJob {
                source: &source,
                from,
                to: *to,
                destination: value_file(resource_dir, to, file_name),
            })
            .collect();

        Ok(join_all(jobs.iter().map(|job| self.translate_and_merge(job, cancel))).await)
    }
}
