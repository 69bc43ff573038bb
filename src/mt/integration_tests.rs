//! End-to-End Integration Tests for the Translation Pipeline
//!
//! These tests run complete translate-and-merge passes against scratch
//! resource directories. Backends answer through in-process transports, so
//! no API keys or network access are needed.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --lib mt::integration_tests -- --nocapture
//! ```

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::lang::{Lang, Languages};
    use crate::resource::ResourceDocument;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const STRINGS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">Notes</string>
    <string name="debug_label" translatable="false">DEBUG</string>
    <string name="save">Save</string>
</resources>
"#;

    fn lang(code: &str) -> Lang {
        Languages::find(code).unwrap()
    }

    /// Write `contents` as `res/values/strings.xml` and return its path
    fn write_source(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("res").join("values").join("strings.xml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn res_dir(dir: &TempDir) -> PathBuf {
        dir.path().join("res")
    }

    fn output(dir: &TempDir, values: &str) -> String {
        fs::read_to_string(res_dir(dir).join(values).join("strings.xml")).unwrap()
    }

    fn keys(contents: &str) -> Vec<String> {
        ResourceDocument::parse(contents)
            .unwrap()
            .entries()
            .iter()
            .map(|entry| entry.key().to_string())
            .collect()
    }

    fn fast_options() -> RunOptions {
        RunOptions {
            request_timeout: Duration::from_millis(300),
            retry_backoff: Duration::from_millis(1),
            ..RunOptions::default()
        }
    }

    fn mock_dispatcher(
        mode: MockMode,
        transport: Arc<dyn HttpTransport>,
        options: RunOptions,
    ) -> Dispatcher {
        Dispatcher::new(
            Arc::new(MockTranslator::new(mode)),
            transport,
            BackendSettings::default(),
            options,
        )
    }

    async fn run_single(
        dispatcher: &Dispatcher,
        source: &Path,
        dir: &TempDir,
        to: &str,
    ) -> Result<MergeReport, DispatchError> {
        let mut results = dispatcher
            .translate_file(
                source,
                &res_dir(dir),
                Languages::ENGLISH,
                &[lang(to)],
                &CancelFlag::new(),
            )
            .await
            .unwrap();
        results.remove(0)
    }

    /// Transport that answers shorter texts later and records peak concurrency
    struct LatencyTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl LatencyTransport {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for LatencyTransport {
        async fn send(&self, request: HttpRequest) -> MtResult<HttpResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let wait = 60u64.saturating_sub(request.body.len() as u64);
            tokio::time::sleep(Duration::from_millis(wait)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(HttpResponse::ok(request.body_text()))
        }
    }

    // ============================================================================
    // TEST 1: Echo backend with skip mode writes only translatable entries
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_echo_backend_skip_mode() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            r#"<resources>
    <string name="app_name">Notes</string>
    <string name="debug_label" translatable="false">DEBUG</string>
</resources>"#,
        );
        let options = RunOptions {
            skip_non_translatable: true,
            ..fast_options()
        };
        let dispatcher =
            mock_dispatcher(MockMode::Echo, Arc::new(MockTransport::loopback()), options);

        let report = run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        assert_eq!(
            output(&dir, "values-es"),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    <string name=\"app_name\">Notes</string>\n</resources>\n"
        );
        assert_eq!(report.translated, 1);
        assert_eq!(report.failed_segments, 0);
        assert_eq!(report.destination, res_dir(&dir).join("values-es").join("strings.xml"));
    }

    // ============================================================================
    // TEST 2: Skip mode disabled translates every entry
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_skip_disabled_translates_all() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let dispatcher = mock_dispatcher(
            MockMode::Suffix,
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );

        run_single(&dispatcher, &source, &dir, "fr").await.unwrap();

        let written = output(&dir, "values-fr");
        assert_eq!(keys(&written), vec!["app_name", "debug_label", "save"]);
        assert!(written.contains(r#"<string name="app_name">Notes_fr</string>"#));
        assert!(written.contains(r#"<string name="debug_label" translatable="false">DEBUG_fr</string>"#));
    }

    // ============================================================================
    // TEST 3: Keeping non-translatable entries copies them through unchanged
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_keep_non_translatable() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let options = RunOptions {
            skip_non_translatable: true,
            keep_non_translatable: true,
            ..fast_options()
        };
        let dispatcher =
            mock_dispatcher(MockMode::Suffix, Arc::new(MockTransport::loopback()), options);

        let report = run_single(&dispatcher, &source, &dir, "de").await.unwrap();

        let written = output(&dir, "values-de");
        assert_eq!(keys(&written), vec!["app_name", "debug_label", "save"]);
        assert!(written.contains(r#"<string name="debug_label" translatable="false">DEBUG</string>"#));
        assert_eq!(report.translated, 2);
        assert_eq!(report.carried, 1);
    }

    // ============================================================================
    // TEST 4: A permanently broken backend behaves like a copy
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_broken_backend_is_noop_copy() {
        let dir = TempDir::new().unwrap();
        let source_text = r#"<resources>
    <string name="terms">Terms &amp; "conditions"</string>
    <string name="quote">Don\'t panic</string>
    <plurals name="notes">
        <item quantity="one">%d note</item>
        <item quantity="other">%d notes</item>
    </plurals>
</resources>"#;
        let source = write_source(&dir, source_text);
        let dispatcher = mock_dispatcher(
            MockMode::Malformed,
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );

        let report = run_single(&dispatcher, &source, &dir, "it").await.unwrap();

        let original = ResourceDocument::parse(source_text).unwrap();
        let written = ResourceDocument::parse(&output(&dir, "values-it")).unwrap();
        assert_eq!(written.entries(), original.entries());
        assert_eq!(report.failed_segments, 0);
    }

    #[tokio::test]
    async fn test_e2e_failing_transport_is_noop_copy() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let options = RunOptions {
            max_retries: 0,
            ..fast_options()
        };
        let dispatcher = mock_dispatcher(
            MockMode::Suffix,
            Arc::new(MockTransport::failing(MtError::Network("unreachable".to_string()))),
            options,
        );

        let report = run_single(&dispatcher, &source, &dir, "nl").await.unwrap();

        let original = ResourceDocument::parse(STRINGS).unwrap();
        let written = ResourceDocument::parse(&output(&dir, "values-nl")).unwrap();
        assert_eq!(written.entries(), original.entries());
        assert_eq!(report.failed_segments, 3);
    }

    // ============================================================================
    // TEST 5: Partial failures keep source text only for the failed entries
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_partial_failure() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let transport = Arc::new(MockTransport::loopback().with_script([
            MockReply::Loopback,
            MockReply::Respond(HttpResponse {
                status: 400,
                body: "bad request".to_string(),
            }),
        ]));
        let options = RunOptions {
            max_concurrency: 1,
            ..fast_options()
        };
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport, options);

        let report = run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        let written = output(&dir, "values-es");
        assert!(written.contains(r#"<string name="app_name">Notes_es</string>"#));
        assert!(written.contains(r#"<string name="debug_label" translatable="false">DEBUG</string>"#));
        assert!(written.contains(r#"<string name="save">Save_es</string>"#));
        assert_eq!(report.failed_segments, 1);
    }

    // ============================================================================
    // TEST 6: Merge preserves existing translations unless overwriting
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_merge_preserves_existing() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let destination = res_dir(&dir).join("values-es").join("strings.xml");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(
            &destination,
            r#"<resources><string name="app_name">Notas</string><string name="legacy">Viejo</string></resources>"#,
        )
        .unwrap();

        let options = RunOptions {
            skip_non_translatable: true,
            ..fast_options()
        };
        let transport = Arc::new(MockTransport::loopback());
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport.clone(), options);

        let report = run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        let written = output(&dir, "values-es");
        assert_eq!(keys(&written), vec!["app_name", "legacy", "save"]);
        assert!(written.contains(r#"<string name="app_name">Notas</string>"#));
        assert!(written.contains(r#"<string name="save">Save_es</string>"#));
        assert_eq!(report.preserved, 2);
        assert_eq!(report.appended, 1);
        // Only "save" was missing from the destination
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_e2e_overwrite_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let destination = res_dir(&dir).join("values-es").join("strings.xml");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(
            &destination,
            r#"<resources><string name="legacy">Viejo</string><string name="app_name">Notas</string></resources>"#,
        )
        .unwrap();

        let options = RunOptions {
            overwrite_existing: true,
            skip_non_translatable: true,
            ..fast_options()
        };
        let dispatcher =
            mock_dispatcher(MockMode::Suffix, Arc::new(MockTransport::loopback()), options);

        let report = run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        let written = output(&dir, "values-es");
        assert_eq!(keys(&written), vec!["app_name", "save"]);
        assert!(written.contains(r#"<string name="app_name">Notes_es</string>"#));
        assert_eq!(report.preserved, 0);
    }

    #[tokio::test]
    async fn test_e2e_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let dispatcher = mock_dispatcher(
            MockMode::Suffix,
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );

        run_single(&dispatcher, &source, &dir, "fr").await.unwrap();
        let first = output(&dir, "values-fr");
        let report = run_single(&dispatcher, &source, &dir, "fr").await.unwrap();

        assert_eq!(output(&dir, "values-fr"), first);
        assert_eq!(report.translated, 0);
        assert_eq!(report.appended, 0);
    }

    #[tokio::test]
    async fn test_e2e_malformed_destination_aborts() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let destination = res_dir(&dir).join("values-es").join("strings.xml");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "<resources><string name=\"a\">x</resources>").unwrap();

        let dispatcher = mock_dispatcher(
            MockMode::Suffix,
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );
        let result = run_single(&dispatcher, &source, &dir, "es").await;

        assert!(matches!(result, Err(DispatchError::Parse { path, .. }) if path == destination));
        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            "<resources><string name=\"a\">x</resources>"
        );
    }

    // ============================================================================
    // TEST 7: Output order follows the source regardless of completion order
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_source_order_and_bounded_concurrency() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            r#"<resources>
    <string name="a">A much longer first string</string>
    <string name="b">Mid string</string>
    <string name="c">C</string>
    <string-array name="d">
        <item>First item</item>
        <item>Second</item>
    </string-array>
</resources>"#,
        );
        let transport = Arc::new(LatencyTransport::new());
        let options = RunOptions {
            max_concurrency: 2,
            ..fast_options()
        };
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport.clone(), options);

        run_single(&dispatcher, &source, &dir, "fr").await.unwrap();

        let written = output(&dir, "values-fr");
        assert_eq!(keys(&written), vec!["a", "b", "c", "d"]);
        let document = ResourceDocument::parse(&written).unwrap();
        assert_eq!(
            document.entries()[3].segment_texts(),
            vec!["First item_fr", "Second_fr"]
        );
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    // ============================================================================
    // TEST 8: Cancellation and timeouts
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_cancelled_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let transport = Arc::new(MockTransport::loopback().with_delay(Duration::from_millis(100)));
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport, fast_options());
        let cancel = CancelFlag::new();

        let trigger = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            }
        };
        let resources = res_dir(&dir);
        let targets = [lang("es")];
        let run = dispatcher.translate_file(
            &source,
            &resources,
            Languages::ENGLISH,
            &targets,
            &cancel,
        );
        let (results, ()) = tokio::join!(run, trigger);

        let results = results.unwrap();
        assert!(matches!(&results[0], Err(DispatchError::Cancelled { language }) if language == "es"));
        assert!(!res_dir(&dir).join("values-es").exists());
    }

    #[tokio::test]
    async fn test_e2e_timeout_falls_back_to_source() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, r#"<resources><string name="a">Slow</string></resources>"#);
        let transport = Arc::new(MockTransport::loopback().with_delay(Duration::from_millis(200)));
        let options = RunOptions {
            request_timeout: Duration::from_millis(20),
            max_retries: 1,
            ..fast_options()
        };
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport.clone(), options);

        let report = run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        assert!(output(&dir, "values-es").contains(r#"<string name="a">Slow</string>"#));
        assert_eq!(report.failed_segments, 1);
        assert_eq!(transport.calls(), 2);
    }

    // ============================================================================
    // TEST 9: Validation happens before any request is sent
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_missing_credential() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let transport = Arc::new(MockTransport::loopback());
        let dispatcher = Dispatcher::from_registry(
            &TranslatorRegistry::with_defaults(),
            "ChatGPT",
            transport.clone(),
            BackendSettings::default(),
            fast_options(),
        )
        .unwrap();

        let result = run_single(&dispatcher, &source, &dir, "es").await;

        assert!(matches!(
            result,
            Err(DispatchError::Config { source: MtError::MissingCredential { .. }, .. })
        ));
        assert_eq!(transport.calls(), 0);
        assert!(!res_dir(&dir).join("values-es").exists());
    }

    #[tokio::test]
    async fn test_e2e_unsupported_language() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let transport = Arc::new(MockTransport::loopback());
        let dispatcher = Dispatcher::new(
            Arc::new(DeepLTranslator::new()),
            transport.clone(),
            BackendSettings::with_app_key("key:fx"),
            fast_options(),
        );

        let result = run_single(&dispatcher, &source, &dir, "sw").await;

        assert!(matches!(
            result,
            Err(DispatchError::Config { source: MtError::UnsupportedLanguage { .. }, .. })
        ));
        assert_eq!(transport.calls(), 0);
    }

    // ============================================================================
    // TEST 10: Multiple target languages
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_multiple_languages() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let mut mappings = HashMap::new();
        mappings.insert(("Save".to_string(), "pt-BR".to_string()), "Salvar".to_string());
        let dispatcher = mock_dispatcher(
            MockMode::Mappings(mappings),
            Arc::new(MockTransport::loopback()),
            RunOptions {
                skip_non_translatable: true,
                ..fast_options()
            },
        );

        let results = dispatcher
            .translate_file(
                &source,
                &res_dir(&dir),
                Languages::AUTO,
                &[lang("pt-BR"), lang("fr")],
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
        assert!(output(&dir, "values-pt-rBR").contains(r#"<string name="save">Salvar</string>"#));
        assert!(output(&dir, "values-fr").contains(r#"<string name="save">Save_fr</string>"#));
    }

    #[tokio::test]
    async fn test_e2e_duplicate_targets_rejected() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        let transport = Arc::new(MockTransport::loopback());
        let dispatcher = mock_dispatcher(MockMode::Suffix, transport.clone(), fast_options());

        let result = dispatcher
            .translate_file(
                &source,
                &res_dir(&dir),
                Languages::ENGLISH,
                &[lang("fr"), lang("fr")],
                &CancelFlag::new(),
            )
            .await;

        assert!(matches!(result, Err(DispatchError::DuplicateTarget(code)) if code == "fr"));
        assert_eq!(transport.calls(), 0);
    }

    // ============================================================================
    // TEST 11: Write failures leave no partial output
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_write_failure() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, STRINGS);
        // A plain file where the values directory should be
        fs::write(res_dir(&dir).join("values-es"), "not a directory").unwrap();

        let dispatcher = mock_dispatcher(
            MockMode::Suffix,
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );
        let result = run_single(&dispatcher, &source, &dir, "es").await;

        assert!(matches!(result, Err(DispatchError::Write { .. })));
        assert_eq!(
            fs::read_to_string(res_dir(&dir).join("values-es")).unwrap(),
            "not a directory"
        );
    }

    // ============================================================================
    // TEST 12: Request shaping reaches the transport intact
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_chatgpt_request_shape() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, r#"<resources><string name="ok">OK</string></resources>"#);
        let transport = Arc::new(MockTransport::new(MockReply::Respond(HttpResponse::ok(
            r#"{"choices":[{"message":{"role":"assistant","content":"Aceptar"}}]}"#,
        ))));
        let dispatcher = Dispatcher::from_registry(
            &TranslatorRegistry::with_defaults(),
            "ChatGPT",
            transport.clone(),
            BackendSettings::with_app_key("sk-test"),
            fast_options(),
        )
        .unwrap();

        run_single(&dispatcher, &source, &dir, "es").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("Authorization"), Some("Bearer sk-test"));
        assert!(requests[0].body_text().contains("Text to translate: OK"));
        assert!(output(&dir, "values-es").contains(r#"<string name="ok">Aceptar</string>"#));
    }

    // ============================================================================
    // TEST 13: Replies that break inline markup keep the source segment
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_unbalanced_markup_reply_keeps_source() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            r#"<resources>
    <string name="welcome">Hello <b>%1$s</b>!</string>
    <string name="save">Save</string>
</resources>"#,
        );
        let mut mappings = HashMap::new();
        mappings.insert(
            ("Hello <b>%1$s</b>!".to_string(), "fr".to_string()),
            "Bonjour <b>%1$s!".to_string(),
        );
        mappings.insert(("Save".to_string(), "fr".to_string()), "Enregistrer".to_string());
        let dispatcher = mock_dispatcher(
            MockMode::Mappings(mappings),
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );

        let report = run_single(&dispatcher, &source, &dir, "fr").await.unwrap();

        let written = output(&dir, "values-fr");
        let document = ResourceDocument::parse(&written).unwrap();
        assert_eq!(document.entries()[0].segment_texts(), vec!["Hello <b>%1$s</b>!"]);
        assert_eq!(document.entries()[1].segment_texts(), vec!["Enregistrer"]);
        assert_eq!(report.failed_segments, 1);

        // The written file stays readable as a merge destination
        let rerun = run_single(&dispatcher, &source, &dir, "fr").await.unwrap();
        assert_eq!(rerun.preserved, 2);
        assert_eq!(rerun.appended, 0);
    }

    #[tokio::test]
    async fn test_e2e_markup_reply_quotes_escaped() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            r#"<resources><string name="here">It is <i>here</i></string></resources>"#,
        );
        let mut mappings = HashMap::new();
        mappings.insert(
            ("It is <i>here</i>".to_string(), "fr".to_string()),
            "C'est <i>ici</i>".to_string(),
        );
        let dispatcher = mock_dispatcher(
            MockMode::Mappings(mappings),
            Arc::new(MockTransport::loopback()),
            fast_options(),
        );

        let report = run_single(&dispatcher, &source, &dir, "fr").await.unwrap();

        assert!(output(&dir, "values-fr").contains(r#"<string name="here">C\'est <i>ici</i></string>"#));
        assert_eq!(report.failed_segments, 0);
    }
}
