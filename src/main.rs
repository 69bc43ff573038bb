use clap::{Arg, ArgAction, Command, value_parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use values_mt::config::Settings;
use values_mt::lang::Languages;
use values_mt::mt::{
    CancelFlag, Dispatcher, HttpTransport, MockMode, MockTransport, MockTranslator,
    ReqwestTransport, TranslatorRegistry,
};
use values_mt::values::{is_value_file, resource_dir_of};

fn cli() -> Command {
    Command::new("values-mt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Machine translation for Android string resources")
        .arg(
            Arg::new("source")
                .help("Source values file (e.g. app/src/main/res/values/strings.xml)")
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("to")
                .long("to")
                .short('t')
                .help("Target language codes, comma separated (e.g. es,pt-BR)")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("from")
                .long("from")
                .short('f')
                .help("Source language code (default: auto)"),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .short('b')
                .help("Translation backend key (default: ChatGPT)"),
        )
        .arg(Arg::new("model").long("model").help("Model name for model-based backends"))
        .arg(Arg::new("app-id").long("app-id").help("Backend app id"))
        .arg(Arg::new("app-key").long("app-key").help("Backend app key"))
        .arg(
            Arg::new("res-dir")
                .long("res-dir")
                .help("Resource directory holding the values-* folders (default: source's grandparent)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Replace existing translations instead of merging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-non-translatable")
                .long("skip-non-translatable")
                .help("Do not translate entries marked translatable=\"false\"")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep-non-translatable")
                .long("keep-non-translatable")
                .help("Copy skipped entries into the output unchanged")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .short('j')
                .help("Maximum requests in flight per language")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Per-request timeout in seconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML settings file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use mock translator instead of a real backend")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-backends")
                .long("list-backends")
                .help("List available translation backends and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-languages")
                .long("list-languages")
                .help("List supported language codes and exit")
                .action(ArgAction::SetTrue),
        )
}

fn list_backends(registry: &TranslatorRegistry) {
    for descriptor in registry.descriptors() {
        let mut needs = Vec::new();
        if descriptor.requires_app_id {
            needs.push(descriptor.app_id_label.as_str());
        }
        if descriptor.requires_app_key {
            needs.push(descriptor.app_key_label.as_str());
        }
        println!(
            "{:<10} {:<18} {} languages, needs: {}",
            descriptor.key,
            descriptor.display_name,
            descriptor.supported_languages.len(),
            if needs.is_empty() { "nothing".to_string() } else { needs.join(", ") }
        );
    }
}

fn list_languages() {
    for lang in Languages::all() {
        println!(
            "{:<8} {:<16} {:<24} {}",
            lang.code,
            lang.values_directory_name(),
            lang.english_name,
            lang.local_name
        );
    }
}

/// Layer command line flags over file and environment settings
fn apply_cli(settings: &mut Settings, matches: &clap::ArgMatches) {
    if let Some(backend) = matches.get_one::<String>("backend") {
        settings.backend = backend.clone();
    }
    if let Some(from) = matches.get_one::<String>("from") {
        settings.source_language = from.clone();
    }
    if let Some(targets) = matches.get_many::<String>("to") {
        settings.target_languages = targets
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
    }
    if let Some(model) = matches.get_one::<String>("model") {
        settings.credentials_mut().model = Some(model.clone());
    }
    if let Some(app_id) = matches.get_one::<String>("app-id") {
        settings.credentials_mut().app_id = Some(app_id.clone());
    }
    if let Some(app_key) = matches.get_one::<String>("app-key") {
        settings.credentials_mut().app_key = Some(app_key.clone());
    }
    if matches.get_flag("overwrite") {
        settings.overwrite_existing = true;
    }
    if matches.get_flag("skip-non-translatable") {
        settings.skip_non_translatable = true;
    }
    if matches.get_flag("keep-non-translatable") {
        settings.keep_non_translatable = true;
    }
    if let Some(concurrency) = matches.get_one::<usize>("concurrency") {
        settings.max_concurrency = *concurrency;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        settings.request_timeout_secs = *timeout;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let mut registry = TranslatorRegistry::with_defaults();
    let use_mock = matches.get_flag("mock");
    if use_mock {
        registry.register(Arc::new(MockTranslator::new(MockMode::Suffix)))?;
    }

    if matches.get_flag("list-backends") {
        list_backends(&registry);
        return Ok(());
    }
    if matches.get_flag("list-languages") {
        list_languages();
        return Ok(());
    }

    let source = matches
        .get_one::<PathBuf>("source")
        .ok_or("missing source values file (see --help)")?;

    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env();
    apply_cli(&mut settings, &matches);
    if use_mock {
        settings.backend = "Mock".to_string();
    }
    settings.validate()?;

    let from = settings.source_lang()?;
    let targets = settings.target_langs()?;
    if targets.is_empty() {
        return Err("no target languages given (use --to or target_languages)".into());
    }

    if !is_value_file(source) {
        warn!(path = %source.display(), "source does not look like a file in a values directory");
    }
    let resource_dir: &Path = match matches.get_one::<PathBuf>("res-dir") {
        Some(dir) => dir,
        None => resource_dir_of(source).ok_or("cannot infer resource directory, use --res-dir")?,
    };

    let options = settings.run_options();
    let transport: Arc<dyn HttpTransport> = if use_mock {
        Arc::new(MockTransport::loopback())
    } else {
        Arc::new(ReqwestTransport::new(options.request_timeout)?)
    };
    let dispatcher = Dispatcher::from_registry(
        &registry,
        &settings.backend,
        transport,
        settings.backend_settings(),
        options,
    )?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling translation runs");
                cancel.cancel();
            }
        });
    }

    info!(
        backend = dispatcher.backend_key(),
        source = %source.display(),
        targets = targets.len(),
        "translating"
    );
    let results = dispatcher
        .translate_file(source, resource_dir, from, &targets, &cancel)
        .await?;

    let mut failures = 0;
    for (lang, result) in targets.iter().zip(results) {
        match result {
            Ok(report) => println!(
                "✅ {:<8} {} ({} translated, {} failed, {} kept, {} added)",
                lang.code,
                report.destination.display(),
                report.translated,
                report.failed_segments,
                report.preserved,
                report.appended
            ),
            Err(e) => {
                failures += 1;
                eprintln!("❌ {:<8} {}", lang.code, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} languages failed", failures, targets.len()).into());
    }
    Ok(())
}
