use ar7_adapters::keys::{self, KEY_TEST_RESULTS_FILE, KEY_TEST_TIMEOUT};
use ar7_adapters::{AdapterError, PandocRenderer, ProviderRegistry};
use ar7_core::evaluation::{
    sample_chapters, FACT_CHECK_DEFAULT_CHAPTERS, FACT_CHECK_SUMMARY_FILE,
    QUALITY_DEFAULT_CHAPTERS,
};
use ar7_core::prompts::DEFAULT_TEST_CHAPTERS;
use ar7_core::report::{load_verdicts, write_reports, ReportOptions};
use ar7_core::store::{FACT_CHECK_DIR_NAME, PDF_DIR_NAME};
use ar7_core::{
    ArtifactStore, ChapterSelection, Config, ConfigError, ConfigStore, CredentialError,
    Credentials, CrossModelRunner, DocumentRenderer, EvaluationError, EvaluationRunner, Evaluator,
    FactCheckSummary, GenerationError, LanguageModel, LogLevel, LogRecord, LogSink,
    ModelRegistry, ModelRegistryError, ModelSpec, PromptError, PromptStore, PromptStoreError,
    RenderError, RubricRegistry, StdoutLogSink, StoreError, Tier,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    let sink = StdoutLogSink::new();

    match cli.command {
        Command::CheckEnv => run_check_env(&cli.env_file, &sink),
        Command::Models(args) => run_models(&cli.config, args),
        Command::TestKeys(args) => run_test_keys(&cli.config, &cli.env_file, args, &sink),
        Command::Generate(args) => run_generate(&cli.config, &cli.env_file, args, &sink),
        Command::Books(args) => run_books(&cli.config, args, &sink),
        Command::Pdf(args) => run_pdf(&cli.config, args, &sink),
        Command::FactCheck(args) => run_fact_check(&cli.config, &cli.env_file, args, &sink),
        Command::Quality(args) => run_quality(&cli.config, &cli.env_file, args, &sink),
        Command::Report(args) => run_report(&cli.config, args, &sink),
    }
}

fn run_check_env(env_file: &Path, sink: &dyn LogSink) -> Result<(), CliError> {
    let credentials = Credentials::load(env_file)?;
    let report = credentials.report();
    match &report.source {
        Some(path) => info(sink, format!("credentials read from {}", path.display())),
        None => info(
            sink,
            format!("{} not found, using process environment", env_file.display()),
        ),
    }
    for key in &report.loaded {
        info(sink, format!("✓ {key}"));
    }
    for key in &report.missing {
        sink.log(LogRecord::new(LogLevel::Warn, format!("✗ {key} (missing)")));
    }
    info(
        sink,
        format!(
            "{} of {} provider keys loaded",
            report.loaded.len(),
            report.loaded.len() + report.missing.len()
        ),
    );
    Ok(())
}

fn run_models(config_path: &Path, args: ModelsArgs) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let tier = args.tier.unwrap_or(config.generation.tier);
    let registry = ModelRegistry::ar7_defaults(tier);

    println!("AR7 models ({} tier)", tier.label());
    for spec in registry.iter() {
        println!(
            "  {:<18} {:<55} {} [{}]",
            spec.id, spec.name, spec.provider, spec.nation
        );
    }
    Ok(())
}

fn run_test_keys(
    config_path: &Path,
    env_file: &Path,
    args: TestKeysArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let tier = args.tier.unwrap_or(config.generation.tier);
    let specs = select_models(tier, args.models.as_deref())?;
    let provider = ProviderRegistry::from_config(&config, Credentials::load(env_file)?)
        .with_timeout(KEY_TEST_TIMEOUT);

    info(
        sink,
        format!("testing {} model(s) ({} tier)", specs.len(), tier.label()),
    );
    let report = keys::test_models(&provider, &specs, sink, &Utc::now().to_rfc3339());

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.generation.output_dir.clone());
    let store = ArtifactStore::open(output_dir)?;
    let results_file = store.write_json(KEY_TEST_RESULTS_FILE, &report)?;
    info(
        sink,
        format!(
            "{}/{} keys working, results in {}",
            report.passed,
            report.total,
            results_file.display()
        ),
    );

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::Failures(format!(
            "{} of {} model(s) failed the key test",
            report.failed, report.total
        )))
    }
}

fn run_generate(
    config_path: &Path,
    env_file: &Path,
    args: GenerateArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let settings = &config.generation;
    let tier = args.tier.unwrap_or(settings.tier);
    let specs = select_models(tier, args.models.as_deref())?;

    let prompts_path = args
        .prompts
        .clone()
        .unwrap_or_else(|| settings.prompts_file.clone());
    let prompts = PromptStore::from_path(&prompts_path)?;
    for key in prompts.missing_keys() {
        sink.log(LogRecord::new(
            LogLevel::Warn,
            format!("`{key}` is listed in prompt_keys but has no prompt"),
        ));
    }

    let selection = if let Some(list) = args.chapters.as_deref() {
        ChapterSelection::parse_list(list)
    } else if args.all_chapters {
        ChapterSelection::All
    } else {
        ChapterSelection::TestChapters(args.test_chapters.unwrap_or(DEFAULT_TEST_CHAPTERS.len()))
    };
    let chapter_keys = prompts.resolve_chapters(&selection);

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());
    let store = ArtifactStore::open(&output_dir)?;
    let delay = Duration::from_secs(
        args.delay_secs
            .or(settings.inter_call_delay_secs)
            .unwrap_or_else(|| tier.default_delay_secs()),
    );

    info(
        sink,
        format!(
            "generating {} chapter(s) with {} model(s) ({} tier) into {}",
            chapter_keys.len(),
            specs.len(),
            tier.label(),
            output_dir.display()
        ),
    );

    let provider = ProviderRegistry::from_config(&config, Credentials::load(env_file)?);
    let renderer = PandocRenderer::from_settings(&config.render);
    let render_pdf = args.pdf || settings.render_pdf;
    let runner = CrossModelRunner::new(&store, sink)
        .with_delay(delay)
        .with_overwrite(args.overwrite || settings.overwrite)
        .with_books(!args.no_books && settings.compile_books);
    let outcome = runner.run_all(
        &provider,
        &specs,
        &prompts,
        &chapter_keys,
        render_pdf.then_some(&renderer as &dyn DocumentRenderer),
    )?;

    for summary in &outcome.summaries {
        info(
            sink,
            format!(
                "{:<18} {}/{} chapters, {} words, {:.1}s",
                summary.model_id,
                summary.successful,
                summary.total_chapters,
                summary.total_words,
                summary.total_time
            ),
        );
    }
    for (book, reason) in &outcome.publication.render_failures {
        sink.log(LogRecord::new(
            LogLevel::Warn,
            format!("no PDF for {}: {reason}", book.display()),
        ));
    }
    if let Some(path) = &outcome.summary_file {
        info(sink, format!("run summary: {}", path.display()));
    }

    if outcome.had_failures() {
        let failed: usize = outcome.summaries.iter().map(|s| s.failed).sum();
        Err(CliError::Failures(format!(
            "{failed} chapter(s) failed to generate"
        )))
    } else {
        Ok(())
    }
}

fn run_books(config_path: &Path, args: BooksArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.generation.output_dir.clone());
    let store = open_existing(&output_dir)?;
    let tier = args.tier.unwrap_or(config.generation.tier);

    let order: Option<Vec<String>> = match args.chapters.as_deref() {
        Some(list) => Some(parse_list(Some(list))),
        None => PromptStore::from_path(&config.generation.prompts_file)
            .ok()
            .map(|prompts| prompts.chapter_keys().to_vec()),
    };

    let renderer = PandocRenderer::from_settings(&config.render);
    let renderer = args.pdf.then_some(&renderer as &dyn DocumentRenderer);
    let runner = CrossModelRunner::new(&store, sink);
    let generated_at = Utc::now().to_rfc3339();

    let mut books = 0usize;
    let mut pdfs = 0usize;
    for model_id in store.list_models()? {
        let chapter_keys = match &order {
            Some(keys) => keys.clone(),
            None => store.list_chapters(&model_id)?,
        };
        let publication =
            runner.publish(&[model_id], tier, &chapter_keys, renderer, &generated_at)?;
        books += publication.books.len();
        pdfs += publication.pdfs.len();
    }

    info(sink, format!("{books} book(s) compiled, {pdfs} PDF(s) rendered"));
    Ok(())
}

fn run_pdf(config_path: &Path, args: PdfArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let inputs = collect_markdown(&args.input)?;
    if inputs.is_empty() {
        return Err(CliError::NoInputs(args.input));
    }
    let pdf_dir = args.pdf_dir.unwrap_or_else(|| {
        if args.input.is_dir() {
            args.input.join(PDF_DIR_NAME)
        } else {
            args.input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(PDF_DIR_NAME)
        }
    });

    let renderer = PandocRenderer::from_settings(&config.render);
    let version = renderer.check_available()?;
    info(sink, format!("using {version}"));

    let mut failed = 0usize;
    for markdown in &inputs {
        match renderer.render(markdown, &pdf_dir) {
            Ok(pdf) => info(sink, format!("✓ {}", pdf.display())),
            Err(err) => {
                failed += 1;
                sink.log(LogRecord::new(
                    LogLevel::Error,
                    format!("✗ {}: {err}", markdown.display()),
                ));
            }
        }
    }

    info(
        sink,
        format!(
            "{}/{} PDF(s) written to {}",
            inputs.len() - failed,
            inputs.len(),
            pdf_dir.display()
        ),
    );
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Failures(format!("{failed} PDF(s) failed to render")))
    }
}

fn run_fact_check(
    config_path: &Path,
    env_file: &Path,
    args: EvaluateArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.generation.output_dir.clone());
    let store = open_existing(&output_dir)?;
    let model_ids = evaluation_models(&store, args.models.as_deref())?;
    let chapter_keys = evaluation_chapters(
        args.chapters.as_deref(),
        FACT_CHECK_DEFAULT_CHAPTERS,
        args.samples,
    );

    let settings = &config.evaluation;
    let evaluator_name = args
        .evaluator
        .clone()
        .unwrap_or_else(|| settings.evaluator_model.clone());
    let model = evaluator_model(&config, env_file, &evaluator_name)?;
    let rubrics = RubricRegistry::with_directories(&settings.rubric_directories)?;
    let evaluator = Evaluator::new(model.as_ref(), evaluator_name.as_str(), &rubrics, settings);

    info(
        sink,
        format!(
            "fact-checking {} model(s) x {} chapter(s) with {evaluator_name}",
            model_ids.len(),
            chapter_keys.len()
        ),
    );
    let run = EvaluationRunner::new(&store, &evaluator, sink).fact_check(&model_ids, &chapter_keys)?;
    info(sink, format!("summary: {}", run.summary_file.display()));
    info(sink, format!("report: {}", run.report_file.display()));

    match run.failed_units() {
        0 => Ok(()),
        failed => Err(CliError::Failures(format!(
            "{failed} fact-check(s) could not be parsed or failed"
        ))),
    }
}

fn run_quality(
    config_path: &Path,
    env_file: &Path,
    args: QualityArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let output_dir = args
        .common
        .output_dir
        .clone()
        .unwrap_or_else(|| config.generation.output_dir.clone());
    let store = open_existing(&output_dir)?;
    let model_ids = evaluation_models(&store, args.common.models.as_deref())?;
    let chapter_keys = evaluation_chapters(
        args.common.chapters.as_deref(),
        QUALITY_DEFAULT_CHAPTERS,
        args.common.samples,
    );

    let fact_check: Option<FactCheckSummary> = match &args.fact_check_results {
        Some(path) => Some(read_json_file(path)?),
        None => store.read_json(Path::new(FACT_CHECK_DIR_NAME).join(FACT_CHECK_SUMMARY_FILE))?,
    };
    if fact_check.is_none() {
        info(sink, "no fact-check results found, scoring without them");
    }

    let settings = &config.evaluation;
    let evaluator_name = args
        .common
        .evaluator
        .clone()
        .unwrap_or_else(|| settings.evaluator_model.clone());
    let model = evaluator_model(&config, env_file, &evaluator_name)?;
    let rubrics = RubricRegistry::with_directories(&settings.rubric_directories)?;
    let evaluator = Evaluator::new(model.as_ref(), evaluator_name.as_str(), &rubrics, settings);

    info(
        sink,
        format!(
            "scoring {} model(s) x {} chapter(s) with {evaluator_name}",
            model_ids.len(),
            chapter_keys.len()
        ),
    );
    let run = EvaluationRunner::new(&store, &evaluator, sink).quality(
        &model_ids,
        &chapter_keys,
        fact_check.as_ref(),
    )?;
    info(sink, format!("scores: {}", run.scores_file.display()));
    info(sink, format!("report: {}", run.report_file.display()));

    match run.failed_units() {
        0 => Ok(()),
        failed => Err(CliError::Failures(format!(
            "{failed} quality score(s) could not be parsed or failed"
        ))),
    }
}

fn run_report(config_path: &Path, args: ReportArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.generation.output_dir.clone());
    let store = open_existing(&output_dir)?;
    let summaries = store.read_summaries()?;
    if summaries.is_empty() {
        return Err(CliError::NoSummaries(output_dir));
    }
    let verdicts = load_verdicts(&store)?;

    let options = ReportOptions {
        generated_at: Utc::now().to_rfc3339(),
        min_words: args.min_words.unwrap_or(config.report.min_words),
        output_root: store.root().to_path_buf(),
    };
    let files = write_reports(&store, &summaries, &verdicts, &options)?;

    info(
        sink,
        format!(
            "{}/{} model(s) passed the {}-word threshold",
            files.comparison.successful_models, files.comparison.total_models, options.min_words
        ),
    );
    for path in [&files.report, &files.results, &files.index] {
        info(sink, format!("wrote {}", path.display()));
    }
    Ok(())
}

fn info(sink: &dyn LogSink, message: impl Into<String>) {
    sink.log(LogRecord::new(LogLevel::Info, message.into()));
}

fn load_config(path: &Path) -> Result<Config, CliError> {
    Ok(ConfigStore::open(path.to_path_buf())?.into_config())
}

fn select_models(tier: Tier, list: Option<&str>) -> Result<Vec<ModelSpec>, CliError> {
    let registry = ModelRegistry::ar7_defaults(tier);
    let ids = parse_list(list);
    if ids.is_empty() {
        return Ok(registry.as_slice().to_vec());
    }
    Ok(registry.select(&ids)?.as_slice().to_vec())
}

fn parse_list(list: Option<&str>) -> Vec<String> {
    list.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn open_existing(dir: &Path) -> Result<ArtifactStore, CliError> {
    ArtifactStore::existing(dir).ok_or_else(|| CliError::MissingOutputDir(dir.to_path_buf()))
}

fn evaluation_models(store: &ArtifactStore, list: Option<&str>) -> Result<Vec<String>, CliError> {
    let ids = parse_list(list);
    if ids.is_empty() {
        Ok(store.list_models()?)
    } else {
        Ok(ids)
    }
}

fn evaluation_chapters(list: Option<&str>, defaults: &[&str], samples: Option<usize>) -> Vec<String> {
    let explicit = parse_list(list);
    if explicit.is_empty() {
        sample_chapters(defaults, samples.unwrap_or(defaults.len()))
    } else {
        explicit
    }
}

fn evaluator_model(
    config: &Config,
    env_file: &Path,
    name: &str,
) -> Result<Box<dyn LanguageModel>, CliError> {
    let provider = ProviderRegistry::from_config(config, Credentials::load(env_file)?)
        .with_timeout(config.evaluation.request_timeout());
    Ok(provider.build(name)?)
}

/// Book files directly in `input` or one level below it, or `input` itself.
fn collect_markdown(input: &Path) -> Result<Vec<PathBuf>, CliError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut found = Vec::new();
    let mut dirs = vec![input.to_path_buf()];
    dirs.extend(read_dir_paths(input)?.into_iter().filter(|p| p.is_dir()));
    for dir in dirs {
        for path in read_dir_paths(&dir)? {
            let is_book = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("AR7_") && name.ends_with(".md"));
            if is_book && path.is_file() {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn read_dir_paths(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let entries = fs::read_dir(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CliError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let data = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("{0}")]
    Registry(#[from] ModelRegistryError),
    #[error("prompt store error: {0}")]
    Prompts(#[from] PromptStoreError),
    #[error("rubric error: {0}")]
    Rubric(#[from] PromptError),
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("failed to read `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse `{path}`: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("output directory `{0}` does not exist")]
    MissingOutputDir(PathBuf),
    #[error("no generation summaries under `{0}`")]
    NoSummaries(PathBuf),
    #[error("no AR7 markdown books found at `{0}`")]
    NoInputs(PathBuf),
    #[error("{0}")]
    Failures(String),
}

#[derive(Parser)]
#[command(
    name = "ar7ctl",
    version,
    about = "Multi-model AR7 chapter generation, evaluation and reporting"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "ar7.json")]
    config: PathBuf,

    /// Path to the KEY=VALUE credential file
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report which provider keys are loaded
    CheckEnv,
    /// List the model registry
    Models(ModelsArgs),
    /// Send a one-sentence request to each model
    TestKeys(TestKeysArgs),
    /// Generate chapters with every selected model
    Generate(GenerateArgs),
    /// Compile books (and optionally PDFs) from existing chapters
    Books(BooksArgs),
    /// Render markdown books to PDF
    Pdf(PdfArgs),
    /// Fact-check stored chapters
    FactCheck(EvaluateArgs),
    /// Score stored chapters on the quality rubric
    Quality(QualityArgs),
    /// Write the comparison report and master index
    Report(ReportArgs),
}

#[derive(Args)]
struct ModelsArgs {
    /// lite or full; defaults to the configured tier
    #[arg(long)]
    tier: Option<Tier>,
}

#[derive(Args)]
struct TestKeysArgs {
    #[arg(long)]
    tier: Option<Tier>,
    /// Comma-separated model ids; all models when omitted
    #[arg(long, value_name = "IDS")]
    models: Option<String>,
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long)]
    tier: Option<Tier>,
    /// Comma-separated model ids; all models when omitted
    #[arg(long, value_name = "IDS")]
    models: Option<String>,
    /// Comma-separated chapter keys
    #[arg(long, value_name = "KEYS", conflicts_with_all = ["test_chapters", "all_chapters"])]
    chapters: Option<String>,
    /// Use the first N default test chapters
    #[arg(long, value_name = "N", conflicts_with = "all_chapters")]
    test_chapters: Option<usize>,
    /// Generate every chapter in the prompt file
    #[arg(long)]
    all_chapters: bool,
    /// Prompt file; defaults to the configured one
    #[arg(long, value_name = "FILE")]
    prompts: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Replace chapters that already exist
    #[arg(long)]
    overwrite: bool,
    /// Skip book compilation
    #[arg(long)]
    no_books: bool,
    /// Render compiled books to PDF
    #[arg(long)]
    pdf: bool,
    /// Pause between chapters; defaults to the tier's delay
    #[arg(long, value_name = "SECS")]
    delay_secs: Option<u64>,
}

#[derive(Args)]
struct BooksArgs {
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    tier: Option<Tier>,
    /// Comma-separated chapter keys in book order
    #[arg(long, value_name = "KEYS")]
    chapters: Option<String>,
    #[arg(long)]
    pdf: bool,
}

#[derive(Args)]
struct PdfArgs {
    /// A markdown book or a directory holding books
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    #[arg(long, value_name = "DIR")]
    pdf_dir: Option<PathBuf>,
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Comma-separated model ids; every model directory when omitted
    #[arg(long, value_name = "IDS")]
    models: Option<String>,
    /// Comma-separated chapter keys
    #[arg(long, value_name = "KEYS")]
    chapters: Option<String>,
    /// How many default chapters to sample
    #[arg(long, value_name = "N")]
    samples: Option<usize>,
    /// Provider-qualified evaluator model
    #[arg(long, value_name = "MODEL")]
    evaluator: Option<String>,
}

#[derive(Args)]
struct QualityArgs {
    #[command(flatten)]
    common: EvaluateArgs,
    /// Fact-check summary JSON to feed into the rubric
    #[arg(long, value_name = "FILE")]
    fact_check_results: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Minimum average words per chapter for a model to pass
    #[arg(long, value_name = "N")]
    min_words: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::parse_from([
            "ar7ctl",
            "--config",
            "custom.json",
            "generate",
            "--tier",
            "full",
            "--models",
            "qwen, mistral",
            "--test-chapters",
            "1",
            "--no-books",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.json"));
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.tier, Some(Tier::Full));
        assert_eq!(parse_list(args.models.as_deref()), vec!["qwen", "mistral"]);
        assert_eq!(args.test_chapters, Some(1));
        assert!(args.no_books);
        assert!(!args.pdf);
    }

    #[test]
    fn chapter_list_conflicts_with_all_chapters() {
        let result = Cli::try_parse_from([
            "ar7ctl",
            "generate",
            "--chapters",
            "intro",
            "--all-chapters",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn evaluation_chapters_sample_defaults() {
        assert_eq!(
            evaluation_chapters(None, FACT_CHECK_DEFAULT_CHAPTERS, Some(2)),
            vec!["summary_for_policymakers", "technical_summary"]
        );
        assert_eq!(
            evaluation_chapters(Some("chapter_7_africa"), QUALITY_DEFAULT_CHAPTERS, Some(1)),
            vec!["chapter_7_africa"]
        );
        assert_eq!(
            evaluation_chapters(None, QUALITY_DEFAULT_CHAPTERS, None).len(),
            QUALITY_DEFAULT_CHAPTERS.len()
        );
    }

    #[test]
    fn unknown_model_id_is_a_setup_error() {
        let err = select_models(Tier::Lite, Some("qwen,llama")).unwrap_err();
        assert!(matches!(err, CliError::Registry(_)));
        assert_eq!(select_models(Tier::Lite, None).unwrap().len(), 7);
    }

    #[test]
    fn collects_books_from_model_directories() {
        let temp = tempfile::tempdir().unwrap();
        let qwen = temp.path().join("qwen");
        fs::create_dir_all(&qwen).unwrap();
        fs::write(qwen.join("AR7_COMPLETE_BOOK_QWEN.md"), "# Book").unwrap();
        fs::write(qwen.join("intro.txt"), "text").unwrap();
        fs::write(temp.path().join("MASTER_INDEX.md"), "# Index").unwrap();

        let found = collect_markdown(temp.path()).unwrap();
        assert_eq!(found, vec![qwen.join("AR7_COMPLETE_BOOK_QWEN.md")]);
    }
}
