use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use refverify_core::config_file::{self, ConfigFile};
use refverify_core::extractor::parse_citations;
use refverify_core::{
    CitationExtractor, CitationRecord, Config, CoreError, PlainTextSource, ProgressEvent,
    TextSource, Verifier,
};
use refverify_pdf_mupdf::{MupdfTextSource, PageMargins};

mod output;
mod resolve;

use output::ColorMode;
use resolve::{Overrides, resolve_config};

/// Citation verifier - check a paper's bibliography against Semantic Scholar and arXiv
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Debug logging for refverify crates (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, structure and verify the citations of a PDF or text file
    Check(CheckArgs),

    /// Show where configuration is read from and the effective settings
    Config {
        /// Write a starter config file to the platform config directory
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Path to the PDF (or already-extracted .txt) to check
    file_path: PathBuf,

    /// Where to write the JSON report
    #[arg(long, default_value = "citation_report.json")]
    out: PathBuf,

    /// Read citation records from this JSON file instead of calling the LLM
    #[arg(long)]
    citations: Option<PathBuf>,

    /// Drop text in the page header and footer bands during PDF extraction
    #[arg(long)]
    strip_margins: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Dry run: print the located reference section without any network calls
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check(args) => check(args).await,
        Command::Config { init } => show_config(init),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,refverify_core=debug,refverify_parsing=debug,refverify_pdf_mupdf=debug,refverify_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(overrides: &Overrides) -> anyhow::Result<Config> {
    resolve_config(
        &config_file::load_config(),
        |name| std::env::var(name).ok(),
        overrides,
    )
}

async fn check(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.overrides)?;
    tracing::debug!(?config, "resolved configuration");

    let color = ColorMode(!args.no_color);
    let mut stdout = std::io::stdout();

    if !args.file_path.exists() {
        anyhow::bail!("File not found: {}", args.file_path.display());
    }

    let file_name = args
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| args.file_path.display().to_string());

    if args.dry_run {
        let text = extract_text(&args.file_path, args.strip_margins)?;
        let block = refverify_parsing::locate(&text);
        output::print_dry_run(&mut stdout, &file_name, &block, color)?;
        return Ok(());
    }

    // Credential problems surface before any extraction work.
    let input = match &args.citations {
        Some(path) => CitationInput::File(path.clone()),
        None => CitationInput::Llm(CitationExtractor::new(&config.extractor)?),
    };

    let text = extract_text(&args.file_path, args.strip_margins)?;
    let block = refverify_parsing::locate(&text);
    output::print_extraction_summary(&mut stdout, &file_name, &block, color)?;

    let citations = match input {
        CitationInput::File(path) => read_citations(&path)?,
        CitationInput::Llm(extractor) => extractor.extract(&block.text).await?,
    };
    tracing::info!(count = citations.len(), "citations ready for verification");
    writeln!(stdout, "Found {} citations to check\n", citations.len())?;

    let verifier = Verifier::new(&config)?;
    let report = run_verification(&verifier, &citations, config.min_score, color).await?;

    output::print_unverified(&mut stdout, &report, color)?;
    output::print_summary(&mut stdout, &report, config.min_score, color)?;

    report
        .write_json(&args.out)
        .with_context(|| format!("failed to write report to {}", args.out.display()))?;
    writeln!(
        stdout,
        "Wrote report with {} references to {}",
        report.len(),
        args.out.display()
    )?;

    Ok(())
}

/// Where citation records come from.
enum CitationInput {
    File(PathBuf),
    Llm(CitationExtractor),
}

fn extract_text(path: &Path, strip_margins: bool) -> anyhow::Result<String> {
    let is_text = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);

    let text = if is_text {
        PlainTextSource.extract_text(path)?
    } else {
        let margins = if strip_margins {
            PageMargins::CONFERENCE
        } else {
            PageMargins::NONE
        };
        MupdfTextSource::new().with_margins(margins).extract_text(path)?
    };

    if text.trim().is_empty() {
        return Err(CoreError::EmptyText(path.display().to_string()).into());
    }
    Ok(text)
}

fn read_citations(path: &Path) -> anyhow::Result<Vec<CitationRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read citations from {}", path.display()))?;
    parse_citations(&content).with_context(|| format!("invalid citations file {}", path.display()))
}

async fn run_verification(
    verifier: &Verifier,
    citations: &[CitationRecord],
    min_score: f64,
    color: ColorMode,
) -> anyhow::Result<refverify_core::Report> {
    let bar = ProgressBar::new(citations.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green/dim}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let progress_bar = bar.clone();
    let progress = move |event: ProgressEvent| {
        if let ProgressEvent::Checking { title, .. } = &event {
            progress_bar.set_message(title.chars().take(40).collect::<String>());
        }
        if let Some(line) = output::progress_line(&event, color) {
            progress_bar.println(line);
            progress_bar.inc(1);
        }
    };

    let result = verifier
        .verify_with_progress(citations, min_score, progress, cancel)
        .await;
    bar.finish_and_clear();

    match result {
        Ok(report) => Ok(report),
        Err(CoreError::Cancelled) => anyhow::bail!("Cancelled; no report was written"),
        Err(e) => Err(e.into()),
    }
}

fn show_config(init: bool) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    if init {
        let path = config_file::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        if path.exists() {
            writeln!(stdout, "Config file already exists: {}", path.display())?;
        } else {
            let saved = config_file::save_config(&starter_config()).map_err(anyhow::Error::msg)?;
            writeln!(stdout, "Wrote starter config to {}\n", saved.display())?;
        }
    }

    let config = load_config(&Overrides::default())?;
    output::print_config(
        &mut stdout,
        config_file::config_path().as_deref(),
        Path::new(config_file::CWD_CONFIG_NAME),
        &config,
    )?;
    Ok(())
}

/// Defaults spelled out, keys left for the user to fill in.
fn starter_config() -> ConfigFile {
    use refverify_core::config_file::{LlmConfig, ScoringFileConfig, VerificationConfig};

    let defaults = Config::default();
    ConfigFile {
        api_keys: None,
        llm: Some(LlmConfig {
            model: Some(defaults.extractor.model.clone()),
            base_url: Some(defaults.extractor.base_url.clone()),
            timeout_secs: Some(defaults.extractor.timeout_secs),
        }),
        verification: Some(VerificationConfig {
            min_score: Some(defaults.min_score),
            num_workers: Some(defaults.num_workers),
            lookup_timeout_secs: Some(defaults.lookup_timeout_secs),
            disabled_sources: Some(vec![]),
        }),
        scoring: Some(ScoringFileConfig {
            title_weight: Some(defaults.scoring.weights.title),
            author_weight: Some(defaults.scoring.weights.author),
            author_overlap: Some(defaults.scoring.author_overlap),
        }),
    }
}
