use anyhow::Context;
use clap::Parser;
use snipgen::{
    BatchDriver, Config, DesktopNotifier, Notice, Notifier, Pipeline, RunOutcome, SnippetLibrary,
    SuggestionClient, SystemClipboard, TerminalPrompter, load_batch, resolve_content, suggester_for,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "snipgen",
    version,
    author,
    about = "Create Alfred snippets with AI-suggested metadata",
    long_about = "Create Alfred snippet files from the clipboard, a text argument, or a batch file.\n\n\
    The content is sent to the Anthropic API, which suggests a collection, name and keyword. \
    Without an API key (or with --no-ai) the metadata is entered by hand.\n\n\
    USAGE EXAMPLES:\n  \
      # Use the clipboard\n  \
      snipgen\n\n  \
      # Use a text argument\n  \
      snipgen \"git log --oneline --graph --decorate -5\"\n\n  \
      # Process a batch file, replacing duplicates\n  \
      snipgen snippets.json --overwrite --report report.json\n\n  \
      # Check the setup\n  \
      snipgen --check"
)]
struct Cli {
    /// Snippet text, or a batch JSON file (reads the clipboard when omitted)
    #[arg(value_name = "TEXT|FILE")]
    input: Option<String>,

    /// Treat the input as a batch file
    #[arg(short, long, conflicts_with = "text")]
    batch: bool,

    /// Treat the input as snippet text, even if it names a file
    #[arg(short, long)]
    text: bool,

    /// Alfred snippets folder (collections root)
    #[arg(long, env = "ALFRED_SNIPPETS_PATH", value_name = "PATH")]
    snippets_path: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for suggestions
    #[arg(long, env = "SNIPGEN_MODEL")]
    model: Option<String>,

    /// Base URL of the Messages API
    #[arg(long, env = "SNIPGEN_API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "SNIPGEN_TIMEOUT_SECS", value_name = "SECS")]
    timeout: Option<u64>,

    /// Skip AI suggestions and enter metadata by hand
    #[arg(long)]
    no_ai: bool,

    /// Replace snippets with the same keyword without asking
    #[arg(long)]
    overwrite: bool,

    /// Create the snippets folder if it does not exist
    #[arg(long)]
    create_root: bool,

    /// Stop a batch at the first failed entry
    #[arg(long)]
    stop_on_error: bool,

    /// Write a JSON report of a batch run
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Validate the setup and exit
    #[arg(long)]
    check: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Tracing filter directive (overrides -v)
    #[arg(long, env = "SNIPGEN_LOG", value_name = "FILTER")]
    log_level: Option<String>,
}

#[derive(Debug)]
enum Mode {
    Clipboard,
    Text(String),
    Batch(PathBuf),
}

impl Cli {
    fn mode(&self) -> anyhow::Result<Mode> {
        match &self.input {
            None if self.batch => anyhow::bail!("--batch requires a batch file"),
            None => Ok(Mode::Clipboard),
            Some(input) if self.batch => Ok(Mode::Batch(PathBuf::from(input))),
            Some(input) if self.text => Ok(Mode::Text(input.clone())),
            Some(input) if is_batch_file(Path::new(input)) => {
                Ok(Mode::Batch(PathBuf::from(input)))
            }
            Some(input) => Ok(Mode::Text(input.clone())),
        }
    }

    fn config(&self) -> anyhow::Result<Config> {
        let mut builder = Config::builder()
            .use_ai(!self.no_ai)
            .overwrite(self.overwrite)
            .create_root(self.create_root)
            .stop_on_error(self.stop_on_error);

        if let Some(path) = &self.snippets_path {
            builder = builder.snippets_root(path);
        }
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(url) = &self.api_url {
            builder = builder.api_base_url(url);
        }
        if let Some(secs) = self.timeout {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        builder.build().context("Failed to build configuration")
    }
}

fn is_batch_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose, cli.log_level.as_deref())?;

    if cli.check {
        return run_check(&cli.config()?);
    }

    match cli.mode()? {
        Mode::Batch(path) => run_batch(&path, &cli.config()?, cli.report.as_deref()),
        Mode::Text(text) => run_single(&cli, Some(text.as_str())),
        Mode::Clipboard => run_single(&cli, None),
    }
}

/// One snippet, interactive, with a desktop notification for the outcome.
fn run_single(cli: &Cli, text: Option<&str>) -> anyhow::Result<ExitCode> {
    let notifier = DesktopNotifier;

    let result = create_single(cli, text);
    match &result {
        Ok(outcome) => notifier.notify(&outcome.notice()),
        Err(e) => notifier.notify(&Notice::failed(&format!("{e:#}"))),
    }

    let outcome = result?;
    outcome.print_summary();

    Ok(match outcome {
        RunOutcome::Created(_) => ExitCode::SUCCESS,
        RunOutcome::Cancelled(_) => ExitCode::FAILURE,
    })
}

fn create_single(cli: &Cli, text: Option<&str>) -> anyhow::Result<RunOutcome> {
    let config = cli.config()?;
    let content =
        resolve_content(text, &SystemClipboard).context("Failed to get snippet content")?;
    let suggester = suggester_for(&config).context("Failed to set up suggestions")?;

    Pipeline::new(&config, suggester.as_ref())
        .run(&content, &mut TerminalPrompter::new())
        .context("Snippet creation failed")
}

fn run_batch(path: &Path, config: &Config, report: Option<&Path>) -> anyhow::Result<ExitCode> {
    let entries = load_batch(path).context("Failed to load batch file")?;

    if !config.ai_enabled() {
        warn!("AI suggestions are off; entries without collection, name and keyword will fail");
    }
    let suggester = suggester_for(config).context("Failed to set up suggestions")?;

    info!("Processing {} entries from {}", entries.len(), path.display());
    let summary = BatchDriver::new(config, suggester.as_ref()).run(&entries);
    summary.print_summary();

    if let Some(report) = report {
        summary
            .write_report(report)
            .context("Failed to write batch report")?;
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Reports the folder and AI setup. Fails when the folder cannot be read or
/// the API rejects the connection check.
fn run_check(config: &Config) -> anyhow::Result<ExitCode> {
    let mut healthy = true;

    println!("Snippets folder: {}", config.snippets_root.display());
    let library = SnippetLibrary::new(&config.snippets_root);
    match library.collections().and_then(|collections| {
        library
            .snippet_count()
            .map(|snippets| (collections.len(), snippets))
    }) {
        Ok((collections, snippets)) => {
            println!("Collections:     {collections}");
            println!("Snippets:        {snippets}");
        }
        Err(e) => {
            healthy = false;
            println!("Folder:          unreadable ({e})");
        }
    }

    if config.ai_enabled() {
        println!("AI suggestions:  enabled ({})", config.model);
        let client = SuggestionClient::from_config(config).context("Failed to set up suggestions")?;
        match client.check_connection() {
            Ok(()) => println!("API connection:  ok"),
            Err(failure) => {
                healthy = false;
                println!("API connection:  failed ({failure})");
            }
        }
    } else if config.use_ai {
        println!("AI suggestions:  disabled (ANTHROPIC_API_KEY not set)");
    } else {
        println!("AI suggestions:  disabled (--no-ai)");
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn setup_tracing(verbosity: u8, directive: Option<&str>) -> anyhow::Result<()> {
    let filter = match directive {
        Some(directive) => {
            EnvFilter::try_new(directive).context("Invalid log filter directive")?
        }
        None => match verbosity {
            0 => EnvFilter::new("snipgen=info"),
            1 => EnvFilter::new("snipgen=debug"),
            _ => EnvFilter::new("snipgen=trace"),
        },
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
