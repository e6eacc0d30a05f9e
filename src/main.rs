use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wordswall::cli::commands;
use wordswall::config::{Config, ConfigLoader};

#[derive(Parser)]
#[command(name = "wordswall")]
#[command(
    version,
    about = "Asynchronous AI word-enrichment engine for the Words Wall vocabulary app"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Load configuration from a specific file")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add words to the wall; enrichment runs in the background
    Add {
        #[arg(required = true, help = "Words to add")]
        words: Vec<String>,
        #[arg(long, short, help = "Block until enrichment completes")]
        wait: bool,
    },

    /// Show a word's document and processing status
    Show {
        #[arg(help = "Word to show")]
        word: String,
    },

    /// Check the generation backend and queue
    Health,

    /// Show queue depth and in-flight state
    QueueStatus,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mWords Wall encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: Config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let app = commands::App::bootstrap(config)?;

        let result = match cli.command {
            Commands::Add { words, wait } => commands::add(&app, &words, wait).await,
            Commands::Show { word } => commands::show(&app, &word).await,
            Commands::Health => commands::health(&app).await,
            Commands::QueueStatus => commands::queue_status(&app),
        };

        app.shutdown().await;
        result
    })?;

    Ok(())
}
