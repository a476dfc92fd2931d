use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetflow::cli::CommandContext;
use assetflow::cli::commands::{self, generate::GenerateOptions};
use assetflow::cli::ui::Output;
use assetflow::types::GenerationMode;

#[derive(Parser)]
#[command(name = "assetflow")]
#[command(
    version,
    about = "Upload item photos and generate studio images and listing copy"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load this file instead of the layered configuration
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize assetflow in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Upload files into the ledger and print committed references
    Upload {
        #[arg(required = true, help = "Files to upload")]
        files: Vec<PathBuf>,
        #[arg(long, help = "Retry failed uploads once before finishing")]
        retry_failed: bool,
    },

    /// Generate studio images and/or listing copy for an item
    Generate {
        #[arg(long, short, help = "Item identifier")]
        target: String,
        #[arg(long = "source", short, help = "Source image reference (repeatable)")]
        sources: Vec<String>,
        #[arg(long, short, default_value = "both", help = "What to produce: images, listing, both")]
        mode: GenerationMode,
        #[arg(long = "fact", help = "Known fact as key=value (repeatable)")]
        facts: Vec<String>,
        #[arg(long, help = "Budget in milliseconds (capped by the endpoint ceiling)")]
        budget_ms: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
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
        eprintln!("\x1b[31massetflow encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<bool> {
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
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = Output::new(cli.quiet);

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force, &output)?;
        }
        Commands::Upload {
            files,
            retry_failed,
        } => {
            let ctx = CommandContext::load(cli.config.as_deref())?;
            let rt = Runtime::new()?;
            return Ok(rt.block_on(commands::upload::run(
                &ctx,
                &files,
                retry_failed,
                &output,
            ))?);
        }
        Commands::Generate {
            target,
            sources,
            mode,
            facts,
            budget_ms,
        } => {
            let ctx = CommandContext::load(cli.config.as_deref())?;
            let rt = Runtime::new()?;
            let options = GenerateOptions {
                target,
                sources,
                mode,
                facts,
                budget_ms,
            };
            return Ok(rt.block_on(commands::generate::run(&ctx, options, &output))?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                let ctx = CommandContext::load(cli.config.as_deref())?;
                commands::config::show(&ctx.config, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force, &output)?;
                } else {
                    commands::config::init_project(force, &output)?;
                }
            }
        },
    }

    Ok(true)
}
