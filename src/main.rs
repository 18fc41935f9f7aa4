use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docflow::cli::ConfigOverrides;
use docflow::cli::commands::discover::DiscoverOptions;
use docflow::config::ProviderKind;

#[derive(Parser)]
#[command(name = "docflow")]
#[command(
    version,
    about = "Conversational project discovery: from a rough idea to a structured brief"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Project config file (default: .docflow/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interview about a project idea and write a project brief
    Discover {
        #[arg(help = "Initial project idea")]
        idea: Option<String>,
        #[arg(long, short, help = "Session id (generated when omitted)")]
        session: Option<String>,
        #[arg(long, requires = "session", help = "Continue the stored session")]
        resume: bool,
        #[arg(long, help = "Maximum question/answer exchanges")]
        max_turns: Option<usize>,
        #[arg(long, help = "Backend: auto, openai, anthropic, local")]
        provider: Option<ProviderKind>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "No language-model backend; static questions and heuristics only")]
        offline: bool,
        #[arg(long = "no-stream", help = "Print each question only once it is complete")]
        no_stream: bool,
        #[arg(long, short, help = "Brief output path (default: .docflow/discovery.json)")]
        output: Option<PathBuf>,
    },

    /// Inspect stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Show a stored session
    Show {
        id: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: String,
    },
    /// Delete a stored session
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Edit configuration file with $EDITOR
    Edit {
        #[arg(long, short, help = "Edit global config")]
        global: bool,
    },
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
        eprintln!("\x1b[31mDocflow encountered an unexpected error:\x1b[0m");
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

        // Backtrace when RUST_BACKTRACE=1
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

    // stderr keeps logs out of the interview transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Discover {
            idea,
            session,
            resume,
            max_turns,
            provider,
            model,
            offline,
            no_stream,
            output,
        } => {
            let options = DiscoverOptions {
                idea,
                session,
                resume,
                output,
                overrides: ConfigOverrides {
                    max_turns,
                    provider,
                    model,
                    offline,
                    no_stream,
                },
            };
            let rt = Runtime::new()?;
            rt.block_on(docflow::cli::commands::discover::run(config_path, options))?;
        }
        Commands::Session { action } => {
            let rt = Runtime::new()?;
            match action {
                SessionAction::Show { id, format } => {
                    rt.block_on(docflow::cli::commands::session::show(config_path, &id, &format))?;
                }
                SessionAction::Delete { id } => {
                    rt.block_on(docflow::cli::commands::session::delete(config_path, &id))?;
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                docflow::cli::commands::config::show(config_path, global, &format)?;
            }
            ConfigAction::Path => {
                docflow::cli::commands::config::path(config_path)?;
            }
            ConfigAction::Edit { global } => {
                docflow::cli::commands::config::edit(global)?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    docflow::cli::commands::config::init_global(force)?;
                } else {
                    docflow::cli::commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
