//! leafid CLI - identify plants from photos and keep a history.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use leafid_core::{BackendKind, Config, LeafError};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "leafid")]
#[command(author, version, about = "Identify plants from photos and keep a history", long_about = None)]
#[command(after_help = exit_codes::HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// History backend (overrides LEAFID_BACKEND)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Directory for local history and session state (overrides LEAFID_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv everything)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print only errors and requested data
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Local,
    Hosted,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Local => BackendKind::Local,
            BackendArg::Hosted => BackendKind::Hosted,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the plant in a JPEG or PNG photo
    Identify {
        /// Path to the photo
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Plant.id API key
        #[arg(long, env = "LEAFID_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse and edit past identifications
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },

    /// Sign in to the hosted backend with an access token
    #[cfg(feature = "hosted")]
    Login {
        /// Access token issued by the identity provider
        #[arg(long, env = "LEAFID_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Sign out of the hosted backend
    #[cfg(feature = "hosted")]
    Logout,

    /// Show the signed-in user
    #[cfg(feature = "hosted")]
    Whoami,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List identifications, newest first
    List {
        /// Only show plants whose common or scientific name contains TERM
        #[arg(short, long, value_name = "TERM")]
        search: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one identification in full
    Show {
        /// Record id, or position in the list
        #[arg(value_name = "ID")]
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove one identification
    Remove {
        /// Position in the unfiltered list, or record id
        #[arg(value_name = "INDEX|ID")]
        target: String,
    },

    /// Remove every identification
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "warn,leafid=debug,leafid_core=debug",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::debug!(config = ?config, "Loaded configuration");

    let quiet = cli.quiet;
    match cli.command {
        Commands::Identify {
            file,
            api_key,
            json,
        } => commands::identify::execute(&config, file, api_key, json, quiet).await,
        Commands::History { action } => match action {
            HistoryCommand::List { search, json } => {
                commands::history::list(&config, search, json, quiet).await
            }
            HistoryCommand::Show { id, json } => commands::history::show(&config, id, json).await,
            HistoryCommand::Remove { target } => {
                commands::history::remove(&config, target, quiet).await
            }
            HistoryCommand::Clear { yes } => commands::history::clear(&config, yes, quiet).await,
        },
        #[cfg(feature = "hosted")]
        Commands::Login { token } => commands::auth::login(&config, token, quiet).await,
        #[cfg(feature = "hosted")]
        Commands::Logout => commands::auth::logout(&config, quiet).await,
        #[cfg(feature = "hosted")]
        Commands::Whoami => commands::auth::whoami(&config).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {message}", "Error:".red().bold());
            }
            let hint = hint_for(&err).filter(|h| !exit.message.iter().any(|m| m.contains(h)));
            if let Some(hint) = hint {
                eprintln!("{}", hint.dimmed());
            }
            exit
        }
    };

    std::process::exit(exit.code);
}

/// Friendly follow-up line for errors the user can act on.
fn hint_for(err: &anyhow::Error) -> Option<String> {
    let leaf = err.chain().find_map(|c| c.downcast_ref::<LeafError>())?;
    (leaf.is_input_error() || leaf.is_transient() || matches!(leaf, LeafError::Unauthenticated(_)))
        .then(|| leaf.user_message())
}
