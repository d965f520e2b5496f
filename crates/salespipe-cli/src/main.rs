//! Salespipe CLI
//!
//! Runs the coffee sales ETL and its supporting commands.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use salespipe_core::ConfigSources;
use salespipe_runtime::PipelineError;

mod commands;
mod logging;

use logging::LogFormat;

/// Salespipe - batch ETL for point-of-sale coffee sales
#[derive(Parser)]
#[command(name = "salespipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline settings file (defaults to ./salespipe.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Directory for per-run log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Do not write a log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(flatten)]
    env: EnvArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Values normally supplied through the environment or `.env`
#[derive(Args)]
struct EnvArgs {
    /// Raw sales CSV
    #[arg(long, env = "RAW_CSV_PATH", global = true)]
    raw_csv_path: Option<PathBuf>,

    /// Where the cleaned CSV is written
    #[arg(long, env = "PROCESSED_CSV_PATH", global = true)]
    processed_csv_path: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DB_URL", global = true, hide_env_values = true)]
    db_url: Option<String>,

    /// Chart output directory
    #[arg(long, env = "PLOT_PATH", global = true)]
    plot_path: Option<PathBuf>,
}

impl From<EnvArgs> for ConfigSources {
    fn from(args: EnvArgs) -> Self {
        Self {
            raw_csv_path: args.raw_csv_path,
            processed_csv_path: args.processed_csv_path,
            db_url: args.db_url,
            plot_path: args.plot_path,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline (default)
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract, clean and validate without charts or database
    Check,

    /// Run a SQL query against DB_URL and print the result
    Query {
        /// SQL text
        sql: String,
    },

    /// Write a starter salespipe.yaml and .env
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run { json: false });

    let writes_log_file = matches!(command, Commands::Run { .. } | Commands::Check);
    let log_dir = (writes_log_file && !cli.no_log_file).then_some(cli.log_dir.as_path());
    match logging::init(cli.verbose, cli.log_format, log_dir) {
        Ok(Some(path)) => tracing::debug!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    }

    let sources = ConfigSources::from(cli.env);
    let result = match command {
        Commands::Run { json } => {
            commands::run::run(cli.config.as_deref(), sources, json).await
        }
        Commands::Check => commands::check::run(cli.config.as_deref(), sources),
        Commands::Query { sql } => commands::query::run(sources.db_url, &sql).await,
        Commands::Init { path, force } => commands::init::run(&path, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(failure) => tracing::error!(stage = %failure.stage, "{failure}"),
                None => tracing::error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
