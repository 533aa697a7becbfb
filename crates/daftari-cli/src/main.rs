use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daftari_core::{DaftariConfig, LogFormat, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{SqlInput, audit, check, explain, secure, tables};

#[derive(Parser, Debug)]
#[command(
    name = "daftari",
    version,
    about = "Secure model-generated SQL for a single tenant"
)]
struct Cli {
    /// Path to the configuration file. Defaults apply when it does not exist.
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "DAFTARI_CONFIG",
        default_value = "daftari.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Secure a statement and print it to stdout.
    Secure {
        /// Tenant the statement must be scoped to.
        #[arg(long, short = 't', env = "DAFTARI_TENANT")]
        tenant: String,

        /// Chat session, recorded in the audit trail.
        #[arg(long)]
        session: Option<String>,

        /// Print the outcome as JSON instead of bare SQL.
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        input: SqlInput,
    },

    /// Show every decision the guard makes for a statement.
    Explain {
        /// Tenant the statement must be scoped to.
        #[arg(long, short = 't', env = "DAFTARI_TENANT")]
        tenant: String,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        input: SqlInput,
    },

    /// Validate the configuration file.
    Check,

    /// List allowlisted tables and their tenant columns.
    Tables,

    /// Query the audit trail.
    Audit {
        /// Only events for this tenant.
        #[arg(long)]
        tenant: Option<String>,

        /// Only events for this chat session.
        #[arg(long)]
        session: Option<String>,

        /// Only rejected statements.
        #[arg(long, default_value_t = false)]
        rejected: bool,

        /// Only rejections with this code (e.g. UNAUTHORIZED_TABLE).
        #[arg(long)]
        code: Option<String>,

        /// Maximum number of events to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print events as JSON Lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config must not stop `check` from reporting it.
    let logging = DaftariConfig::load_resolved(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_default();
    init_tracing(&logging);

    match cli.cmd {
        Command::Secure {
            tenant,
            session,
            json,
            input,
        } => {
            let config = load_config(&cli.config)?;
            secure::run(&config, &tenant, session.as_deref(), json, input).await?
        }

        Command::Explain {
            tenant,
            json,
            input,
        } => {
            let config = load_config(&cli.config)?;
            explain::run(&config, &tenant, json, input)?
        }

        Command::Check => check::run(&cli.config)?,

        Command::Tables => {
            let config = load_config(&cli.config)?;
            tables::run(&config)
        }

        Command::Audit {
            tenant,
            session,
            rejected,
            code,
            limit,
            json,
        } => {
            let config = load_config(&cli.config)?;
            let query = audit::AuditQuery {
                tenant,
                session,
                rejected,
                code,
                limit,
                json,
            };
            audit::run(&config, query).await?
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<DaftariConfig> {
    DaftariConfig::load_or_default(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Diagnostics go to stderr; stdout carries only command output.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
