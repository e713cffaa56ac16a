use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Quill audit log CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a quill.yaml configuration file.
    Check {
        /// Path to the configuration file
        #[arg(default_value = "quill.yaml")]
        config: PathBuf,
    },

    /// List entries of a JSON Lines audit log.
    Log {
        /// Audit log file
        #[arg(long, default_value = "audit.log", env = "QUILL_AUDIT_LOG")]
        file: PathBuf,

        /// Only entries of this entity type
        #[arg(long = "type")]
        auditable_type: Option<String>,

        /// Only entries of this record id
        #[arg(long = "id")]
        auditable_id: Option<String>,

        /// Only entries with this action (create, update, destroy)
        #[arg(long)]
        action: Option<String>,

        /// Only entries written by this user id
        #[arg(long)]
        user: Option<String>,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,

        /// Newest entries first
        #[arg(long, default_value_t = false)]
        newest_first: bool,

        /// Print raw JSON lines instead of log lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the change history of one record.
    History {
        /// Audit log file
        #[arg(long, default_value = "audit.log", env = "QUILL_AUDIT_LOG")]
        file: PathBuf,

        /// Entity type
        #[arg(long = "type")]
        auditable_type: String,

        /// Record id
        #[arg(long = "id")]
        auditable_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Check { config } => commands::check::run(&config)?,

        Command::Log {
            file,
            auditable_type,
            auditable_id,
            action,
            user,
            limit,
            newest_first,
            json,
        } => {
            let filter = commands::log::build_filter(
                auditable_type,
                auditable_id,
                action.as_deref(),
                user,
                limit,
                newest_first,
            )?;
            commands::log::run_log(&file, filter, json).await?
        }

        Command::History {
            file,
            auditable_type,
            auditable_id,
        } => commands::log::run_history(&file, &auditable_type, &auditable_id).await?,
    }

    Ok(())
}
