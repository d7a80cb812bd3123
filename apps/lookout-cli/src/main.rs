//! # Lookout
//!
//! Command-line inspector for arq job queues.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;
mod telemetry;

use commands::StatusArg;
use lookout_infra::{AdminConfig, QueueRegistry};
use output::OutputFormat;
use telemetry::TelemetryConfig;

#[derive(Parser)]
#[command(name = "lookout", version, about = "Inspect and abort jobs on arq queues")]
struct Cli {
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show per-status counts for every configured queue
    Queues,
    /// List the jobs of a queue, oldest first
    Jobs {
        /// Queue name
        queue: String,
        /// Only show jobs in this state
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
    },
    /// Show one job
    Job {
        /// Queue name
        queue: String,
        /// Job ID
        job_id: String,
    },
    /// Ask the worker running a job to abort it and wait for the answer
    Abort {
        /// Queue name
        queue: String,
        /// Job ID
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = AdminConfig::from_env()?;
    tracing::debug!(queues = config.queues().len(), "Configuration loaded");
    let registry = connect(config)?;

    match cli.command {
        Command::Queues => commands::queues(&registry, format).await,
        Command::Jobs { queue, status } => commands::jobs(&registry, &queue, status, format).await,
        Command::Job { queue, job_id } => commands::job(&registry, &queue, &job_id, format).await,
        Command::Abort { queue, job_id } => commands::abort(&registry, &queue, &job_id, format).await,
    }
}

#[cfg(feature = "redis")]
fn connect(config: AdminConfig) -> Result<QueueRegistry> {
    Ok(QueueRegistry::redis(config))
}

#[cfg(not(feature = "redis"))]
fn connect(_config: AdminConfig) -> Result<QueueRegistry> {
    anyhow::bail!("lookout was built without the redis feature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_infra::{QueueConfig, RedisConfig};

    fn config() -> AdminConfig {
        AdminConfig::new(vec![QueueConfig {
            name: "arq:queue".to_string(),
            redis: RedisConfig::default(),
            layout: Default::default(),
        }])
        .unwrap()
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_build_opens_redis_registry() {
        let registry = connect(config()).unwrap();
        assert_eq!(registry.queue_names().collect::<Vec<_>>(), ["arq:queue"]);
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn build_without_redis_refuses_to_connect() {
        let err = connect(config()).err().unwrap();
        assert!(err.to_string().contains("without the redis feature"));
    }

    #[test]
    fn status_flag_is_parsed() {
        let cli = Cli::try_parse_from([
            "lookout",
            "jobs",
            "arq:queue",
            "--status",
            "in-progress",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Jobs { status: StatusArg::InProgress, .. }
        ));
    }
}
