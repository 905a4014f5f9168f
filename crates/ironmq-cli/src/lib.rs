//! # IronMQ CLI
//!
//! Command-line interface for operating IronMQ queues through the
//! allow-listed adapter.
//!
//! This module provides CLI commands for:
//! - Listing project queues and the allow-listed overview with counts
//! - Sending, receiving and deleting messages
//! - Deleting queues in bulk
//! - Configuring push queues
//!
//! Configuration is layered with the `config` crate. Later sources override
//! earlier ones:
//!
//!  1. `/etc/ironmq/ironmq.yaml` (optional)
//!  2. `./ironmq.yaml` (optional)
//!  3. The file given with `--config` (required when given)
//!  4. Environment variables prefixed `IRONMQ__`, e.g. `IRONMQ__PROJECT_ID`

use chrono::Duration;
use clap::{Parser, Subcommand};
use ironmq_runtime::{
    ConfigurationError, IronMqAdapter, IronMqConfig, MessageId, OutboundMessage, PushQueueAdapter,
    PushType, QueueAdapter, QueueDeletion, QueueError, QueueName, QueueSummary, QueueUpdate,
    ReceiveOptions, ReservedMessage,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Prefix of environment variables that override file configuration
pub const ENV_PREFIX: &str = "IRONMQ";

// ============================================================================
// CLI Structure
// ============================================================================

/// IronMQ CLI - operate allow-listed queues on the hosted service
#[derive(Debug, Parser)]
#[command(name = "ironmq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate allow-listed IronMQ queues")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "IRONMQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List queues in the project
    Queues {
        /// Page to fetch, starting at 0
        #[arg(long)]
        page: Option<u32>,

        /// Queues per page (service default 30, maximum 100)
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show allow-listed queues with their message counts
    Overview {
        /// Only list allow-listed queues that exist in the project
        #[arg(long)]
        existing: bool,
    },

    /// Check whether a queue exists in the project
    Exists {
        /// Queue name
        queue: QueueName,
    },

    /// Show the approximate number of messages in a queue
    Count {
        /// Queue name
        queue: QueueName,
    },

    /// Send a message to a queue
    Send {
        /// Queue name
        queue: QueueName,

        /// Message body
        body: String,

        /// Visibility timeout in seconds once the message is reserved
        #[arg(long)]
        timeout: Option<i64>,

        /// Seconds before the message becomes available
        #[arg(long)]
        delay: Option<i64>,

        /// Seconds the service keeps the message
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Reserve messages from a queue
    Receive {
        /// Queue name
        queue: QueueName,

        /// Maximum number of messages to reserve (1-100)
        #[arg(short = 'n', long)]
        max_messages: Option<u32>,

        /// Visibility timeout in seconds
        #[arg(long)]
        timeout: Option<i64>,
    },

    /// Delete reserved messages
    DeleteMessage {
        /// Queue name
        queue: QueueName,

        /// Message ids to delete
        #[arg(required = true)]
        ids: Vec<MessageId>,
    },

    /// Delete queues and all of their messages
    DeleteQueue {
        /// Queue names
        #[arg(required = true)]
        queues: Vec<QueueName>,
    },

    /// Replace the push configuration of a queue
    UpdateQueue {
        /// Queue name
        queue: QueueName,

        /// Subscriber URL, repeat for several
        #[arg(long = "subscriber")]
        subscribers: Vec<String>,

        /// Delivery mode
        #[arg(long)]
        push_type: Option<PushType>,

        /// Delivery attempts per message
        #[arg(long)]
        retries: Option<u32>,

        /// Seconds between delivery attempts
        #[arg(long)]
        retries_delay: Option<i64>,
    },

    /// Add subscribers to a push queue
    AddSubscribers {
        /// Queue name
        queue: QueueName,

        /// Subscriber URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show which queue operations the adapter supports
    Capabilities,
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Queue {queue} is not in the allow-list")]
    NotPermitted { queue: QueueName },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output encoding failed: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Queue(e) if e.is_transient() => 3,
            Self::Queue(_) => 2,
            Self::NotPermitted { .. } => 4,
            Self::CommandFailed { .. } => 5,
            Self::InvalidArgument { .. } => 6,
            Self::Io(_) | Self::Output(_) => 7,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0}")]
    Invalid(#[from] ConfigurationError),
}

// ============================================================================
// Configuration and Logging
// ============================================================================

/// Load the adapter configuration from files and the process environment
pub fn load_configuration(explicit_path: Option<&Path>) -> Result<IronMqConfig, ConfigError> {
    load_configuration_with_env(
        explicit_path,
        config::Environment::with_prefix(ENV_PREFIX).separator("__"),
    )
}

/// Load the adapter configuration with a given environment source
pub fn load_configuration_with_env(
    explicit_path: Option<&Path>,
    environment: config::Environment,
) -> Result<IronMqConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/ironmq/ironmq")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("ironmq")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config: IronMqConfig = builder
        .add_source(environment)
        .build()?
        .try_deserialize()?;

    config.validate()?;

    debug!(
        project_id = %config.project_id,
        base_url = %config.base_url,
        "Configuration loaded"
    );

    Ok(config)
}

/// Install the tracing subscriber; logs go to stderr
pub fn initialize_logging(log_level: &str, json_logs: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "ironmq_cli={0},ironmq_runtime={0}",
                log_level
            ))
        })
        .map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

// ============================================================================
// Output Views
// ============================================================================

#[derive(Debug, Serialize)]
struct MessageView<'a> {
    id: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reserved_count: Option<u32>,
    reservation_expires_at: String,
}

impl<'a> From<&'a ReservedMessage> for MessageView<'a> {
    fn from(message: &'a ReservedMessage) -> Self {
        Self {
            id: message.id.as_str(),
            body: &message.body,
            reserved_count: message.reserved_count,
            reservation_expires_at: message.reservation_expires_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OutcomeView<'a> {
    target: &'a str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_summaries<W: Write>(
    out: &mut W,
    format: OutputFormat,
    summaries: &[QueueSummary],
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => write_json(out, summaries),
        OutputFormat::Text => {
            for summary in summaries {
                match summary.size {
                    Some(size) => writeln!(out, "{}\t{}", summary.name, size)?,
                    None => writeln!(out, "{}\t-", summary.name)?,
                }
            }
            Ok(())
        }
    }
}

fn write_outcomes<W: Write>(
    out: &mut W,
    format: OutputFormat,
    outcomes: &[OutcomeView<'_>],
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => write_json(out, outcomes),
        OutputFormat::Text => {
            for outcome in outcomes {
                match &outcome.error {
                    Some(error) => {
                        writeln!(out, "{}\t{}: {}", outcome.target, outcome.outcome, error)?
                    }
                    None => writeln!(out, "{}\t{}", outcome.target, outcome.outcome)?,
                }
            }
            Ok(())
        }
    }
}

fn seconds(arg: &str, value: Option<i64>) -> Result<Option<Duration>, CliError> {
    match value {
        Some(v) if v < 0 => Err(CliError::InvalidArgument {
            arg: arg.to_string(),
            message: "must not be negative".to_string(),
        }),
        Some(v) => Ok(Some(Duration::seconds(v))),
        None => Ok(None),
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute one command against the adapter, writing results to `out`
pub async fn execute_command<W: Write>(
    command: Commands,
    adapter: &IronMqAdapter,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Commands::Queues { page, per_page } => {
            let queues = adapter.list_queues(page, per_page).await?;
            write_summaries(out, format, &queues)
        }
        Commands::Overview { existing } => {
            let mut overview = adapter.allowed_queue_overview().await?;
            if existing {
                let present = adapter.existing_allowed_queues().await?;
                overview.retain(|summary| present.contains(&summary.name));
            }
            write_summaries(out, format, &overview)
        }
        Commands::Exists { queue } => {
            let exists = adapter.queue_exists(&queue).await?;
            match format {
                OutputFormat::Json => write_json(
                    out,
                    &serde_json::json!({"queue": queue.as_str(), "exists": exists}),
                ),
                OutputFormat::Text => Ok(writeln!(out, "{}", exists)?),
            }
        }
        Commands::Count { queue } => {
            let size = adapter
                .count(&queue)
                .await?
                .ok_or_else(|| CliError::NotPermitted {
                    queue: queue.clone(),
                })?;
            match format {
                OutputFormat::Json => write_json(
                    out,
                    &QueueSummary {
                        name: queue.to_string(),
                        size: Some(size),
                    },
                ),
                OutputFormat::Text => Ok(writeln!(out, "{}", size)?),
            }
        }
        Commands::Send {
            queue,
            body,
            timeout,
            delay,
            expires_in,
        } => {
            let mut message = OutboundMessage::new(body);
            message.timeout = seconds("timeout", timeout)?;
            message.delay = seconds("delay", delay)?;
            message.expires_in = seconds("expires-in", expires_in)?;

            let id = adapter
                .send(&queue, message)
                .await?
                .ok_or_else(|| CliError::NotPermitted {
                    queue: queue.clone(),
                })?;

            info!(queue = %queue, message_id = %id, "Message sent");
            match format {
                OutputFormat::Json => write_json(out, &serde_json::json!({"id": id.as_str()})),
                OutputFormat::Text => Ok(writeln!(out, "{}", id)?),
            }
        }
        Commands::Receive {
            queue,
            max_messages,
            timeout,
        } => {
            let options = ReceiveOptions {
                max_messages,
                timeout: seconds("timeout", timeout)?,
            };

            let messages = adapter
                .receive(&queue, options)
                .await?
                .ok_or_else(|| CliError::NotPermitted {
                    queue: queue.clone(),
                })?;

            match format {
                OutputFormat::Json => {
                    let views: Vec<MessageView<'_>> = messages.iter().map(Into::into).collect();
                    write_json(out, &views)
                }
                OutputFormat::Text => {
                    for message in &messages {
                        writeln!(out, "{}\t{}", message.id, message.body)?;
                    }
                    Ok(())
                }
            }
        }
        Commands::DeleteMessage { queue, ids } => {
            let report = adapter
                .delete_messages(&queue, &ids)
                .await?
                .ok_or_else(|| CliError::NotPermitted {
                    queue: queue.clone(),
                })?;

            let mut outcomes: Vec<OutcomeView<'_>> = report
                .deleted
                .iter()
                .map(|id| OutcomeView {
                    target: id.as_str(),
                    outcome: "deleted",
                    error: None,
                })
                .collect();
            outcomes.extend(report.failed.iter().map(|(id, e)| OutcomeView {
                target: id.as_str(),
                outcome: "failed",
                error: Some(e.to_string()),
            }));
            write_outcomes(out, format, &outcomes)?;

            if report.is_complete() {
                Ok(())
            } else {
                Err(CliError::CommandFailed {
                    message: format!(
                        "{} of {} messages not deleted",
                        report.failed.len(),
                        ids.len()
                    ),
                })
            }
        }
        Commands::DeleteQueue { queues } => {
            let report = adapter.delete_queues(&queues).await;

            let outcomes: Vec<OutcomeView<'_>> = report
                .entries
                .iter()
                .map(|entry| {
                    let (outcome, error) = match &entry.outcome {
                        Ok(Some(QueueDeletion::Deleted)) => ("deleted", None),
                        Ok(Some(QueueDeletion::AlreadyAbsent)) => ("already absent", None),
                        Ok(None) => ("not permitted", None),
                        Err(e) => ("failed", Some(e.to_string())),
                    };
                    OutcomeView {
                        target: entry.queue.as_str(),
                        outcome,
                        error,
                    }
                })
                .collect();
            write_outcomes(out, format, &outcomes)?;

            let failed = report.failures().count() + report.not_permitted().count();
            if failed == 0 {
                Ok(())
            } else {
                Err(CliError::CommandFailed {
                    message: format!("{} of {} queues not deleted", failed, queues.len()),
                })
            }
        }
        Commands::UpdateQueue {
            queue,
            subscribers,
            push_type,
            retries,
            retries_delay,
        } => {
            let update = QueueUpdate {
                subscribers: subscribers
                    .into_iter()
                    .map(ironmq_runtime::Subscriber::new)
                    .collect(),
                push_type,
                retries,
                retries_delay: seconds("retries-delay", retries_delay)?,
            };

            if !adapter.update_queue(&queue, &update).await? {
                return Err(CliError::NotPermitted { queue });
            }
            Ok(writeln!(out, "updated {}", queue)?)
        }
        Commands::AddSubscribers { queue, urls } => {
            if !adapter.add_subscribers(&queue, &urls).await? {
                return Err(CliError::NotPermitted { queue });
            }
            Ok(writeln!(out, "added {} subscribers to {}", urls.len(), queue)?)
        }
        Commands::Capabilities => {
            let capabilities = adapter.capabilities();
            match format {
                OutputFormat::Json => write_json(out, &capabilities),
                OutputFormat::Text => {
                    for (capability, supported) in capabilities.iter() {
                        let state = if supported { "supported" } else { "unsupported" };
                        writeln!(out, "{}\t{}", capability, state)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level, cli.json_logs)?;

    let config = load_configuration(cli.config.as_deref())?;
    let adapter = IronMqAdapter::new(config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_command(cli.command, &adapter, cli.format, &mut out).await
}
