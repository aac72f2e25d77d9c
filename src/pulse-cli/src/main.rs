//! Pulse CLI - main entry point.
//!
//! Runs an interactive chat loop on stdin/stdout, or a single non-streaming
//! exchange with `--once`. Logs go to stderr or, with `--log-file`, to a file.

mod repl;

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pulse_client::ChatClient;
use pulse_session::{ChatConfig, ChatSession, build_request};
use pulse_storage::{ConversationStore, FileStore, Message, default_config_path};

/// Pulse - streaming chat client
#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(about = "Chat with an OpenAI-compatible endpoint from the terminal")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Chat-completions endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Request a single response payload instead of a stream
    #[arg(long)]
    no_stream: bool,

    /// Accept invalid TLS certificates (development only)
    #[arg(long)]
    insecure: bool,

    /// Keep the conversation in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Data directory for the stored conversation
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Send one message, print the reply and exit
    #[arg(long, value_name = "TEXT")]
    once: Option<String>,
}

fn setup_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let Some(path) = &args.log_file else {
        if args.json_logs {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        return Ok(None);
    };

    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    if args.json_logs {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            )
            .init();
    }
    Ok(Some(guard))
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(args: &Args) -> Result<ChatConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = ChatConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env();

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if args.no_stream {
        config.stream = false;
    }
    if args.insecure {
        config.accept_invalid_certs = true;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_store(config: &ChatConfig, ephemeral: bool) -> Result<ConversationStore> {
    if ephemeral {
        return Ok(ConversationStore::in_memory());
    }
    let paths = config.paths()?;
    paths.ensure_dirs()?;
    let kv = FileStore::from_paths(&paths);
    Ok(ConversationStore::load(
        Box::new(kv),
        config.conversation_key.as_str(),
    ))
}

async fn run_once(config: &ChatConfig, text: &str) -> Result<()> {
    if let Err(diagnostic) = config.validate() {
        bail!(diagnostic);
    }
    let client = ChatClient::new(config.client_options())?;
    let request = build_request(config, &[Message::user(text)]);
    let reply = client
        .complete(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.diagnostic()))?;
    println!("{reply}");
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    info!(config = ?config, "Configuration resolved");

    if let Some(text) = &args.once {
        return run_once(&config, text).await;
    }

    let store = open_store(&config, args.ephemeral)?;
    let session = ChatSession::from_config(config, store);
    repl::run(session).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match setup_logging(&args) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Pulse exited with an error");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
