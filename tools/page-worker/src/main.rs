//! Page worker - serves render requests for one page.
//!
//! The host starts one worker per page and sends it requests over a framed
//! channel (TCP back to the host, or stdin/stdout). The worker exits with
//! status 1 on the first failure; the host is responsible for restarting it.
//!
//! ```text
//! page-worker --page pages/index.toml 4000
//! page-worker --page pages/index.toml --stdio
//! ```

mod config;
mod engine;
mod page;
mod shell;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use page_ipc::StreamChannel;
use page_observability::{init_logging, LogFormat, LogLevel};
use page_renderer::{PageWorker, WorkerContext};
use tracing::{error, info};

use config::{Transport, WorkerConfig};
use engine::StaticEngine;
use page::PageDefinition;

/// Render worker for a single page
#[derive(Parser, Debug)]
#[command(name = "page-worker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host IPC port
    #[arg(value_name = "PORT")]
    port_arg: Option<u16>,

    /// Page definition file
    #[arg(long)]
    page: PathBuf,

    /// Host IPC port (same as the positional argument)
    #[arg(long, env = "PAGE_WORKER_PORT")]
    port: Option<u16>,

    /// Use stdin/stdout instead of TCP
    #[arg(long)]
    stdio: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (RUST_LOG still applies on top)
    #[arg(long, env = "PAGE_WORKER_LOG")]
    log_level: Option<LogLevel>,

    /// Log format: json or compact
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Command-line flags take precedence over the config file.
    fn apply(&self, config: &mut WorkerConfig) {
        if let Some(port) = self.port_arg.or(self.port) {
            config.ipc.port = Some(port);
        }
        if self.stdio {
            config.ipc.transport = Transport::Stdio;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let message = format!("{:#}", e);
        if tracing::dispatcher::has_been_set() {
            error!(error = %message, "page worker stopped");
        } else {
            eprintln!("page-worker: {}", message);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => WorkerConfig::load(path)?,
        None => WorkerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    init_logging(&config.logging)?;

    let definition = PageDefinition::load(&cli.page)?;
    let engine = StaticEngine::new(definition.dynamic.clone());
    let bundle = definition
        .into_bundle()
        .with_context(|| format!("Invalid page file: {}", cli.page.display()))?;
    let mut worker = PageWorker::new(WorkerContext::new(bundle), engine);

    match config.ipc.transport {
        Transport::Tcp => {
            let port = config
                .ipc
                .port
                .context("an IPC port is required for the tcp transport")?;
            info!(host = %config.ipc.host, port, "connecting to host");
            let mut channel = StreamChannel::connect_tcp((config.ipc.host.as_str(), port))
                .await
                .with_context(|| format!("Failed to connect to {}:{}", config.ipc.host, port))?
                .with_max_frame_bytes(config.limits.max_frame_bytes);
            worker.run(&mut channel).await?;
        }
        Transport::Stdio => {
            info!("serving over stdio");
            let mut channel =
                StreamChannel::stdio().with_max_frame_bytes(config.limits.max_frame_bytes);
            worker.run(&mut channel).await?;
        }
    }

    info!(served = worker.requests_served(), "page worker exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_port() {
        let cli = Cli::try_parse_from(["page-worker", "--page", "index.toml", "4000"]).unwrap();
        let mut config = WorkerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ipc.port, Some(4000));
        assert_eq!(config.ipc.transport, Transport::Tcp);
        config.validate().unwrap();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "page-worker",
            "--page",
            "index.toml",
            "--stdio",
            "--log-level",
            "debug",
            "--log-format",
            "compact",
        ])
        .unwrap();
        let mut config = WorkerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ipc.transport, Transport::Stdio);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_page_is_required() {
        assert!(Cli::try_parse_from(["page-worker", "4000"]).is_err());
    }
}
