//! CLI entrypoint and subcommand orchestration.

mod config;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use proto::ToolDescriptor;

#[cfg(not(test))]
use std::sync::Arc;

#[cfg(not(test))]
use agent::{ConversationRuntime, DashboardService};
#[cfg(not(test))]
use anyhow::Context;
#[cfg(not(test))]
use config::Config;
#[cfg(not(test))]
use proto::Message;
#[cfg(not(test))]
use server::AppState;
#[cfg(not(test))]
use tools::{McpBridge, ToolBridge};
#[cfg(not(test))]
use tracing::{info, warn};
#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments.
#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Tool-augmented analytics chat backend", version = "0.1.0")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides `[logging] level`
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable debug logging to ~/.lumen/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Port to bind, overriding `[server] port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message through the conversation loop and print the answer
    Chat {
        /// Message text
        #[arg(short, long)]
        exec: String,
    },

    /// Connect to the tool server and list the tools it offers
    Tools,
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Chat { .. } => "chat",
            Self::Tools => "tools",
        }
    }
}

#[cfg(not(test))]
#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve { port: None });

    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;
    let debug_writer = if cli.debug {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let log_dir = PathBuf::from(home).join(".lumen").join("logs");
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);
        Some(writer)
    } else {
        _file_guard = None;
        None
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, config.logging.structured, debug_writer);

    if cli.debug {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command = command.label(),
            log_level = level,
            "========== lumen session start =========="
        );
    }

    match command {
        Commands::Serve { port } => cmd_serve(config, port).await,
        Commands::Chat { exec } => cmd_chat(config, exec).await,
        Commands::Tools => cmd_tools(config).await,
    }
}

/// Console layer (plain or JSON) plus the optional debug file layer.
///
/// `RUST_LOG` wins over the configured level.
#[cfg(not(test))]
fn init_tracing(
    level: &str,
    structured: bool,
    debug_writer: Option<tracing_appender::non_blocking::NonBlocking>,
) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = if structured {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };
    let file = debug_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .with_filter(EnvFilter::new("debug,hyper_util=info,rustls=info,reqwest=info"))
    });
    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file)
        .init();
}

/// Spawns the tool server when one is configured.
///
/// A failed connection is logged and the bridge stays down; requests then
/// run without tools.
#[cfg(not(test))]
async fn start_bridge(config: &Config) -> Arc<McpBridge> {
    let bridge = Arc::new(McpBridge::new(config.bridge_config()));
    if config.tools.script_path.is_none() {
        info!("No tool server configured, running without tools");
        return bridge;
    }
    match bridge.connect().await {
        Ok(()) => {
            let count = bridge.list_tools().await.map(|t| t.len()).unwrap_or(0);
            info!(tools = count, "Tool server connected");
        }
        Err(e) => warn!(error = %e, "Tool server unavailable, continuing without tools"),
    }
    bridge
}

#[cfg(not(test))]
fn build_runtime(
    config: &Config,
    gateway: Arc<dyn agent::ModelGateway>,
    bridge: &Arc<McpBridge>,
) -> ConversationRuntime {
    let tools: Arc<dyn ToolBridge> = bridge.clone();
    ConversationRuntime::new(gateway, Some(tools), config.tools.max_iterations)
        .with_default_view_id(config.tools.default_view_id.clone())
        .with_tool_markers(config.tools.show_tool_markers)
}

#[cfg(not(test))]
async fn cmd_serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let gateway = config.build_gateway().context("model gateway is not configured")?;
    info!(
        provider = config.model.provider.name(),
        model = gateway.model_id(),
        "Starting lumen server"
    );

    let bridge = start_bridge(&config).await;
    let runtime = build_runtime(&config, gateway.clone(), &bridge);
    let dashboard = DashboardService::new(gateway, config.size_limits());
    let reconnect = (config.tools.reconnect_on_demand && config.tools.script_path.is_some())
        .then(|| bridge.clone());
    let state = Arc::new(AppState::new(runtime, dashboard).with_reconnect(reconnect));
    let app = server::router(state, &config.server.cors_origins);

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            bridge.cleanup().await;
            return Err(e).with_context(|| format!("failed to bind {addr}"));
        }
    };

    let result = server::serve(listener, app, shutdown_signal()).await;
    bridge.cleanup().await;
    result.context("HTTP server failed")
}

#[cfg(not(test))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(not(test))]
async fn cmd_chat(config: Config, exec: String) -> anyhow::Result<()> {
    let gateway = config.build_gateway().context("model gateway is not configured")?;
    let bridge = start_bridge(&config).await;
    let runtime = build_runtime(&config, gateway, &bridge);

    println!("{}", format_chat_header(&exec));
    let result = runtime.process(vec![Message::user(exec)]).await;
    bridge.cleanup().await;

    let outcome = result?;
    info!(
        iterations = outcome.iterations,
        model_calls = outcome.model_calls,
        tool_calls = outcome.tool_calls,
        input_tokens = outcome.usage.input_tokens,
        output_tokens = outcome.usage.output_tokens,
        mode = ?outcome.mode,
        "Chat finished"
    );
    println!("{}", outcome.text);
    Ok(())
}

#[cfg(not(test))]
async fn cmd_tools(config: Config) -> anyhow::Result<()> {
    let bridge = McpBridge::new(config.bridge_config());
    bridge
        .connect()
        .await
        .context("failed to connect to tool server")?;
    let listed = bridge.list_tools().await;
    bridge.cleanup().await;

    let tools = listed?;
    println!("tools | total:{}", tools.len());
    for tool in &tools {
        println!("{}", format_tool_line(tool));
    }
    Ok(())
}

fn format_chat_header(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    format!("chat | {first_line}")
}

/// One line per tool: name, then the first line of its description.
fn format_tool_line(tool: &ToolDescriptor) -> String {
    let summary = tool.description.lines().next().unwrap_or_default().trim();
    if summary.is_empty() {
        format!("  {}", tool.name)
    } else {
        format!("  {:<32} {summary}", tool.name)
    }
}
