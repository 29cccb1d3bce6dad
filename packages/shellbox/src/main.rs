use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shellbox::config::{ContainerConfig, FileConfig, ServerConfig, load_config};
use shellbox::container::{
    ContainerDirectory, PollOptions, await_healthy_with_progress, ensure_bucket_binding,
};
use shellbox::metrics::ServerMetrics;
use shellbox::{AppState, build_router};
use shellbox_session::{SessionId, validate_session_id};
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "shellbox")]
#[command(about = "Routing and readiness gate for container-backed terminal sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./shellbox.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway server in the foreground
    Server(ServerArgs),

    /// Run the readiness and binding checks against one session's container
    Check(CheckArgs),

    /// Print a freshly allocated session id
    NewId,
}

#[derive(Parser)]
struct ServerArgs {
    /// Port for the web server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct CheckArgs {
    /// Session id whose container should be checked
    session_id: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "shellbox=debug,tower_http=debug,info"
    } else {
        "shellbox=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

fn load_file_config(path: Option<&PathBuf>) -> Result<FileConfig> {
    load_config(path.map(PathBuf::as_path))
        .extract()
        .context("Failed to load configuration")
}

fn container_directory(fc: &FileConfig) -> Result<ContainerDirectory> {
    let containers = ContainerConfig::from_file(&fc.containers)?;
    ContainerDirectory::new(
        containers.bucket,
        containers.endpoint_template,
        containers.request_timeout,
    )
    .context("Failed to build container HTTP client")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run_server(args, cli.config.as_ref()).await,
        Commands::Check(args) => run_check(args, cli.config.as_ref()).await,
        Commands::NewId => {
            println!("{}", SessionId::generate());
            Ok(())
        }
    }
}

async fn run_server(args: ServerArgs, config_path: Option<&PathBuf>) -> Result<()> {
    init_tracing(args.debug);

    info!("Starting shellbox terminal gateway");

    let fc = load_file_config(config_path)?;
    let mut server_config = ServerConfig::from_file(&fc.server);
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let containers = container_directory(&fc)?;
    let poll = PollOptions::from_file(&fc.health);
    info!(
        "Container bucket: {} (health: {} attempts, {}ms apart)",
        containers.bucket(),
        poll.max_attempts,
        poll.delay.as_millis()
    );

    let app = build_router(AppState {
        containers: Arc::new(containers),
        poll,
        metrics: Arc::new(ServerMetrics::new()),
    });

    let addr = server_config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let actual_addr = listener.local_addr()?;

    info!("shellbox listening on http://{}", actual_addr);
    info!("API endpoints:");
    info!("  GET    /api/terminal/:session[-:tab]/ws - Terminal stream (WebSocket)");
    info!("  POST   /api/sessions                  - Allocate a session id");
    info!("  GET    /api/container/health          - Probe a session's container");
    info!("  GET    /health, /metrics              - Server status");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn run_check(args: CheckArgs, config_path: Option<&PathBuf>) -> Result<()> {
    init_tracing(args.debug);

    let session = validate_session_id(Some(&args.session_id)).context("Invalid session id")?;
    let fc = load_file_config(config_path)?;
    let containers = container_directory(&fc)?;
    let poll = PollOptions::from_file(&fc.health);

    let container = containers.resolve(&session);
    println!("container: {} ({})", container.id(), container.base_url());

    let health = await_healthy_with_progress(&container, &poll, |attempt, max| {
        eprint!("\rhealth: attempt {attempt}/{max}");
    })
    .await;
    eprintln!();
    match &health.data {
        Some(snapshot) if health.ok => println!("health:  ok ({})", snapshot.status),
        _ => anyhow::bail!("container did not become healthy"),
    }

    ensure_bucket_binding(&container, containers.bucket())
        .await
        .context("Bucket binding check failed")?;
    println!("bucket:  {}", containers.bucket());
    Ok(())
}
