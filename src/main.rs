//! Hopper Disassembler MCP Server
//!
//! This binary runs an MCP server over a Hopper project snapshot, via
//! stdin/stdout or Streamable HTTP transport, plus the launcher installer.
//!
//! Architecture:
//! - Main thread: Runs the Hopper worker loop (owns all host state)
//! - Background thread: Runs tokio runtime with async MCP server

use anyhow::Context;
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use hopper_mcp::hopper::handlers::cache::{handle_cache_status, handle_cache_strings};
use hopper_mcp::hopper::snapshot::ProjectSnapshot;
use hopper_mcp::install::{self, InstallOptions, Outcome, Substitutions, UninstallOptions};
use hopper_mcp::{
    expand_path, run_hopper_loop, HopperMcpServer, HopperWorker, ServerMode, Session,
    SnapshotHost,
};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::http::{header::ORIGIN, Request, Response, StatusCode};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::Notify;
use tower_service::Service;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_BIND: &str = "127.0.0.1:42069";
const DEFAULT_LOG_FILTER: &str = "hopper_mcp=info";

#[derive(Parser)]
#[command(name = "hopper-mcp", version, about = "Hopper Disassembler MCP Server")]
struct Cli {
    /// Hopper project snapshot (JSON) to serve
    #[arg(long, global = true, env = "HOPPER_MCP_SNAPSHOT")]
    snapshot: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server over stdio (default)
    Serve,
    /// Run the MCP server over Streamable HTTP (SSE)
    ServeHttp(ServeHttpArgs),
    /// Precompute the string cache of every document, then exit
    CacheStrings,
    /// Report which documents have a complete string cache
    CacheStatus,
    /// Install the launcher script into Hopper's Scripts directory
    Install(InstallArgs),
    /// Remove the launcher script from Hopper's Scripts directory
    Uninstall(UninstallArgs),
}

#[derive(Args)]
struct ServeHttpArgs {
    /// Bind address (e.g., 127.0.0.1:42069)
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
    /// SSE keep-alive interval in seconds (0 disables)
    #[arg(long, default_value_t = 15)]
    sse_keep_alive_secs: u64,
    /// Use stateless mode (POST only; no sessions)
    #[arg(long)]
    stateless: bool,
    /// Allowed Origin values (comma-separated). Defaults to localhost only.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "http://localhost,http://127.0.0.1"
    )]
    allow_origin: Vec<String>,
}

#[derive(Args)]
struct InstallArgs {
    /// Overwrite an existing launcher without prompting
    #[arg(long)]
    force: bool,
    /// Show what would be done without doing it
    #[arg(long)]
    dry_run: bool,
    /// Address the launched server binds to
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
    /// Log filter for the launched server
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    log: String,
}

#[derive(Args)]
struct UninstallArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    confirm: bool,
    /// Show what would be done without doing it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone)]
struct OriginCheckService<S> {
    inner: S,
    allowed_origins: Arc<std::collections::HashSet<String>>,
}

impl<S> OriginCheckService<S> {
    fn new(inner: S, allowed_origins: Arc<std::collections::HashSet<String>>) -> Self {
        Self {
            inner,
            allowed_origins,
        }
    }
}

impl<B, S> Service<Request<B>> for OriginCheckService<S>
where
    B: http_body::Body + Send + 'static,
    B::Error: std::fmt::Display,
    S: Service<
            Request<B>,
            Response = Response<BoxBody<Bytes, std::convert::Infallible>>,
            Error = std::convert::Infallible,
        > + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, std::convert::Infallible>>;
    type Error = std::convert::Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let allowed_origins = self.allowed_origins.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if let Some(origin) = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok()) {
                if !allowed_origins.contains(origin) {
                    let mut resp = Response::new(Full::new(Bytes::from("Forbidden")).boxed());
                    *resp.status_mut() = StatusCode::FORBIDDEN;
                    return Ok(resp);
                }
            }
            inner.call(req).await
        })
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging to stderr (stdout is used for MCP protocol)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let snapshot = cli.snapshot;
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(load_session(snapshot.as_deref())?),
        Command::ServeHttp(args) => run_server_http(load_session(snapshot.as_deref())?, args),
        Command::CacheStrings => run_cache_strings(load_session(snapshot.as_deref())?),
        Command::CacheStatus => run_cache_status(load_session(snapshot.as_deref())?),
        Command::Install(args) => run_install(args),
        Command::Uninstall(args) => run_uninstall(args),
    }
}

fn load_session(snapshot: Option<&str>) -> anyhow::Result<Session> {
    let host = match snapshot {
        Some(path) => {
            let path = expand_path(path);
            info!(path = %path.display(), "Loading Hopper snapshot");
            SnapshotHost::load(&path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?
        }
        None => {
            warn!("No snapshot given (--snapshot / HOPPER_MCP_SNAPSHOT); serving no documents");
            SnapshotHost::new(ProjectSnapshot::default())
        }
    };
    Ok(Session::new(Box::new(host)))
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigquit = signal(SignalKind::quit())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            _ = sigquit.recv() => {},
            _ = tokio::signal::ctrl_c() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

fn run_server(session: Session) -> anyhow::Result<()> {
    info!("Starting Hopper MCP Server (stdio mode)");

    let (worker, rx) = HopperWorker::channel();

    let worker_for_server = worker.clone();
    let worker_for_shutdown = worker.clone();
    let server_handle = thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;

        rt.block_on(async move {
            info!("MCP server listening on stdio");
            let server = HopperMcpServer::new(Arc::new(worker_for_server), ServerMode::Stdio);
            let mut service = Some(server.serve(stdio()).await?);
            let shutdown_notify = Arc::new(Notify::new());
            let shutdown_signal = shutdown_notify.clone();

            let shutdown_worker = worker_for_shutdown.clone();
            tokio::spawn(async move {
                if wait_for_shutdown_signal().await.is_ok() {
                    info!("Shutdown signal received");
                    let _ = shutdown_worker.shutdown().await;
                    shutdown_signal.notify_one();
                } else {
                    info!("Shutdown signal handler failed; server will continue running");
                }
            });

            loop {
                tokio::select! {
                    _ = shutdown_notify.notified() => {
                        if let Some(mut running) = service.take() {
                            let _ = running.close().await?;
                        }
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {
                        if let Some(running) = service.as_ref() {
                            if running.is_transport_closed() {
                                if let Some(running) = service.take() {
                                    let _ = running.waiting().await?;
                                }
                                break;
                            }
                        }
                    }
                }
            }
            info!("MCP server shutting down");
            let _ = worker_for_shutdown.shutdown().await;
            Ok::<_, anyhow::Error>(())
        })
    });

    info!("Starting Hopper worker loop");
    run_hopper_loop(rx, session);
    info!("Hopper worker loop finished");

    match server_handle.join() {
        Ok(Err(e)) => error!("Server error: {e}"),
        Err(e) => error!("Server thread panicked: {:?}", e),
        Ok(Ok(())) => {}
    }

    info!("Server stopped");
    Ok(())
}

fn run_server_http(session: Session, args: ServeHttpArgs) -> anyhow::Result<()> {
    info!("Starting Hopper MCP Server (streamable HTTP mode)");

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

    let (worker, rx) = HopperWorker::channel();
    let worker = Arc::new(worker);

    let worker_for_factory = worker.clone();
    let worker_for_shutdown = worker.clone();
    let server_handle = thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;

        rt.block_on(async move {
            let session_manager = Arc::new(LocalSessionManager::default());
            let cancel = tokio_util::sync::CancellationToken::new();
            let config = StreamableHttpServerConfig {
                sse_keep_alive: if args.sse_keep_alive_secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(args.sse_keep_alive_secs))
                },
                sse_retry: None,
                stateful_mode: !args.stateless,
                cancellation_token: cancel.clone(),
            };

            let service = StreamableHttpService::new(
                move || Ok(HopperMcpServer::new(worker_for_factory.clone(), ServerMode::Http)),
                session_manager,
                config,
            );
            let allowed_origins: std::collections::HashSet<String> = args
                .allow_origin
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let service = OriginCheckService::new(service, Arc::new(allowed_origins));

            let listener = tokio::net::TcpListener::bind(bind_addr)
                .await
                .map_err(|e| anyhow::anyhow!("bind failed: {e}"))?;
            info!("MCP HTTP server listening on http://{bind_addr}/mcp");

            let shutdown_worker = worker_for_shutdown.clone();
            let cancel_for_shutdown = cancel.clone();
            tokio::spawn(async move {
                if wait_for_shutdown_signal().await.is_ok() {
                    info!("Shutdown signal received");
                    let _ = shutdown_worker.shutdown().await;
                    cancel_for_shutdown.cancel();
                }
            });

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("HTTP server shutting down");
                        break;
                    }
                    res = listener.accept() => {
                        let (stream, _) = res.map_err(|e| anyhow::anyhow!("accept failed: {e}"))?;
                        let svc = service.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let conn = http1::Builder::new().serve_connection(
                                io,
                                TowerToHyperService::new(svc),
                            );
                            if let Err(err) = conn.await {
                                error!("http connection error: {err}");
                            }
                        });
                    }
                }
            }
            Ok::<_, anyhow::Error>(())
        })
    });

    info!("Starting Hopper worker loop");
    run_hopper_loop(rx, session);
    info!("Hopper worker loop finished");

    match server_handle.join() {
        Ok(Err(e)) => error!("HTTP server error: {e}"),
        Err(e) => error!("Server thread panicked: {:?}", e),
        Ok(Ok(())) => {}
    }

    info!("Server stopped");
    Ok(())
}

fn run_cache_strings(session: Session) -> anyhow::Result<()> {
    info!("Precomputing string caches for every document");
    let report = handle_cache_strings(&session, true)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.all_written {
        info!("Caching complete");
    } else {
        warn!("Some documents were not cached; save them in Hopper and run again");
    }
    Ok(())
}

fn run_cache_status(session: Session) -> anyhow::Result<()> {
    let report = handle_cache_status(&session)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_install(args: InstallArgs) -> anyhow::Result<()> {
    let dir = install::scripts_dir()?;
    let subs = Substitutions::detect(&args.bind, &args.log)?;
    let opts = InstallOptions {
        force: args.force,
        dry_run: args.dry_run,
    };
    match install::install(&dir, &subs, opts, install::prompt_stdin)? {
        Outcome::Done(path) => println!("Installed launcher to {}", path.display()),
        Outcome::DryRun(path) => println!("Dry run: would install launcher to {}", path.display()),
        Outcome::Cancelled => anyhow::bail!("Installation cancelled"),
        Outcome::NotInstalled(_) => {}
    }
    Ok(())
}

fn run_uninstall(args: UninstallArgs) -> anyhow::Result<()> {
    let dir = install::scripts_dir()?;
    let opts = UninstallOptions {
        confirm: args.confirm,
        dry_run: args.dry_run,
    };
    match install::uninstall(&dir, opts, install::prompt_stdin)? {
        Outcome::Done(path) => println!("Removed launcher {}", path.display()),
        Outcome::DryRun(path) => println!("Dry run: would remove {}", path.display()),
        Outcome::Cancelled => println!("Uninstallation cancelled"),
        Outcome::NotInstalled(path) => println!("No launcher installed at {}", path.display()),
    }
    Ok(())
}
