use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gpdd::cli::{Cli, Commands, StartArgs};
use gpdd::{
    launcher, spawn_signal_adapter, Config, HealthMonitor, IpcClient, IpcServer, IpcState,
    LogWriter, OsSpawner, RunFiles, Supervisor,
};

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gpdd=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start(args) => run_start(args).await,
        Commands::Reload => run_reload().await,
        Commands::Stop => run_stop().await,
        Commands::Status => run_status().await,
    }
}

async fn run_start(args: StartArgs) -> ExitCode {
    if args.daemon {
        return match launcher::daemonize(&args) {
            Ok(pid) => {
                println!("gpdd started in background (pid {pid})");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("gpdd: {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    match start_supervisor(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("supervisor failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Wires the collaborators around the supervisor: run files, IPC surface,
/// signal adapter, optional health monitor. Aux tasks live until the
/// supervisor's command loop returns.
async fn start_supervisor(args: StartArgs) -> Result<()> {
    let cfg = build_config(&args);
    let app = std::fs::canonicalize(&args.app).unwrap_or_else(|_| args.app.clone());
    let dir = std::env::current_dir().context("cannot resolve working directory")?;

    let files = RunFiles::acquire(&dir)?;

    let spawner = Arc::new(OsSpawner::new(app.clone()));
    let (mut sup, handle) = Supervisor::new(
        cfg.clone(),
        app.clone(),
        spawner,
        vec![Arc::new(LogWriter)],
    );

    let ipc = IpcServer::bind(
        cfg.ipc_port,
        IpcState {
            app_file: app.display().to_string(),
            started_at: sup.started_at(),
            registry: sup.registry(),
            commands: handle.clone(),
        },
    )
    .await?;
    files.publish_port(ipc.port())?;

    tracing::info!(
        app = %app.display(),
        workers = cfg.workers,
        ipc_port = ipc.port(),
        "gpdd master starting"
    );

    let token = CancellationToken::new();
    let ipc_task = ipc.serve(token.clone());
    spawn_signal_adapter(handle.clone(), token.clone());
    if let Some(url) = cfg.health_url.clone() {
        HealthMonitor::new(
            url,
            cfg.health_interval,
            cfg.health_threshold,
            handle.clone(),
            sup.bus(),
        )
        .spawn(token.clone());
    }

    let result = sup.run().await;

    token.cancel();
    let _ = ipc_task.await;
    drop(files);

    result.map_err(Into::into)
}

fn build_config(args: &StartArgs) -> Config {
    let mut cfg = Config::from_env();
    if let Some(workers) = args.workers.filter(|w| *w > 0) {
        cfg.workers = workers;
    }
    if let Some(url) = &args.ready_url {
        cfg.ready_url = Some(url.clone());
    }
    if let Some(url) = &args.health_url {
        cfg.health_url = Some(url.clone());
    }
    if let Some(ms) = args.health_interval {
        cfg.health_interval = Duration::from_millis(ms);
    }
    if let Some(n) = args.health_threshold {
        cfg.health_threshold = n;
    }
    cfg
}

async fn run_reload() -> ExitCode {
    match try_reload().await {
        Ok(()) => {
            println!("reload requested");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("gpdd: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_reload() -> Result<()> {
    ipc_client()?.reload().await
}

async fn run_stop() -> ExitCode {
    match try_stop().await {
        Ok(()) => {
            println!("stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("gpdd: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_stop() -> Result<()> {
    ipc_client()?.stop().await
}

async fn run_status() -> ExitCode {
    let outcome = async { ipc_client()?.status().await }.await;
    match outcome {
        Ok(Some(status)) => match serde_json::to_string_pretty(&status) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("gpdd: {err}");
                ExitCode::FAILURE
            }
        },
        Ok(None) => {
            println!("no running instance");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("gpdd: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn ipc_client() -> Result<IpcClient> {
    let dir = std::env::current_dir().context("cannot resolve working directory")?;
    IpcClient::new(dir)
}
