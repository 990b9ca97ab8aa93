mod cli;

use m3u8dl::config;
use m3u8dl::queue::Queue;
use m3u8dl::transcode::Supervisor;
use m3u8dl_common::paths::is_remote_url;
use m3u8dl_common::Error;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::Cli;
use crossterm::cursor;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Exit status after a host shutdown signal.
const EXIT_INTERRUPTED: u8 = 130;

/// Exit status when the operand is neither a list file nor a URL.
const EXIT_USAGE: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise stay quiet so the progress
    // line is not interrupted
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "m3u8dl=debug,m3u8dl_common=debug".to_string()
        } else {
            "m3u8dl=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config::validate_config(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let supervisor = Supervisor::new(config.transcode_options(), cancel);
    let target = cli.target.as_str();
    let _cursor = CursorGuard::hide();

    if is_readable_file(Path::new(target)) {
        run_queue(Path::new(target), supervisor).await
    } else if is_remote_url(target) {
        run_single(target, &supervisor).await
    } else {
        drop(_cursor);
        Cli::command().print_help()?;
        Ok(ExitCode::from(EXIT_USAGE))
    }
}

async fn run_queue(path: &Path, mut supervisor: Supervisor) -> Result<ExitCode> {
    let mut queue =
        Queue::load(path).with_context(|| format!("Cannot open queue {:?}", path))?;

    match queue.run(&mut supervisor).await {
        Ok(summary) if summary.failed.is_empty() => {
            println!("All done.");
            Ok(ExitCode::SUCCESS)
        }
        Ok(summary) => {
            println!(
                "All done, {} of {} failed and remain in {}.",
                summary.failed.len(),
                summary.total,
                path.display()
            );
            Ok(ExitCode::FAILURE)
        }
        Err(Error::Interrupted) => {
            tracing::info!("Interrupted; {} entries left in queue", queue.len());
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_single(url: &str, supervisor: &Supervisor) -> Result<ExitCode> {
    match supervisor.run(url, "").await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(Error::Interrupted) => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Err(e) => {
            eprintln!("{}", e.report());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) and cancel running work.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}

/// Hides the terminal cursor while alive.
struct CursorGuard {
    active: bool,
}

impl CursorGuard {
    fn hide() -> Self {
        let active = std::io::stderr().is_terminal()
            && crossterm::execute!(std::io::stderr(), cursor::Hide).is_ok();
        Self { active }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = crossterm::execute!(std::io::stderr(), cursor::Show);
        }
    }
}
