use clap::Parser;
use tracing_subscriber::EnvFilter;

use devstack_cli::cli::Cli;
use devstack_cli::commands;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let guard = if cli.debug {
        Some(setup_debug_logging())
    } else {
        setup_stderr_logging();
        None
    };

    let code = commands::run(cli).await?;
    // process::exit skips destructors; flush the log writer first.
    drop(guard);
    std::process::exit(code);
}

/// Configure file-based tracing to `.devstack-debug.log` in CWD.
/// Returns the guard that must be held alive for the duration of the program.
fn setup_debug_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", ".devstack-debug.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .init();

    guard
}

/// Warnings and above to stderr unless `RUST_LOG` says otherwise.
fn setup_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();
}
