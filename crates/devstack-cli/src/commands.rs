use std::sync::Arc;

use crossterm::style::Stylize;

use devstack_core::models::StackConfig;
use devstack_core::output::Reporter;
use devstack_core::services::config_loader;
use devstack_core::services::entrypoint::LaravelEntrypoint;
use devstack_core::services::hooks::HookInstaller;
use devstack_core::services::image::ImageBuilder;
use devstack_core::services::orchestrator::Orchestrator;
use devstack_core::services::prerequisites::PrerequisiteChecker;
use devstack_core::services::process::SystemRunner;
use devstack_core::services::security;
use devstack_core::StackContext;

use crate::cli::{Cli, Commands, HookAction};
use crate::console::ConsoleReporter;
use crate::render;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

fn exit_code(ok: bool) -> i32 {
    if ok {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}

/// Execute the parsed command and return the process exit code.
///
/// Stack failures become exit code 1 with a message; only unexpected errors
/// (bad config, I/O) propagate to the caller.
pub async fn run(cli: Cli) -> color_eyre::Result<i32> {
    let config = config_loader::load(&cli.project_root, cli.config.as_deref())?;
    let reporter = Arc::new(ConsoleReporter::new());
    let ctx = StackContext::system(reporter.clone());
    tracing::debug!(command = ?cli.command, root = %config.project_root.display(), "dispatch");

    let code = match cli.command {
        Commands::Start {
            no_wait,
            monitoring,
            skip_prerequisites,
        } => {
            let mut orchestrator = Orchestrator::new(ctx.clone(), config, monitoring);
            match orchestrator.start_all(skip_prerequisites, !no_wait).await {
                Ok(report) => {
                    println!("\n{}", render::start(&report));
                    if !report.succeeded() {
                        let status = orchestrator.status().await?;
                        println!("\n{}", render::status(&status));
                    }
                    exit_code(report.succeeded())
                }
                Err(e) => {
                    reporter.error(&e.to_string());
                    if e.is_configuration() {
                        println!(
                            "  {}",
                            "Copy .env.example to .env and set every required variable".yellow()
                        );
                    }
                    EXIT_FAILURE
                }
            }
        }
        Commands::Stop { monitoring } => {
            exit_code(Orchestrator::new(ctx, config, monitoring).stop_all().await)
        }
        Commands::Status { monitoring, json } => {
            let report = Orchestrator::new(ctx, config, monitoring).status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render::status(&report));
            }
            EXIT_OK
        }
        Commands::Cleanup { monitoring } => {
            exit_code(Orchestrator::new(ctx, config, monitoring).cleanup_all().await)
        }
        Commands::Hooks { action } => hooks(&ctx, &config, action).await?,
        Commands::Logs {
            service,
            tail,
            follow,
        } => {
            let orchestrator = Orchestrator::new(ctx, config, true);
            exit_code(orchestrator.logs(&service, tail, follow).await?)
        }
        Commands::Restart { service } => {
            let orchestrator = Orchestrator::new(ctx, config, true);
            exit_code(orchestrator.restart(&service).await?)
        }
        Commands::Entrypoint {
            container,
            base_path,
        } => {
            let entrypoint = LaravelEntrypoint::new(&container).with_base_path(&base_path);
            match entrypoint.run(&ctx).await {
                Ok(report) => {
                    for warning in &report.warnings {
                        reporter.warn(warning);
                    }
                    EXIT_OK
                }
                Err(e) => {
                    reporter.error(&e.to_string());
                    EXIT_FAILURE
                }
            }
        }
        Commands::Scan { path } => {
            reporter.step("Starting security scan...");
            let report = security::scan(&path);
            println!("{}", render::scan(&report));
            exit_code(report.passed())
        }
        Commands::Prerequisites { quiet, fix } => {
            let check_ctx = if quiet {
                StackContext::silent(Arc::new(SystemRunner))
            } else {
                ctx
            };
            let report = PrerequisiteChecker::standard(&config)
                .check_all(&check_ctx)
                .await;
            println!("\n{}", render::prerequisites(&report));
            if fix && !(report.errors().is_empty() && report.warnings().is_empty()) {
                println!("\n{}", render::suggestions(&report));
            }
            exit_code(report.passed())
        }
        Commands::Build { tag, dockerfile } => {
            let builder = ImageBuilder::new(config.project_root.clone())
                .tag(&tag)
                .dockerfile(&dockerfile);
            exit_code(builder.build(&ctx).await?)
        }
    };
    Ok(code)
}

async fn hooks(ctx: &StackContext, config: &StackConfig, action: HookAction) -> color_eyre::Result<i32> {
    let installer = HookInstaller::new(config);
    let code = match action {
        HookAction::Install => {
            installer.install(ctx).await?;
            let status = installer.verify();
            println!("\n{}", render::hooks(&status));
            exit_code(status.is_complete())
        }
        HookAction::Verify => {
            let status = installer.verify();
            println!("{}", render::hooks(&status));
            exit_code(status.is_complete())
        }
        HookAction::Remove => {
            installer.remove().await?;
            ctx.reporter.success("Git hooks removed");
            EXIT_OK
        }
    };
    Ok(code)
}
