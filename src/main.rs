use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use supervisor_core::supervisor::RoleStatus;
use supervisor_core::{AppRegistry, Role, Supervisor, SupervisorConfig};
use vr_supervisor::{logging, Autorun, AutorunStatus, FileConfig, SystemHost};

#[derive(Parser)]
#[command(name = "vrsup")]
#[command(about = "Starts a VR session in dependency order and keeps it running")]
struct Cli {
    /// Config file (default: <config dir>/vr-supervisor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to a file (default: <data dir>/vr-supervisor.log)
    #[arg(long, global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the one-shot startup sequence
    RunStartup {
        /// Skip the initial settle delay
        #[arg(long)]
        no_delay: bool,
    },
    /// Monitor and recover the applications until interrupted
    Monitor {
        /// Run the startup sequence first
        #[arg(long)]
        with_startup: bool,
    },
    /// Show resolved paths, liveness and autorun state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the startup sequence at login
    InstallAutorun,
    /// Remove the login entry
    UninstallAutorun,
}

#[derive(Serialize)]
struct StatusOutput {
    checked_at: chrono::DateTime<chrono::Utc>,
    roles: Vec<RoleStatus>,
    autorun: Option<AutorunStatus>,
}

fn build_supervisor(config: &FileConfig, settings: SupervisorConfig) -> Supervisor {
    let registry = AppRegistry::resolve(config.applications());
    if registry.available_roles().is_empty() {
        tracing::warn!("No supervised application was found on this machine");
    }
    Supervisor::new(registry, settings, Box::new(SystemHost::new()))
}

/// Run `job` on a blocking thread, raising the shutdown flag on Ctrl-C.
async fn run_supervised<T, F>(mut supervisor: Supervisor, job: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Supervisor) -> anyhow::Result<T> + Send + 'static,
{
    let shutdown = supervisor.shutdown_flag();
    let mut task = tokio::task::spawn_blocking(move || job(&mut supervisor));

    tokio::select! {
        result = &mut task => result.context("Supervisor thread panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutdown requested, stopping within a second");
            shutdown.trigger();
            task.await.context("Supervisor thread panicked")?
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(Some(path)) => Some(path),
        Some(None) => Some(logging::default_log_path()?),
        None => None,
    };
    logging::init_tracing(log_file.as_deref())?;

    let config = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::RunStartup { no_delay } => {
            let mut settings = config.supervisor.clone();
            if no_delay {
                settings.startup_delay_secs = 0;
            }
            let supervisor = build_supervisor(&config, settings);
            let report = run_supervised(supervisor, |s| Ok(s.run_startup())).await?;

            if report.cancelled {
                tracing::info!("Startup cancelled");
            } else if !report.success() {
                anyhow::bail!("Startup incomplete: {} running", report.tally());
            }
        }
        Commands::Monitor { with_startup } => {
            let supervisor = build_supervisor(&config, config.supervisor.clone());
            run_supervised(supervisor, move |s| {
                if with_startup {
                    s.run_startup();
                }
                s.monitor().context("Monitoring aborted")
            })
            .await?;
        }
        Commands::Status { json } => {
            let supervisor = build_supervisor(&config, config.supervisor.clone());
            let roles = supervisor.status().context("Failed to read process table")?;
            let autorun = match Autorun::default_location() {
                Ok(autorun) => Some(autorun.status()),
                Err(e) => {
                    tracing::warn!(error = %e, "Autorun location unknown");
                    None
                }
            };
            let output = StatusOutput {
                checked_at: chrono::Utc::now(),
                roles,
                autorun,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_status(&output);
            }
        }
        Commands::InstallAutorun => {
            let exe = std::env::current_exe().context("Failed to locate the vrsup executable")?;
            let path = Autorun::default_location()?.install(&exe)?;
            println!("Autorun installed: {}", path.display());
        }
        Commands::UninstallAutorun => {
            let autorun = Autorun::default_location()?;
            if autorun.uninstall()? {
                println!("Autorun removed: {}", autorun.entry_path().display());
            } else {
                println!("Autorun was not installed");
            }
        }
    }

    Ok(())
}

fn print_status(output: &StatusOutput) {
    for status in &output.roles {
        let role: Role = status.application.role;
        let path = status
            .application
            .resolved_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unavailable".into());
        let state = if status.alive { "running" } else { "stopped" };
        println!("{:<17} {:<8} {}", role.display_name(), state, path);
    }
    match &output.autorun {
        Some(autorun) if autorun.installed => println!("Autorun: installed ({})", autorun.path.display()),
        Some(_) => println!("Autorun: not installed"),
        None => println!("Autorun: unknown"),
    }
}
