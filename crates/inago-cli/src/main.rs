mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use inago_controller::{Controller, ControllerConfig, UpdateOptions};
use inago_fleet::{FleetClient, FleetConfig, DEFAULT_ENDPOINT};
use inago_task::{TaskService, TaskServiceConfig};

use crate::commands::{App, FanOut, SUCCESS};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "inagoctl", version, about = "Orchestrate groups of unit files on fleet clusters")]
struct Cli {
    /// Endpoint used to connect to fleet
    #[arg(long, env = "INAGO_FLEET_ENDPOINT", global = true)]
    fleet_endpoint: Option<String>,

    /// Return once the task is created instead of waiting for it
    #[arg(long, global = true)]
    no_block: bool,

    /// Debug logging and ungrouped status output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default ~/.config/inago/config.toml)
    #[arg(long, env = "INAGO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a group: `<group> [scale]` or `<group>@<slice>...`
    Submit {
        #[arg(required = true)]
        args: Vec<String>,
    },

    /// Start a group or the given slices
    Start {
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Stop a group or the given slices
    Stop {
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Destroy a group or the given slices
    Destroy {
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Show the status of a group or the given slices
    Status {
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// List all groups within the fleet cluster
    List,

    /// Update a group to the unit files in its local directory
    Update {
        group: String,
        /// Slices added at a time on top of the group's size
        #[arg(long, default_value_t = 1)]
        max_growth: usize,
        /// Slices that stay running during the update
        #[arg(long, default_value_t = 1)]
        min_alive: usize,
        /// Seconds to wait for a new slice before checking it
        #[arg(long, default_value_t = 30)]
        ready_secs: u64,
    },

    /// Validate groups (default: every directory in the working directory)
    Validate { groups: Vec<String> },

    /// Submit a group, with an optional scale, and start it
    Up {
        group: String,
        scale: Option<String>,
    },

    /// Write a config file holding the defaults
    InitConfig,

    /// Print the inagoctl version
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn build_controller(cli: &Cli, cfg: &Config) -> anyhow::Result<Controller> {
    let endpoint = cli
        .fleet_endpoint
        .clone()
        .or_else(|| cfg.fleet_endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let fleet = FleetClient::new(&FleetConfig {
        endpoint,
        ..Default::default()
    })
    .context("fleet client")?;

    let mut config = ControllerConfig::new(Arc::new(fleet));
    config.task_service = TaskService::new(TaskServiceConfig {
        wait_sleep: cfg.task_wait_sleep(),
        ..Default::default()
    });
    config.group_root = std::env::current_dir().context("working directory")?;
    config.settings = cfg.controller_settings();
    Ok(Controller::new(config))
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    if let Command::Version = cli.cmd {
        println!(
            "inagoctl {} ({})",
            env!("CARGO_PKG_VERSION"),
            option_env!("INAGO_BUILD").unwrap_or("dev")
        );
        return Ok(SUCCESS);
    }

    if let Command::InitConfig = cli.cmd {
        let path = config::config_path(cli.config.as_deref())?;
        Config::default().save_to(&path)?;
        println!("Wrote {}.", path.display());
        return Ok(SUCCESS);
    }

    let cfg = Config::resolve(cli.config.as_deref())?;
    let app = App::new(build_controller(&cli, &cfg)?, cli.no_block, cli.verbose);

    let code = match cli.cmd {
        Command::Submit { args } => app.submit(&args).await,
        Command::Start { groups } => app.fan_out(FanOut::Start, &groups).await,
        Command::Stop { groups } => app.fan_out(FanOut::Stop, &groups).await,
        Command::Destroy { groups } => app.fan_out(FanOut::Destroy, &groups).await,
        Command::Status { groups } => app.status(&groups).await,
        Command::List => app.list().await,
        Command::Update {
            group,
            max_growth,
            min_alive,
            ready_secs,
        } => {
            let opts = UpdateOptions {
                max_growth,
                min_alive,
                ready_secs,
            };
            app.update(&group, opts).await
        }
        Command::Validate { groups } => app.validate(groups)?,
        Command::Up { group, scale } => app.up(&group, scale).await,
        Command::Version | Command::InitConfig => SUCCESS,
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(255)
        }
    }
}
