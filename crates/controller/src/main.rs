//! Sprinklr CLI
//!
//! Start, stop and watch irrigation runs from the terminal.

mod cmd_run;
mod cmd_status;
mod render;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sprinklr::clock::SystemClock;
use sprinklr::config::{Config, Overrides};
use sprinklr::paths::Paths;
use sprinklr::{logging, ControllerHandle, ControllerOptions};
use sprinklr_gateway::HttpGateway;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sprinklr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory holding config.toml and logs (default: ~/.sprinklr)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Controller API base URL, e.g. http://192.168.1.20:8000/api
    #[arg(long, global = true, env = "SPRINKLR_API_SERVER")]
    api_server: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "SPRINKLR_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the controller and print its status once
    Status,

    /// List the zones the controller knows about
    Zones,

    /// Run one zone for a number of minutes and follow the countdown
    Start {
        /// Zone number
        #[arg(long)]
        zone: u32,

        /// Whole minutes, 1 to 60
        #[arg(long, allow_hyphen_values = true)]
        minutes: String,

        /// Return as soon as the controller acknowledges the start
        #[arg(long)]
        detach: bool,
    },

    /// Stop the active run
    Stop,

    /// Follow the controller status until Ctrl-C
    Watch,

    /// Show the last zone run and the last scheduled run
    LastRun,

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "sprinklr", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::resolve(cli.data_dir.as_deref())?;
    paths.ensure_dirs()?;
    let config = Config::load(
        &paths.config_path(),
        Overrides {
            api_server: cli.api_server,
            timeout_secs: cli.timeout_secs,
            tick_millis: None,
        },
    )?;
    let logging = logging::init_logging(&paths.log_dir())?;

    info!(
        component = "cli",
        event = "cli.started",
        run_id = %logging.run_id,
        data_dir = %paths.data_dir().display(),
        api_server = %config.api_server,
        command = ?cli.command,
    );

    let gateway = HttpGateway::new(config.gateway())?;

    match cli.command {
        Command::LastRun => cmd_status::last_run(&gateway).await,
        Command::Status => cmd_status::status(&connect(gateway, &config)).await,
        Command::Zones => cmd_status::zones(&connect(gateway, &config)).await,
        Command::Start {
            zone,
            minutes,
            detach,
        } => cmd_run::start(&connect(gateway, &config), zone, &minutes, detach).await,
        Command::Stop => cmd_run::stop(&connect(gateway, &config)).await,
        Command::Watch => cmd_run::watch(&connect(gateway, &config)).await,
        Command::Completions { .. } => Ok(()),
    }
}

fn connect(gateway: HttpGateway, config: &Config) -> ControllerHandle {
    ControllerHandle::spawn(
        gateway,
        SystemClock,
        ControllerOptions { tick: config.tick },
    )
}
