use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_medic::artifacts::{RunContext, RunStatus};
use fleet_medic::bridge::executor::CommandBridge;
use fleet_medic::config::FleetConfig;
use fleet_medic::*;
use std::path::PathBuf;

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NO_RETRY: i32 = 3;
const EXIT_SIGINT: i32 = 130;

#[derive(Parser)]
#[command(name = "fleet-medic")]
#[command(about = "Health probing and escalating recovery for a fleet of test devices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "FLEET_MEDIC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory that receives one sub-directory per run
    #[arg(long, global = true)]
    runs_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every configured device once and print the result
    Status,

    /// Probe every device; fails only when the whole fleet is down
    Ping,

    /// Pre-check, escalate recovery for failed devices, post-check
    Recover,
}

impl Commands {
    fn job_name(&self) -> &'static str {
        match self {
            Commands::Status => "status",
            Commands::Ping => "ping",
            Commands::Recover => "recover",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_signal_handlers() {
        eprintln!("Error: failed to install signal handler: {:#}", e);
        std::process::exit(EXIT_USAGE);
    }

    let config = match FleetConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_USAGE);
        }
    };

    let code = match run(&cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILED
        }
    };

    std::process::exit(code);
}

/// Run the selected job and map its outcome to an exit code.
/// The logging guard lives in here so buffered file output is flushed on return.
async fn run(cli: &Cli, mut config: FleetConfig) -> Result<i32> {
    if let Some(runs_dir) = &cli.runs_dir {
        config.runs_dir = runs_dir.clone();
    }

    let bridge = CommandBridge::new(&config.bridge_program);

    if let Commands::Status = cli.command {
        let _logging = logging::init(cli.debug, None).context("failed to initialise logging")?;
        print_status(&bridge, &config).await;
        return Ok(EXIT_OK);
    }

    let job = cli.command.job_name();
    let context = RunContext::create(&config.runs_dir, job)
        .with_context(|| format!("failed to create run directory under {}", config.runs_dir.display()))?;
    let _logging =
        logging::init(cli.debug, Some(context.run_dir())).context("failed to initialise logging")?;

    tracing::info!(
        run_id = %context.run_id(),
        run_dir = %context.run_dir().display(),
        bridge = %config.bridge_program.display(),
        "Starting {} run",
        job
    );

    let artifacts = context.artifacts();
    let outcome = match cli.command {
        Commands::Ping => HealthProber::new(
            &bridge,
            &config.devices,
            config.bridge_timeout(),
            &artifacts,
        )
        .run()
        .await
        .map(|_| ()),
        Commands::Recover => RecoveryOrchestrator::from_config(&bridge, &config, &artifacts)
            .run()
            .await
            .map(|_| ()),
        Commands::Status => Ok(()),
    };

    let code = match &outcome {
        Ok(()) => {
            context.finish(RunStatus::Success, false, None)?;
            tracing::info!("✅ {} run finished", job);
            EXIT_OK
        }
        Err(e) => {
            context.finish(RunStatus::Failed, e.no_retry(), Some(e.to_string()))?;
            tracing::error!(no_retry = e.no_retry(), "❌ {} run failed: {}", job, e);
            if let Some(failed) = e.failed_devices() {
                print_failed_devices(failed);
            }
            if e.no_retry() {
                EXIT_NO_RETRY
            } else {
                EXIT_FAILED
            }
        }
    };

    Ok(code)
}

async fn print_status(bridge: &CommandBridge, config: &FleetConfig) {
    if config.devices.is_empty() {
        println!("No devices configured.");
        return;
    }

    let classifier = StatusClassifier::new(bridge, config.bridge_timeout());
    println!("{:<24} {:<24} STATUS", "ID", "NAME");
    for device in &config.devices {
        let status = classifier.classify(&device.id).await;
        println!("{:<24} {:<24} {}", device.id, device.name, status);
    }
}

fn print_failed_devices(failed: &FailedDevices) {
    eprintln!("failedDeviceIds:      {}", failed.failed_device_ids);
    eprintln!("failedDeviceNames:    {}", failed.failed_device_names);
    eprintln!("failedDeviceStatuses: {}", failed.failed_device_statuses);
    eprintln!("noRetry:              {}", failed.no_retry);
}

// First SIGINT asks the running job to stop escalating; a second one exits.
fn setup_signal_handlers() -> Result<()> {
    use signal_hook::{consts::SIGINT, iterator::Signals};

    let mut signals = Signals::new([SIGINT])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig != SIGINT {
                continue;
            }
            if fleet_medic::is_interrupted() {
                eprintln!("\nSecond interrupt, exiting now.");
                std::process::exit(EXIT_SIGINT);
            }
            eprintln!("\n\n🛑 Interrupt received! Finishing the current step...");
            eprintln!("   Post-check and artifacts will still be written. Press Ctrl+C again to abort.");
            fleet_medic::set_interrupted();
        }
    });

    Ok(())
}
