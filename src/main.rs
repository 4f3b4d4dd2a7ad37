//! iosup - IOS upgrade support CLI tool.
//!
//! Interactive tool for upgrading dual-supervisor chassis switches:
//! - Boot variable change on both supervisors
//! - Standby supervisor reload and monitoring
//! - Operator-confirmed forced switchover
//! - Reconnection and final image verification

mod config;
mod device;
mod error;
mod image;
mod operator;
mod output;
mod upgrade;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, warn};

use config::{Args, Config, UpgradeKind};
use device::session::{CliSession, Connector, DeviceTarget, ensure_privileged};
use device::ssh::{SshConnector, askpass_reply};
use error::IosupError;
use image::parse_directory_listing;
use operator::TerminalOperator;
use output::{print_image_table, print_summary, save_log};
use upgrade::log::UpgradeLog;
use upgrade::monitor::create_spinner;
use upgrade::orchestrator::{UpgradeOrchestrator, UpgradeSession};
use upgrade::run_command;

#[tokio::main]
async fn main() {
    // ssh runs this binary as SSH_ASKPASS to collect the password.
    if let Some(reply) = askpass_reply() {
        println!("{}", reply);
        return;
    }

    let args = Args::parse();
    let config = Config::from_args(args);

    // Initialize logging
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting iosup - IOS Upgrade Support Tool");

    match run(&config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Interactive mode step names.
const STEPS: &[&str] = &[
    "Select Upgrade Type",
    "Device Information",
    "Connect",
    "Select Image",
    "Upgrade",
];

/// Prints a step header in "Phase [current/total]: name" format.
fn print_step(index: usize) {
    println!();
    println!(
        "{}",
        format!("Phase [{}/{}]: {}", index + 1, STEPS.len(), STEPS[index])
            .cyan()
            .bold()
    );
}

/// Main application logic. Returns the process exit code.
async fn run(config: &Config) -> Result<i32> {
    print_banner();

    // Step 1: Select Upgrade Type
    print_step(0);
    let kind = select_kind(config)?;
    if !kind.is_implemented() {
        println!(
            "{}",
            format!("NOTE: {} upgrade not implemented yet. Sorry.", kind).yellow()
        );
        return Err(IosupError::UnsupportedUpgrade(kind.to_string()).into());
    }
    debug!("Selected upgrade type: {}", kind);

    // Step 2: Device Information
    print_step(1);
    let target = DeviceTarget {
        host: prompt_or(config.host.clone(), "IP address of device to upgrade")?,
        port: config.port,
    };
    let username = prompt_or(config.username.clone(), "User name")?;
    let password = match &config.password {
        Some(password) => password.expose_secret().to_string(),
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()?,
    };
    let enable_secret = config
        .enable_secret
        .as_ref()
        .map(|secret| SecretString::from(secret.expose_secret().to_string()));

    let connector = SshConnector::new(
        username,
        SecretString::from(password),
        enable_secret,
        config.command_timeout,
        config.ssh_options.clone(),
    );

    // Step 3: Connect
    print_step(2);
    let pb = create_spinner(false);
    pb.set_message(format!("Connecting to {}...", target));
    let connected = connector.connect(&target).await;
    pb.finish_and_clear();
    let mut device = connected?;

    println!(
        "Connected to: {} at IP: {}",
        device.hostname().bold(),
        target.host
    );
    if ensure_privileged(&mut device).await? {
        println!("  {} Entered enable mode", "✓".green());
    } else {
        println!("  {} Enable mode verified", "✓".green());
    }

    let mut log = UpgradeLog::new();
    let clock = run_command(&mut device, &mut log, "show clock").await?;
    debug!("Device clock: {}", clock.trim());

    // Step 4: Select Image
    print_step(3);
    let boot_image = select_image(&mut device, &mut log, config).await?;
    println!();
    println!("Will upgrade to {}", boot_image.bold());

    // Step 5: Upgrade
    print_step(4);
    let session = UpgradeSession::new(device, boot_image, log);
    let mut operator = TerminalOperator;
    let mut orchestrator = UpgradeOrchestrator::new(
        &connector,
        target.clone(),
        &mut operator,
        config.timing.clone(),
    );
    let report = orchestrator.run(session).await;

    print_summary(&report);

    if config.save_log {
        match save_log(&report, &target.host, config.log_format, Path::new(".")) {
            Ok(path) => println!("Upgrade log saved to {}", path.display().to_string().bold()),
            Err(e) => warn!("Could not save upgrade log: {:#}", e),
        }
    }

    Ok(report.exit_code())
}

fn print_banner() {
    println!();
    println!("{}", "-".repeat(58));
    println!("|{:^56}|", "IOS Upgrade Tool");
    println!("{}", "-".repeat(58));
}

/// Upgrade kind from `--kind` or an interactive menu.
fn select_kind(config: &Config) -> Result<UpgradeKind> {
    if let Some(kind) = config.kind {
        return Ok(kind);
    }

    let items: Vec<&str> = UpgradeKind::ALL.iter().map(|k| k.label()).collect();
    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Please select the type of upgrade you're doing")
        .items(&items)
        .default(1)
        .interact()?;

    Ok(UpgradeKind::ALL[idx])
}

/// Use a configured value or ask for it.
fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("value must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(answer.trim().to_string())
}

/// List the `.bin` files of the primary filesystem and return the boot path
/// of the chosen one.
async fn select_image<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    config: &Config,
) -> Result<String> {
    let listing = parse_directory_listing(&run_command(device, log, "dir").await?)?;
    print_image_table(&listing);

    let image = match &config.image {
        Some(name) => listing
            .find(name)
            .ok_or_else(|| IosupError::ImageNotFound(name.clone()))?,
        None => {
            let items: Vec<&str> = listing.images.iter().map(|i| i.name.as_str()).collect();
            let idx = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select the file to upgrade to")
                .items(&items)
                .default(0)
                .interact()?;
            &listing.images[idx]
        }
    };
    let boot_image = listing.boot_path(image);

    println!();
    println!(
        "{}",
        "Please ensure this image has been copied to all other supervisors."
            .yellow()
            .bold()
    );

    let show_all = config.list_all_filesystems
        || Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Would you like to see a listing of all file systems?")
            .default(false)
            .interact()?;
    if show_all {
        let all = run_command(device, log, "dir all-filesystems").await?;
        println!("{}", all);
    }

    Ok(boot_image)
}
