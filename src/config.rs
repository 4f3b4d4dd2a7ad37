//! CLI configuration and argument parsing.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// IOS upgrade support CLI tool.
///
/// Sets the boot variable, reloads the standby supervisor, forces a
/// switchover and verifies both supervisors run the new image.
#[derive(Parser, Debug, Clone)]
#[command(name = "iosup")]
#[command(about = "IOS upgrade support CLI tool for dual-supervisor chassis switches")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Type of device being upgraded (prompted when omitted)
    #[arg(short, long, value_enum)]
    pub kind: Option<UpgradeKind>,

    /// IP address or hostname of the device
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// SSH port
    #[arg(long, default_value = "22")]
    pub port: u16,

    /// Login user name
    #[arg(short, long, env = "IOSUP_USERNAME")]
    pub username: Option<String>,

    /// Login password (prompted when omitted)
    #[arg(long, env = "IOSUP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Enable secret (defaults to the login password)
    #[arg(long, env = "IOSUP_ENABLE_SECRET", hide_env_values = true)]
    pub enable_secret: Option<String>,

    /// Image file to upgrade to, as listed by 'dir' (prompted when omitted)
    #[arg(short, long)]
    pub image: Option<String>,

    /// Print 'dir all-filesystems' after image selection
    #[arg(long, default_value = "false")]
    pub list_all_filesystems: bool,

    /// Seconds to wait after saving the configuration
    #[arg(long, default_value = "22")]
    pub save_wait_secs: u64,

    /// Seconds between supervisor status polls
    #[arg(long, default_value = "60")]
    pub poll_interval_secs: u64,

    /// Maximum number of supervisor status polls
    #[arg(long, default_value = "30")]
    pub max_polls: u32,

    /// Seconds to wait after switchover before reconnecting
    #[arg(long, default_value = "300")]
    pub reconnect_wait_secs: u64,

    /// Extra OpenSSH client option, repeatable (e.g. -o KexAlgorithms=+diffie-hellman-group14-sha1)
    #[arg(short = 'o', long = "ssh-option")]
    pub ssh_options: Vec<String>,

    /// Seconds to wait for a command response
    #[arg(long, default_value = "120")]
    pub command_timeout_secs: u64,

    /// Save the upgrade log to the current directory
    #[arg(long, default_value = "false")]
    pub save_log: bool,

    /// Format of the saved upgrade log
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "IOSUP_LOG_LEVEL")]
    pub log_level: String,
}

/// Type of upgrade to perform.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeKind {
    /// Standalone router or switch with one supervisor
    Standalone,
    /// Chassis switch with two supervisors
    MultiSup,
    /// Stack of switches
    Stack,
}

impl UpgradeKind {
    /// All kinds in menu order.
    pub const ALL: [UpgradeKind; 3] = [
        UpgradeKind::Standalone,
        UpgradeKind::MultiSup,
        UpgradeKind::Stack,
    ];

    /// Menu label for the interactive selection.
    pub fn label(&self) -> &'static str {
        match self {
            UpgradeKind::Standalone => "Standalone router or switch with one supervisor",
            UpgradeKind::MultiSup => "Chassis switch with two supervisors",
            UpgradeKind::Stack => "Stack of switches",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, UpgradeKind::MultiSup)
    }
}

impl std::fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeKind::Standalone => write!(f, "Standalone"),
            UpgradeKind::MultiSup => write!(f, "Multi-supervisor"),
            UpgradeKind::Stack => write!(f, "Stack"),
        }
    }
}

/// Format of the saved upgrade log.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Text => "txt",
            LogFormat::Json => "json",
        }
    }
}

/// Fixed waits used by the upgrade workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeTiming {
    /// Wait after 'write memory' before reading the boot variable back.
    pub save_settle: Duration,
    /// Interval between supervisor status polls.
    pub poll_interval: Duration,
    /// Maximum number of polls before a reload is considered stalled.
    pub max_polls: u32,
    /// Wait after switchover before reconnecting.
    pub reconnect_settle: Duration,
}

impl Default for UpgradeTiming {
    fn default() -> Self {
        Self {
            save_settle: Duration::from_secs(22),
            poll_interval: Duration::from_secs(60),
            max_polls: 30,
            reconnect_settle: Duration::from_secs(300),
        }
    }
}

impl UpgradeTiming {
    /// Upper bound of a single monitor run, for display.
    pub fn max_monitor_wait(&self) -> Duration {
        self.poll_interval * self.max_polls
    }
}

/// Application configuration derived from CLI args.
#[derive(Debug)]
pub struct Config {
    pub kind: Option<UpgradeKind>,
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub enable_secret: Option<SecretString>,
    pub image: Option<String>,
    pub list_all_filesystems: bool,
    pub timing: UpgradeTiming,
    pub command_timeout: Duration,
    pub ssh_options: Vec<String>,
    pub save_log: bool,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl Config {
    /// Create config from CLI arguments.
    pub fn from_args(args: Args) -> Self {
        let timing = UpgradeTiming {
            save_settle: Duration::from_secs(args.save_wait_secs),
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            max_polls: args.max_polls,
            reconnect_settle: Duration::from_secs(args.reconnect_wait_secs),
        };

        Self {
            kind: args.kind,
            host: args.host.filter(|h| !h.trim().is_empty()),
            port: args.port,
            username: args.username.filter(|u| !u.trim().is_empty()),
            password: args.password.map(SecretString::from),
            enable_secret: args.enable_secret.map(SecretString::from),
            image: args.image,
            list_all_filesystems: args.list_all_filesystems,
            timing,
            command_timeout: Duration::from_secs(args.command_timeout_secs),
            ssh_options: args.ssh_options,
            save_log: args.save_log,
            log_format: args.log_format,
            log_level: args.log_level,
        }
    }
}
