//! CLI session contract consumed by the upgrade workflow.

use anyhow::Result;

/// Address of the device being upgraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.port == 22 {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// A connected command-line session on a network device.
///
/// Commands are strictly request/response: each call waits for the device to
/// return to a prompt (or ask for confirmation) before returning its output.
#[allow(async_fn_in_trait)]
pub trait CliSession {
    /// Hostname reported by the device prompt.
    fn hostname(&self) -> &str;

    /// Send a command and return the device response.
    async fn send_command(&mut self, command: &str) -> Result<String>;

    /// Answer a pending `[confirm]` with a single keystroke.
    ///
    /// No line terminator follows the keystroke; IOS would read one as an
    /// extra empty command and print a second prompt.
    async fn confirm(&mut self, answer: &str) -> Result<String>;

    /// True when the session is in privileged (enable) mode.
    fn is_privileged(&self) -> bool;

    /// Enter privileged mode.
    async fn elevate(&mut self) -> Result<()>;

    /// Enter global configuration mode.
    async fn enter_config(&mut self) -> Result<String>;

    /// Leave configuration mode.
    async fn exit_config(&mut self) -> Result<String>;
}

/// Opens sessions to a device with fixed credentials.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: CliSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session>;
}

/// Make sure the session is in enable mode, elevating once if needed.
pub async fn ensure_privileged<S: CliSession>(session: &mut S) -> Result<bool> {
    if session.is_privileged() {
        return Ok(false);
    }
    session.elevate().await?;
    Ok(true)
}
