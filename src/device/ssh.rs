//! OpenSSH-backed CLI session.
//!
//! Spawns the system `ssh` client with a forced TTY and drives the device CLI
//! over its stdin/stdout. The login password is handed to ssh through
//! `SSH_ASKPASS`, which points back at this binary (see [`askpass_reply`]).

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::prompt::{
    ResponseEnd, clean_response, detect_end, hostname_from_prompt, is_config_prompt,
    is_privileged_prompt, last_line, normalize,
};
use super::session::{CliSession, Connector, DeviceTarget};
use crate::error::IosupError;

/// Environment variable carrying the password to the askpass invocation.
pub const ASKPASS_ENV: &str = "IOSUP_ASKPASS_SECRET";

/// Time allowed for the login banner and first prompt.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Quiet period used to discard unsolicited output before a write.
const DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// Answer an askpass request when this process was started by ssh.
///
/// Returns `None` for a normal invocation.
pub fn askpass_reply() -> Option<String> {
    let secret = std::env::var(ASKPASS_ENV).ok()?;
    let prompt = std::env::args().nth(1).unwrap_or_default();
    Some(reply_for_prompt(&prompt, secret))
}

fn reply_for_prompt(prompt: &str, secret: String) -> String {
    let lower = prompt.to_lowercase();
    if lower.contains("yes/no") {
        // Never accept unknown host keys on behalf of the operator.
        "no".to_string()
    } else {
        secret
    }
}

/// Opens [`SshSession`]s with fixed credentials.
pub struct SshConnector {
    client: Vec<String>,
    username: String,
    password: SecretString,
    enable_secret: Option<SecretString>,
    command_timeout: Duration,
    ssh_options: Vec<String>,
}

impl SshConnector {
    pub fn new(
        username: String,
        password: SecretString,
        enable_secret: Option<SecretString>,
        command_timeout: Duration,
        ssh_options: Vec<String>,
    ) -> Self {
        Self {
            client: vec!["ssh".to_string()],
            username,
            password,
            enable_secret,
            command_timeout,
            ssh_options,
        }
    }

    /// Run another client program in place of `ssh`; the first element is
    /// the program, the rest are leading arguments.
    #[cfg(test)]
    fn with_client(mut self, client: Vec<String>) -> Self {
        self.client = client;
        self
    }

    /// Arguments passed to the ssh client.
    fn ssh_args(&self, target: &DeviceTarget) -> Vec<String> {
        let mut args = vec![
            "-tt".to_string(),
            "-p".to_string(),
            target.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "NumberOfPasswordPrompts=1".to_string(),
            "-o".to_string(),
            "PreferredAuthentications=keyboard-interactive,password".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
        ];
        for option in &self.ssh_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("-l".to_string());
        args.push(self.username.clone());
        args.push(target.host.clone());
        args
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<SshSession> {
        let askpass = std::env::current_exe().context("Failed to locate iosup binary")?;
        let (program, leading) = self
            .client
            .split_first()
            .context("No ssh client configured")?;
        let args = self.ssh_args(target);
        debug!("Executing: {} {}", self.client.join(" "), args.join(" "));

        let mut child = Command::new(program)
            .args(leading)
            .args(&args)
            .env("SSH_ASKPASS", askpass)
            .env("SSH_ASKPASS_REQUIRE", "force")
            .env(ASKPASS_ENV, self.password.expose_secret())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to execute ssh")?;

        let stdin = child.stdin.take().context("ssh stdin not captured")?;
        let stdout = child.stdout.take().context("ssh stdout not captured")?;
        let stderr = child.stderr.take();

        let mut session = SshSession {
            host: target.host.clone(),
            child,
            stdin,
            stdout,
            stderr,
            hostname: target.host.clone(),
            prompt: String::new(),
            awaiting_input: false,
            enable_secret: SecretString::from(
                self.enable_secret
                    .as_ref()
                    .unwrap_or(&self.password)
                    .expose_secret()
                    .to_string(),
            ),
            command_timeout: self.command_timeout,
        };

        let banner = match session.read_response("login", LOGIN_TIMEOUT).await {
            Ok((banner, ResponseEnd::Prompt)) => banner,
            Ok((_, ResponseEnd::Input)) => {
                return Err(IosupError::Authentication(
                    target.host.clone(),
                    "device asked for credentials again".to_string(),
                )
                .into());
            }
            Err(e) => return Err(session.login_error(e).await),
        };

        session.set_prompt(last_line(&banner));
        debug!(
            "Connected to {} (prompt: {})",
            session.hostname, session.prompt
        );

        session.send_command("terminal length 0").await?;
        Ok(session)
    }
}

/// Interactive CLI session over an ssh child process.
pub struct SshSession {
    host: String,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    hostname: String,
    prompt: String,
    /// The last response stopped at a `[confirm]` or password question.
    awaiting_input: bool,
    enable_secret: SecretString,
    command_timeout: Duration,
}

impl SshSession {
    fn set_prompt(&mut self, line: &str) {
        self.prompt = line.trim_end().to_string();
        self.hostname = hostname_from_prompt(&self.prompt);
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_raw(format!("{line}\n").as_bytes()).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.drain_pending().await?;
        self.stdin
            .write_all(bytes)
            .await
            .map_err(|_| IosupError::SessionClosed)?;
        self.stdin
            .flush()
            .await
            .map_err(|_| IosupError::SessionClosed)?;
        Ok(())
    }

    /// Discard output nobody asked for, such as a repeated prompt, so it is
    /// not read as the response to the next command.
    async fn drain_pending(&mut self) -> Result<()> {
        let mut chunk = [0u8; 4096];
        loop {
            match tokio::time::timeout(DRAIN_WINDOW, self.stdout.read(&mut chunk)).await {
                Err(_) => return Ok(()),
                Ok(Ok(0)) => return Err(IosupError::SessionClosed.into()),
                Ok(Ok(n)) => {
                    let stale = normalize(&String::from_utf8_lossy(&chunk[..n]));
                    debug!("Discarding unsolicited output: {:?}", stale);
                    if let Some(ResponseEnd::Prompt) = detect_end(&stale) {
                        self.set_prompt(last_line(&stale));
                    }
                }
                Ok(Err(e)) => return Err(e).context("Failed to read from ssh"),
            }
        }
    }

    /// Read a response and remember where it stopped.
    async fn read_reply(&mut self, operation: &str) -> Result<String> {
        let (raw, end) = self.read_response(operation, self.command_timeout).await?;
        self.awaiting_input = end == ResponseEnd::Input;
        if end == ResponseEnd::Prompt {
            self.set_prompt(last_line(&raw));
        }
        Ok(raw)
    }

    /// Read until the device shows a prompt or asks for input.
    async fn read_response(
        &mut self,
        operation: &str,
        timeout: Duration,
    ) -> Result<(String, ResponseEnd)> {
        let deadline = Instant::now() + timeout;
        let mut buffer = String::new();
        let mut chunk = [0u8; 4096];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let read = tokio::time::timeout(remaining, self.stdout.read(&mut chunk)).await;

            let n = match read {
                Ok(Ok(0)) => return Err(IosupError::SessionClosed.into()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e).context("Failed to read from ssh"),
                Err(_) => {
                    return Err(IosupError::Timeout {
                        operation: operation.to_string(),
                        details: format!("no prompt within {} seconds", timeout.as_secs()),
                    }
                    .into());
                }
            };

            buffer.push_str(&normalize(&String::from_utf8_lossy(&chunk[..n])));
            trace!("Read {} bytes ({} buffered)", n, buffer.len());

            if let Some(end) = detect_end(&buffer) {
                return Ok((buffer, end));
            }
        }
    }

    /// Turn a failed login read into a classified error using ssh stderr.
    async fn login_error(&mut self, err: anyhow::Error) -> anyhow::Error {
        let _ = tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await;

        let mut stderr_text = String::new();
        if let Some(mut stderr) = self.stderr.take() {
            let _ = tokio::time::timeout(
                Duration::from_secs(1),
                stderr.read_to_string(&mut stderr_text),
            )
            .await;
        }

        if stderr_text.trim().is_empty() {
            err
        } else {
            IosupError::ssh(&self.host, &stderr_text).into()
        }
    }
}

impl CliSession for SshSession {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        debug!("Sending command: {}", command);
        self.write_line(command).await?;

        let raw = self.read_reply(command).await?;
        Ok(clean_response(&raw, command))
    }

    async fn confirm(&mut self, answer: &str) -> Result<String> {
        if !self.awaiting_input {
            debug!("No confirmation pending, not sending '{}'", answer);
            return Ok(String::new());
        }
        debug!("Answering confirmation with '{}'", answer);
        self.write_raw(answer.as_bytes()).await?;

        let raw = self.read_reply(answer).await?;
        Ok(clean_response(&raw, answer))
    }

    fn is_privileged(&self) -> bool {
        is_privileged_prompt(&self.prompt)
    }

    async fn elevate(&mut self) -> Result<()> {
        debug!("Entering enable mode on {}", self.hostname);
        self.write_line("enable").await?;
        let (raw, end) = self.read_response("enable", self.command_timeout).await?;

        let raw = if end == ResponseEnd::Input {
            let secret = self.enable_secret.expose_secret().to_string();
            self.write_line(&secret).await?;
            self.read_response("enable password", self.command_timeout)
                .await?
                .0
        } else {
            raw
        };

        let line = last_line(&raw).to_string();
        self.set_prompt(&line);
        self.awaiting_input = false;
        if !self.is_privileged() {
            return Err(IosupError::Elevation(format!("prompt is still '{}'", self.prompt)).into());
        }
        Ok(())
    }

    async fn enter_config(&mut self) -> Result<String> {
        let output = self.send_command("configure terminal").await?;
        if !is_config_prompt(&self.prompt) {
            anyhow::bail!(
                "Failed to enter configuration mode (prompt: {})",
                self.prompt
            );
        }
        Ok(output)
    }

    async fn exit_config(&mut self) -> Result<String> {
        let output = self.send_command("end").await?;
        if is_config_prompt(&self.prompt) {
            anyhow::bail!(
                "Failed to exit configuration mode (prompt: {})",
                self.prompt
            );
        }
        Ok(output)
    }
}
