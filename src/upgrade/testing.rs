//! Scripted fakes for the device session, connector and operator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use super::types::SlotId;
use crate::device::session::{CliSession, Connector, DeviceTarget};
use crate::error::IosupError;
use crate::operator::Operator;

/// Commands sent to a [`ScriptedDevice`], shared so tests can inspect them
/// after the device has been moved into the code under test.
#[derive(Debug, Clone, Default)]
pub struct SentCommands(Arc<Mutex<Vec<String>>>);

impl SentCommands {
    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, command: &str) {
        self.0.lock().unwrap().push(command.to_string());
    }
}

/// Fake CLI session answering commands from a script.
///
/// Each command has a queue of responses; the last one repeats. Unknown
/// commands answer with an empty string.
#[derive(Debug)]
pub struct ScriptedDevice {
    hostname: String,
    responses: HashMap<String, VecDeque<String>>,
    privileged: bool,
    fail_on: HashSet<String>,
    disconnect_after: Option<String>,
    disconnected: bool,
    sent: SentCommands,
}

impl ScriptedDevice {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            responses: HashMap::new(),
            privileged: true,
            fail_on: HashSet::new(),
            disconnect_after: None,
            disconnected: false,
            sent: SentCommands::default(),
        }
    }

    pub fn respond<I>(mut self, command: &str, responses: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.responses.insert(
            command.to_string(),
            responses.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Start in user EXEC mode.
    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    /// `command` fails with a closed session.
    pub fn fail_on(mut self, command: &str) -> Self {
        self.fail_on.insert(command.to_string());
        self
    }

    /// Every command after `command` fails with a closed session.
    pub fn disconnect_after(mut self, command: &str) -> Self {
        self.disconnect_after = Some(command.to_string());
        self
    }

    pub fn sent(&self) -> SentCommands {
        self.sent.clone()
    }

    fn answer(&mut self, command: &str) -> String {
        match self.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => String::new(),
        }
    }
}

impl CliSession for ScriptedDevice {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        if self.disconnected {
            return Err(IosupError::SessionClosed.into());
        }
        self.sent.push(command);
        if self.fail_on.contains(command) {
            return Err(IosupError::SessionClosed.into());
        }
        if self.disconnect_after.as_deref() == Some(command) {
            self.disconnected = true;
        }
        Ok(self.answer(command))
    }

    async fn confirm(&mut self, answer: &str) -> Result<String> {
        self.send_command(answer).await
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    async fn elevate(&mut self) -> Result<()> {
        self.sent.push("enable");
        self.privileged = true;
        Ok(())
    }

    async fn enter_config(&mut self) -> Result<String> {
        self.send_command("configure terminal").await
    }

    async fn exit_config(&mut self) -> Result<String> {
        self.send_command("end").await
    }
}

/// Hands out scripted devices in order, one per connect.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    devices: Mutex<VecDeque<ScriptedDevice>>,
    connects: Mutex<Vec<DeviceTarget>>,
}

impl ScriptedConnector {
    pub fn new<I: IntoIterator<Item = ScriptedDevice>>(devices: I) -> Self {
        Self {
            devices: Mutex::new(devices.into_iter().collect()),
            connects: Mutex::new(Vec::new()),
        }
    }

    /// Targets passed to `connect`, in order.
    pub fn connects(&self) -> Vec<DeviceTarget> {
        self.connects.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedDevice;

    async fn connect(&self, target: &DeviceTarget) -> Result<ScriptedDevice> {
        self.connects.lock().unwrap().push(target.clone());
        self.devices.lock().unwrap().pop_front().ok_or_else(|| {
            IosupError::Connection(target.host.clone(), "Connection timed out".to_string())
                .into()
        })
    }
}

/// Operator answering prompts from a script and recording each prompt.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Operator for ScriptedOperator {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for prompt '{}'", prompt))
    }
}

pub fn slot(c: char) -> SlotId {
    SlotId::from_status_line(&c.to_string()).unwrap()
}

/// `show module <slot>` output with the given redundancy label
/// (`Hot`, `Cold`, `Other`).
pub fn module_status(slot: char, label: &str) -> String {
    format!(
        "Chassis Type : WS-C4507R+E\n\
         \n\
         Mod Ports Card Type                              Model              Serial No.\n\
         ---+-----+--------------------------------------+------------------+-----------\n \
         {slot}     4  Sup 7-E 10GE (SFP+), 1000BaseX (SFP)  WS-X45-SUP7-E      CAT1720L0AB\n\
         \n\
         Mod  Redundancy role     Operating mode      Redundancy status\n\
         ----+-------------------+-------------------+----------------------------------\n \
         {slot}   Standby Supervisor  SSO                 Standby ({label})"
    )
}

/// `show redundancy | include ...` line for a location.
pub fn location_line(role: &str, slot: char) -> String {
    format!("       {role} Location = slot {slot}")
}

/// Both `show bootvar` lines pointing at `image`.
pub fn bootvar_lines(active: &str, standby: &str) -> String {
    format!("BOOT variable = {active},12;\nStandby BOOT variable = {standby},12;")
}

/// `show version` output for a running image.
pub fn show_version(image: &str) -> String {
    format!(
        "Cisco IOS Software, IOS-XE Software, Catalyst 4500 L3 Switch Software\n\
         ROM: 15.1(1r)SG5\n\
         core-sw1 uptime is 2 weeks, 3 days, 4 hours, 12 minutes\n\
         System image file is \"{image}\""
    )
}
