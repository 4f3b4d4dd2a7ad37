//! Dual-supervisor upgrade workflow.

pub mod bootvar;
pub mod log;
pub mod monitor;
pub mod orchestrator;
pub mod poll;
pub mod redundancy;
pub mod reload;
pub mod switchover;
pub mod types;
pub mod verify;

#[cfg(test)]
pub mod testing;

use anyhow::Result;

use crate::device::session::CliSession;
use log::UpgradeLog;

/// Send a command and append it with its output to the upgrade log.
pub async fn run_command<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    command: &str,
) -> Result<String> {
    let output = device.send_command(command).await?;
    log.record(command, &output);
    Ok(output)
}

/// Answer a device confirmation and record the keystroke like a command.
pub async fn run_confirm<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    answer: &str,
) -> Result<String> {
    let output = device.confirm(answer).await?;
    log.record(answer, &output);
    Ok(output)
}

/// `show module` query for a slot.
pub fn show_module(slot: types::SlotId) -> String {
    format!("show module {}", slot)
}
