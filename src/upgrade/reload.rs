//! Standby supervisor reload.

use anyhow::Result;

use super::log::UpgradeLog;
use super::types::{SlotId, StandbyStatus};
use super::{run_command, run_confirm, show_module};
use crate::device::session::CliSession;

/// Result of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadResult {
    /// Reset issued and confirmed.
    Issued,
    /// Module was not hot standby; nothing was reset.
    NotReady(StandbyStatus),
}

/// Reset the supervisor in `slot`, but only if it currently shows hot standby.
pub async fn reload_supervisor<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    slot: SlotId,
) -> Result<ReloadResult> {
    log.step(format!("Reloading supervisor in slot {}", slot));
    log.info(format!("Ensuring module {} is in standby hot", slot));

    let out = run_command(device, log, &show_module(slot)).await?;
    if !out.contains("(Hot)") {
        let status = StandbyStatus::classify(&out);
        log.error(format!(
            "Unable to verify module {} is standby hot (status: {})",
            slot, status
        ));
        return Ok(ReloadResult::NotReady(status));
    }

    run_command(device, log, &format!("hw-module module {} reset", slot)).await?;
    run_confirm(device, log, "y").await?;
    log.success(format!("Reset issued for module {}", slot));

    Ok(ReloadResult::Issued)
}
