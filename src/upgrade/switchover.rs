//! Forced supervisor switchover.

use anyhow::Result;
use tracing::debug;

use super::log::UpgradeLog;
use super::types::{SlotId, StandbyStatus};
use super::{run_command, show_module};
use crate::device::session::CliSession;
use crate::operator::{Decision, Operator, ask_token};

pub const PROCEED_TOKEN: &str = "proceed";
pub const ABORT_TOKEN: &str = "abort";

/// Result of the switchover step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchoverResult {
    /// Switchover sent; the session is expected to drop.
    Initiated,
    /// Operator typed the abort token.
    Declined,
    /// Standby was not cold or hot; the operator was not asked.
    StandbyNotReady(StandbyStatus),
}

/// Confirm the standby can take over, ask the operator and force the
/// switchover.
///
/// An operator input error is treated as abort.
pub async fn force_switchover<S, O>(
    device: &mut S,
    log: &mut UpgradeLog,
    operator: &mut O,
    standby_slot: SlotId,
) -> Result<SwitchoverResult>
where
    S: CliSession,
    O: Operator + ?Sized,
{
    log.step("Forcing supervisor switchover");
    log.info("Checking supervisor status...");

    let out = run_command(device, log, &show_module(standby_slot)).await?;
    let status = StandbyStatus::classify(&out);
    if !status.is_standby() {
        log.error(format!(
            "Standby supervisor not ready (status: {}). Exiting",
            status
        ));
        return Ok(SwitchoverResult::StandbyNotReady(status));
    }

    log.success(format!(
        "Supervisor in slot {} is standby {}. Ready to force switchover",
        standby_slot, status
    ));
    log.warn("This will disconnect the upgrade session and cause DOWN TIME on the switch");
    log.info(format!(
        "Type '{}' to force the switchover and accept the outage, or '{}' to stop the upgrade",
        PROCEED_TOKEN, ABORT_TOKEN
    ));

    let decision = match ask_token(operator, "====>", PROCEED_TOKEN, ABORT_TOKEN) {
        Ok(decision) => decision,
        Err(e) => {
            log.warn(format!("No answer from operator ({}), treating as abort", e));
            Decision::Abort
        }
    };

    match decision {
        Decision::Proceed => {
            log.info("Initiating forced switchover NOW");
            log.info("The session will be lost until the device can be reached again");
            let sent = device.send_command("redundancy force-switchover").await;
            record_tolerating_loss(log, "redundancy force-switchover", sent);
            let confirmed = device.confirm("y").await;
            record_tolerating_loss(log, "y", confirmed);
            Ok(SwitchoverResult::Initiated)
        }
        Decision::Abort => {
            log.warn("OK. Exiting the upgrade");
            log.warn(
                "The boot variable is already set to the new image on both supervisors \
                 and the supervisors may be running different versions of code",
            );
            log.warn("This needs to be fixed manually");
            Ok(SwitchoverResult::Declined)
        }
    }
}

/// The device drops the session while switching over; errors are logged and
/// swallowed.
fn record_tolerating_loss(log: &mut UpgradeLog, command: &str, result: Result<String>) {
    match result {
        Ok(output) => log.record(command, &output),
        Err(e) => {
            debug!("'{}' ended the session: {}", command, e);
            log.record(command, &format!("<session lost: {}>", e));
        }
    }
}
