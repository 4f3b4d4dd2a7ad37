//! Supervisor redundancy analysis.

use anyhow::Result;

use super::log::UpgradeLog;
use super::types::{RedundancyReport, SlotId, StandbyStatus};
use super::{run_command, show_module};
use crate::device::session::CliSession;

pub const ACTIVE_LOCATION_QUERY: &str = "show redundancy | include Active Location =";
pub const STANDBY_LOCATION_QUERY: &str = "show redundancy | include Standby Location =";

/// Determine the active and standby slots and the standby status.
///
/// Never fails on unexpected output: unknown slots stay `None` and an
/// unclassified standby stays `StandbyStatus::Unknown`.
pub async fn analyze<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
) -> Result<RedundancyReport> {
    log.info("Analyzing supervisor redundancy...");

    let active_out = run_command(device, log, ACTIVE_LOCATION_QUERY).await?;
    let standby_out = run_command(device, log, STANDBY_LOCATION_QUERY).await?;

    let active = SlotId::from_status_line(&active_out);
    let mut standby = SlotId::from_status_line(&standby_out);

    if active.is_some() && active == standby {
        log.warn(format!(
            "Active and standby both report slot {}; ignoring standby",
            standby.map(|s| s.to_string()).unwrap_or_default()
        ));
        standby = None;
    }

    let standby_status = match standby {
        Some(slot) => {
            let out = run_command(device, log, &show_module(slot)).await?;
            StandbyStatus::classify(&out)
        }
        None => StandbyStatus::Unknown,
    };

    match active {
        Some(slot) => log.info(format!("Active supervisor is in slot: {}", slot)),
        None => log.warn("Could not determine the active supervisor slot"),
    }
    match standby {
        Some(slot) => log.info(format!(
            "Standby supervisor is in slot: {} ({})",
            slot, standby_status
        )),
        None => log.warn("Could not determine the standby supervisor slot"),
    }

    Ok(RedundancyReport {
        active,
        standby,
        standby_status,
    })
}
