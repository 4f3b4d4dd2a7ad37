//! Final upgrade verification.

use anyhow::Result;

use super::log::UpgradeLog;
use super::redundancy;
use super::run_command;
use super::types::StandbyStatus;
use crate::device::session::CliSession;

/// Result of the final check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalCheck {
    Passed,
    /// `show version` does not contain the boot path.
    ImageMismatch,
    /// Running image matches but the standby is not hot.
    StandbyNotHot(StandbyStatus),
}

/// Check the running image and that the standby came up all the way.
pub async fn final_check<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    boot_image: &str,
) -> Result<FinalCheck> {
    log.step("Performing final check");
    log.info("Checking that the boot file is in 'show version'");

    let version = run_command(device, log, "show version").await?;
    if !version.contains(boot_image) {
        log.error("Unable to find the upgrade boot file in 'show version'. Please investigate");
        return Ok(FinalCheck::ImageMismatch);
    }
    log.success("Boot file in 'show version' matches the upgrade boot file");

    log.info("Checking for a standby hot supervisor");
    let report = redundancy::analyze(device, log).await?;
    if report.standby_status != StandbyStatus::Hot {
        log.error(format!(
            "Standby supervisor status is {}. Please investigate",
            report.standby_status
        ));
        return Ok(FinalCheck::StandbyNotHot(report.standby_status));
    }

    log.success("Verified the standby supervisor is hot");
    log.info("The standby has come up all the way and the software versions match");
    Ok(FinalCheck::Passed)
}
