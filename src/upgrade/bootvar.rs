//! Boot variable configuration and verification.

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use super::log::UpgradeLog;
use super::run_command;
use crate::device::session::CliSession;

/// Reads the active and standby boot variables, one line each.
pub const BOOTVAR_QUERY: &str = "show bootvar | include BOOT variable =";

/// Result of checking the boot variable on both supervisors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootVarCheck {
    /// Boot path present on both supervisors.
    Confirmed,
    /// Boot path missing on the active supervisor.
    ActiveMissing,
    /// Boot path missing on the standby supervisor.
    StandbyMissing,
    /// Fewer than two boot variable lines were returned.
    Incomplete { lines: usize },
}

impl BootVarCheck {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BootVarCheck::Confirmed)
    }
}

/// Check that `boot_image` is part of both the active and standby lines.
pub fn verify_boot_lines(output: &str, boot_image: &str) -> BootVarCheck {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let (active, standby) = match lines.as_slice() {
        [active, standby, ..] => (*active, *standby),
        _ => return BootVarCheck::Incomplete { lines: lines.len() },
    };

    if !active.contains(boot_image) {
        BootVarCheck::ActiveMissing
    } else if !standby.contains(boot_image) {
        BootVarCheck::StandbyMissing
    } else {
        BootVarCheck::Confirmed
    }
}

/// Replace the boot statement, save the configuration and verify the new
/// boot variable on both supervisors.
///
/// The configuration is written even when verification fails afterwards.
pub async fn set_boot_variable<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    boot_image: &str,
    save_settle: Duration,
) -> Result<BootVarCheck> {
    log.step("Setting boot variable");

    log.info("Entering config mode...");
    let output = device.enter_config().await?;
    log.record("configure terminal", &output);

    log.info("Clearing old boot variable...");
    run_command(device, log, "no boot system").await?;

    log.info(format!("Setting new boot variable to: {}", boot_image));
    run_command(device, log, &format!("boot system {}", boot_image)).await?;

    log.info("Exiting config mode...");
    let output = device.exit_config().await?;
    log.record("end", &output);

    log.info("Saving config...");
    run_command(device, log, "write memory").await?;
    debug!("Waiting {:?} for the configuration save to settle", save_settle);
    tokio::time::sleep(save_settle).await;

    log.info("Getting new boot settings...");
    let output = run_command(device, log, BOOTVAR_QUERY).await?;

    let check = verify_boot_lines(&output, boot_image);
    match &check {
        BootVarCheck::Confirmed => {
            log.success(format!("{} is in BOOT variable", boot_image));
            log.success(format!("{} is in standby BOOT variable", boot_image));
        }
        BootVarCheck::ActiveMissing => {
            log.error(format!(
                "{} is NOT in BOOT variable, aborting upgrade",
                boot_image
            ));
        }
        BootVarCheck::StandbyMissing => {
            log.success(format!("{} is in BOOT variable", boot_image));
            log.error(format!(
                "{} is NOT in standby BOOT variable, aborting upgrade",
                boot_image
            ));
        }
        BootVarCheck::Incomplete { lines } => {
            log.error(format!(
                "Expected active and standby BOOT variables, device returned {} line(s), aborting upgrade",
                lines
            ));
        }
    }

    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::testing::ScriptedDevice;

    const IMAGE: &str = "bootflash:cat4500e-universalk9.SPA.03.11.03.E.152-7.E3.bin";

    fn bootvar_output(active: &str, standby: &str) -> String {
        format!(
            "BOOT variable = {},12;\nStandby BOOT variable = {},12;",
            active, standby
        )
    }

    #[test]
    fn test_verify_both_lines() {
        let output = bootvar_output(IMAGE, IMAGE);
        assert_eq!(verify_boot_lines(&output, IMAGE), BootVarCheck::Confirmed);
    }

    #[test]
    fn test_verify_active_missing() {
        let output = bootvar_output("bootflash:old.bin", IMAGE);
        assert_eq!(verify_boot_lines(&output, IMAGE), BootVarCheck::ActiveMissing);
    }

    #[test]
    fn test_verify_standby_missing() {
        let output = bootvar_output(IMAGE, "bootflash:old.bin");
        assert_eq!(
            verify_boot_lines(&output, IMAGE),
            BootVarCheck::StandbyMissing
        );
    }

    #[test]
    fn test_verify_single_line_is_incomplete() {
        let output = format!("BOOT variable = {},12;\n\n", IMAGE);
        assert_eq!(
            verify_boot_lines(&output, IMAGE),
            BootVarCheck::Incomplete { lines: 1 }
        );
        assert!(!verify_boot_lines("", IMAGE).is_confirmed());
    }

    #[test]
    fn test_verify_is_literal_substring() {
        let output = bootvar_output("bootflash:CAT4500E.bin", "bootflash:CAT4500E.bin");
        assert!(!verify_boot_lines(&output, "bootflash:cat4500e.bin").is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_boot_variable_command_sequence() {
        let mut device = ScriptedDevice::new("core-sw1")
            .respond(BOOTVAR_QUERY, [bootvar_output(IMAGE, IMAGE)]);
        let sent = device.sent();
        let mut log = UpgradeLog::quiet();

        let check = set_boot_variable(&mut device, &mut log, IMAGE, Duration::from_secs(22))
            .await
            .unwrap();

        assert!(check.is_confirmed());
        assert_eq!(
            sent.commands(),
            vec![
                "configure terminal".to_string(),
                "no boot system".to_string(),
                format!("boot system {}", IMAGE),
                "end".to_string(),
                "write memory".to_string(),
                BOOTVAR_QUERY.to_string(),
            ]
        );
        assert_eq!(log.commands().count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_boot_variable_waits_after_save() {
        let mut device = ScriptedDevice::new("core-sw1")
            .respond(BOOTVAR_QUERY, [bootvar_output(IMAGE, IMAGE)]);
        let mut log = UpgradeLog::quiet();

        let start = tokio::time::Instant::now();
        set_boot_variable(&mut device, &mut log, IMAGE, Duration::from_secs(22))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(22));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_boot_variable_reports_standby_failure() {
        let mut device = ScriptedDevice::new("core-sw1")
            .respond(BOOTVAR_QUERY, [bootvar_output(IMAGE, "bootflash:old.bin")]);
        let mut log = UpgradeLog::quiet();

        let check = set_boot_variable(&mut device, &mut log, IMAGE, Duration::from_secs(22))
            .await
            .unwrap();

        assert_eq!(check, BootVarCheck::StandbyMissing);
        assert!(
            log.notes()
                .any(|(_, m)| m.contains("NOT in standby BOOT variable"))
        );
    }
}
