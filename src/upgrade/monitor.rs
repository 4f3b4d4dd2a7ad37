//! Reload monitoring.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use super::log::UpgradeLog;
use super::poll::FixedPoll;
use super::types::{SlotId, StandbyStatus};
use super::{run_command, show_module};
use crate::config::UpgradeTiming;
use crate::device::session::CliSession;

/// Result of waiting for a supervisor to rejoin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorResult {
    /// Supervisor shows cold or hot standby.
    Ready { status: StandbyStatus, polls: u32 },
    /// Supervisor did not rejoin within the poll budget.
    Stalled { polls: u32 },
}

/// Poll `show module <slot>` until it reports cold or hot standby.
///
/// Only reachability and role are checked here; the running image is
/// verified separately once both supervisors are back.
pub async fn wait_for_standby<S: CliSession>(
    device: &mut S,
    log: &mut UpgradeLog,
    slot: SlotId,
    timing: &UpgradeTiming,
) -> Result<MonitorResult> {
    log.info(format!(
        "Monitoring supervisor in slot {} (every {}s, up to {} checks)",
        slot,
        timing.poll_interval.as_secs(),
        timing.max_polls
    ));

    let command = show_module(slot);
    let mut poll = FixedPoll::new(timing.poll_interval, timing.max_polls);
    let pb = create_spinner(log.is_quiet());

    loop {
        pb.set_message(format!(
            "Waiting for slot {} ({}/{} checks, {} min since reload)",
            slot,
            poll.attempts(),
            poll.max_attempts(),
            elapsed_minutes(&poll)
        ));
        let Some(attempt) = poll.tick().await else {
            break;
        };

        let out = run_command(device, log, &command).await?;
        let status = StandbyStatus::classify(&out);

        if status.is_standby() {
            pb.finish_and_clear();
            log.success(format!(
                "Supervisor in slot {} is standby {} after {} check(s)",
                slot, status, attempt
            ));
            return Ok(MonitorResult::Ready {
                status,
                polls: attempt,
            });
        }
    }

    pb.finish_and_clear();
    log.error(format!(
        "It has been {} minutes since reload and slot {} is still not standby. Giving up",
        elapsed_minutes(&poll),
        slot
    ));
    Ok(MonitorResult::Stalled {
        polls: poll.attempts(),
    })
}

fn elapsed_minutes(poll: &FixedPoll) -> u64 {
    (poll.interval() * poll.attempts()).as_secs() / 60
}

/// Spinner for long waits; hidden when console output is disabled.
pub fn create_spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::testing::{ScriptedDevice, module_status, slot};
    use tokio::time::Instant;

    fn timing() -> UpgradeTiming {
        UpgradeTiming::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_third_poll() {
        let mut device = ScriptedDevice::new("core-sw1").respond(
            "show module 6",
            [
                String::new(),
                module_status('6', "Other"),
                module_status('6', "Hot"),
            ],
        );
        let sent = device.sent();
        let mut log = UpgradeLog::quiet();

        let start = Instant::now();
        let result = wait_for_standby(&mut device, &mut log, slot('6'), &timing())
            .await
            .unwrap();

        assert_eq!(
            result,
            MonitorResult::Ready {
                status: StandbyStatus::Hot,
                polls: 3
            }
        );
        assert_eq!(sent.commands().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(180));
        assert_eq!(log.commands().count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_counts_as_ready() {
        let mut device =
            ScriptedDevice::new("core-sw1").respond("show module 6", [module_status('6', "Cold")]);
        let mut log = UpgradeLog::quiet();

        let result = wait_for_standby(&mut device, &mut log, slot('6'), &timing())
            .await
            .unwrap();

        assert_eq!(
            result,
            MonitorResult::Ready {
                status: StandbyStatus::Cold,
                polls: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_after_exactly_max_polls() {
        let mut device =
            ScriptedDevice::new("core-sw1").respond("show module 6", [module_status('6', "Other")]);
        let sent = device.sent();
        let mut log = UpgradeLog::quiet();

        let start = Instant::now();
        let result = wait_for_standby(&mut device, &mut log, slot('6'), &timing())
            .await
            .unwrap();

        assert_eq!(result, MonitorResult::Stalled { polls: 30 });
        assert_eq!(sent.commands().len(), 30);
        assert_eq!(start.elapsed(), Duration::from_secs(30 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_poll_budget() {
        let mut device = ScriptedDevice::new("core-sw1");
        let sent = device.sent();
        let mut log = UpgradeLog::quiet();
        let timing = UpgradeTiming {
            poll_interval: Duration::from_secs(5),
            max_polls: 4,
            ..UpgradeTiming::default()
        };

        let result = wait_for_standby(&mut device, &mut log, slot('6'), &timing)
            .await
            .unwrap();

        assert_eq!(result, MonitorResult::Stalled { polls: 4 });
        assert_eq!(sent.commands().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_error_propagates() {
        let mut device = ScriptedDevice::new("core-sw1").fail_on("show module 6");
        let mut log = UpgradeLog::quiet();

        let result = wait_for_standby(&mut device, &mut log, slot('6'), &timing()).await;
        assert!(result.is_err());
    }
}
