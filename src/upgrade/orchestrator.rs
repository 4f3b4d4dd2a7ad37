//! Multi-supervisor upgrade state machine.
//!
//! Each phase runs one component and its result picks the next phase. Any
//! transport error ends the run as `Failed`; nothing is retried.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::bootvar::set_boot_variable;
use super::log::UpgradeLog;
use super::monitor::{MonitorResult, create_spinner, wait_for_standby};
use super::redundancy;
use super::reload::{ReloadResult, reload_supervisor};
use super::switchover::{SwitchoverResult, force_switchover};
use super::types::{DeviceState, FailureReason, Outcome, RedundancyReport, SlotId, StandbyStatus};
use super::verify::{FinalCheck, final_check};
use crate::config::UpgradeTiming;
use crate::device::session::{CliSession, Connector, DeviceTarget, ensure_privileged};
use crate::operator::{Decision, Operator, ask_token};

pub const START_TOKEN: &str = "upgrade";
pub const CANCEL_TOKEN: &str = "abort";

/// Phase of the upgrade state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    ConfigureBoot,
    Analyze,
    ReloadStandby { active: SlotId, standby: SlotId },
    MonitorStandby { active: SlotId, standby: SlotId },
    Switchover { active: SlotId, standby: SlotId },
    Reconnect { former_active: SlotId, former_standby: SlotId },
    AnalyzeAfterSwitchover { former_active: SlotId, former_standby: SlotId },
    MonitorFormerActive { former_active: SlotId },
    FinalCheck,
    Done(Outcome),
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::ConfigureBoot => write!(f, "ConfigureBoot"),
            Self::Analyze => write!(f, "Analyze"),
            Self::ReloadStandby { standby, .. } => write!(f, "ReloadStandby(slot {})", standby),
            Self::MonitorStandby { standby, .. } => write!(f, "MonitorStandby(slot {})", standby),
            Self::Switchover { standby, .. } => write!(f, "Switchover(slot {})", standby),
            Self::Reconnect { .. } => write!(f, "Reconnect"),
            Self::AnalyzeAfterSwitchover { .. } => write!(f, "AnalyzeAfterSwitchover"),
            Self::MonitorFormerActive { former_active } => {
                write!(f, "MonitorFormerActive(slot {})", former_active)
            }
            Self::FinalCheck => write!(f, "FinalCheck"),
            Self::Done(outcome) => write!(f, "Done({})", outcome),
        }
    }
}

/// State of one upgrade run. Owns the device session and the log.
pub struct UpgradeSession<S> {
    device: S,
    boot_image: String,
    log: UpgradeLog,
    active_slot: Option<SlotId>,
    standby_slot: Option<SlotId>,
    standby_status: StandbyStatus,
    outcome: Outcome,
    device_state: DeviceState,
    failure: Option<FailureReason>,
}

impl<S: CliSession> UpgradeSession<S> {
    pub fn new(device: S, boot_image: impl Into<String>, log: UpgradeLog) -> Self {
        Self {
            device,
            boot_image: boot_image.into(),
            log,
            active_slot: None,
            standby_slot: None,
            standby_status: StandbyStatus::Unknown,
            outcome: Outcome::Pending,
            device_state: DeviceState::Untouched,
            failure: None,
        }
    }

    /// Replace slot facts with a fresh analysis.
    fn apply(&mut self, report: &RedundancyReport) {
        self.active_slot = report.active;
        self.standby_slot = report.standby;
        self.standby_status = report.standby_status;
    }

    fn finish(&mut self, outcome: Outcome, failure: Option<FailureReason>) -> Phase {
        debug_assert_eq!(self.outcome, Outcome::Pending, "outcome set twice");
        self.outcome = outcome;
        self.failure = failure;
        Phase::Done(outcome)
    }

    fn fail(&mut self, reason: FailureReason) -> Phase {
        self.finish(Outcome::Failed, Some(reason))
    }

    fn abort(&mut self, reason: FailureReason) -> Phase {
        self.finish(Outcome::Aborted, Some(reason))
    }
}

/// Result of a finished upgrade run.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub hostname: String,
    pub boot_image: String,
    pub outcome: Outcome,
    pub failure: Option<FailureReason>,
    pub device_state: DeviceState,
    /// Slot facts from the last analysis.
    pub active_slot: Option<SlotId>,
    pub standby_slot: Option<SlotId>,
    pub standby_status: StandbyStatus,
    pub phases: Vec<Phase>,
    pub log: UpgradeLog,
}

impl UpgradeReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Device was changed but not fully upgraded.
    pub fn needs_remediation(&self) -> bool {
        !self.is_success() && self.device_state.is_inconsistent()
    }
}

/// Drives an [`UpgradeSession`] from `Init` to `Done`.
pub struct UpgradeOrchestrator<'a, C, O: ?Sized> {
    connector: &'a C,
    target: DeviceTarget,
    operator: &'a mut O,
    timing: UpgradeTiming,
}

impl<'a, C, O> UpgradeOrchestrator<'a, C, O>
where
    C: Connector,
    O: Operator + ?Sized,
{
    pub fn new(
        connector: &'a C,
        target: DeviceTarget,
        operator: &'a mut O,
        timing: UpgradeTiming,
    ) -> Self {
        Self {
            connector,
            target,
            operator,
            timing,
        }
    }

    /// Run the state machine to a terminal phase.
    pub async fn run(&mut self, mut session: UpgradeSession<C::Session>) -> UpgradeReport {
        let mut phase = Phase::Init;
        let mut phases = Vec::new();

        loop {
            debug!("Entering phase {}", phase);
            phases.push(phase);
            if let Phase::Done(_) = phase {
                break;
            }
            phase = match self.step(&mut session, phase).await {
                Ok(next) => next,
                Err(e) => {
                    session.log.error(format!("{:#}", e));
                    session.fail(FailureReason::Session(format!("{:#}", e)))
                }
            };
        }

        summarize(&mut session);
        info!(
            "Upgrade finished with outcome {} (device {})",
            session.outcome, session.device_state
        );

        UpgradeReport {
            hostname: session.device.hostname().to_string(),
            boot_image: session.boot_image,
            outcome: session.outcome,
            failure: session.failure,
            device_state: session.device_state,
            active_slot: session.active_slot,
            standby_slot: session.standby_slot,
            standby_status: session.standby_status,
            phases,
            log: session.log,
        }
    }

    async fn step(
        &mut self,
        session: &mut UpgradeSession<C::Session>,
        phase: Phase,
    ) -> Result<Phase> {
        let next = match phase {
            Phase::Init => {
                session.log.info(format!(
                    "Ready to begin upgrade process. Type '{}' to start or '{}' to cancel the upgrade",
                    START_TOKEN, CANCEL_TOKEN
                ));
                let decision = ask_token(&mut *self.operator, "====>", START_TOKEN, CANCEL_TOKEN)
                    .unwrap_or_else(|e| {
                        debug!("Treating operator input error as abort: {}", e);
                        Decision::Abort
                    });
                match decision {
                    Decision::Proceed => Phase::ConfigureBoot,
                    Decision::Abort => {
                        session.log.warn("Upgrade cancelled, no changes were made");
                        session.abort(FailureReason::OperatorDeclined)
                    }
                }
            }

            Phase::ConfigureBoot => {
                session.device_state = DeviceState::BootVariableChanged;
                let check = set_boot_variable(
                    &mut session.device,
                    &mut session.log,
                    &session.boot_image,
                    self.timing.save_settle,
                )
                .await?;
                if check.is_confirmed() {
                    Phase::Analyze
                } else {
                    session.log.error("Could not set boot variable");
                    session.fail(FailureReason::BootVariableNotConfirmed)
                }
            }

            Phase::Analyze => {
                let report = redundancy::analyze(&mut session.device, &mut session.log).await?;
                session.apply(&report);
                match report.slots() {
                    Some((active, standby)) => Phase::ReloadStandby { active, standby },
                    None => {
                        session
                            .log
                            .error("Could not determine both active and standby slots");
                        session.fail(FailureReason::SlotsUndetermined)
                    }
                }
            }

            Phase::ReloadStandby { active, standby } => {
                match reload_supervisor(&mut session.device, &mut session.log, standby).await? {
                    ReloadResult::Issued => {
                        session.device_state = DeviceState::StandbyReloaded;
                        Phase::MonitorStandby { active, standby }
                    }
                    ReloadResult::NotReady(status) => {
                        session.log.error("Supervisor not standby hot, reload skipped");
                        session.fail(FailureReason::StandbyNotHot(status))
                    }
                }
            }

            Phase::MonitorStandby { active, standby } => {
                match wait_for_standby(&mut session.device, &mut session.log, standby, &self.timing)
                    .await?
                {
                    MonitorResult::Ready { status, .. } => {
                        session.standby_status = status;
                        Phase::Switchover { active, standby }
                    }
                    MonitorResult::Stalled { polls } => {
                        session
                            .log
                            .error("Reloaded supervisor never came back as standby");
                        session.fail(FailureReason::ReloadStalled {
                            slot: standby,
                            polls,
                        })
                    }
                }
            }

            Phase::Switchover { active, standby } => {
                match force_switchover(
                    &mut session.device,
                    &mut session.log,
                    &mut *self.operator,
                    standby,
                )
                .await?
                {
                    SwitchoverResult::Initiated => {
                        session.device_state = DeviceState::SwitchoverIssued;
                        Phase::Reconnect {
                            former_active: active,
                            former_standby: standby,
                        }
                    }
                    SwitchoverResult::Declined => session.abort(FailureReason::SwitchoverDeclined),
                    SwitchoverResult::StandbyNotReady(status) => {
                        session.fail(FailureReason::StandbyNotReady(status))
                    }
                }
            }

            Phase::Reconnect {
                former_active,
                former_standby,
            } => {
                self.reconnect(session).await?;
                Phase::AnalyzeAfterSwitchover {
                    former_active,
                    former_standby,
                }
            }

            Phase::AnalyzeAfterSwitchover {
                former_active,
                former_standby,
            } => {
                let report = redundancy::analyze(&mut session.device, &mut session.log).await?;
                session.apply(&report);
                if report.active == Some(former_standby) {
                    session.log.success(format!(
                        "Switchover successful. Slot {} now active",
                        former_standby
                    ));
                    session.log.info(format!(
                        "Waiting for slot {} to become standby. This may take up to {} minutes",
                        former_active,
                        self.timing.max_monitor_wait().as_secs() / 60
                    ));
                    Phase::MonitorFormerActive { former_active }
                } else {
                    session.log.error(format!(
                        "Slot {} is not active after the switchover",
                        former_standby
                    ));
                    session.fail(FailureReason::SwitchoverNotEffective {
                        expected: former_standby,
                        active: report.active,
                    })
                }
            }

            Phase::MonitorFormerActive { former_active } => {
                match wait_for_standby(
                    &mut session.device,
                    &mut session.log,
                    former_active,
                    &self.timing,
                )
                .await?
                {
                    MonitorResult::Ready { status, .. } => {
                        session.standby_status = status;
                        Phase::FinalCheck
                    }
                    MonitorResult::Stalled { polls } => {
                        session
                            .log
                            .error("Could not verify the standby supervisor as ready. Please investigate");
                        session.fail(FailureReason::ReloadStalled {
                            slot: former_active,
                            polls,
                        })
                    }
                }
            }

            Phase::FinalCheck => {
                match final_check(&mut session.device, &mut session.log, &session.boot_image)
                    .await?
                {
                    FinalCheck::Passed => {
                        session.device_state = DeviceState::Upgraded;
                        session.finish(Outcome::Success, None)
                    }
                    FinalCheck::ImageMismatch => session.fail(FailureReason::ImageMismatch),
                    FinalCheck::StandbyNotHot(status) => {
                        session.fail(FailureReason::StandbyNotFullyHot(status))
                    }
                }
            }

            Phase::Done(outcome) => Phase::Done(outcome),
        };

        Ok(next)
    }

    /// Wait for the switchover to settle and open a new session.
    async fn reconnect(&mut self, session: &mut UpgradeSession<C::Session>) -> Result<()> {
        let settle = self.timing.reconnect_settle;
        session.log.step("Reconnecting after switchover");
        session.log.info(format!(
            "Waiting {} seconds before reconnecting to {}",
            settle.as_secs(),
            self.target
        ));

        let pb = create_spinner(session.log.is_quiet());
        pb.set_message(format!("Waiting for {} to come back", self.target));
        tokio::time::sleep(settle).await;
        pb.finish_and_clear();

        session.log.info("Reconnecting...");
        let mut device = self.connector.connect(&self.target).await?;
        if ensure_privileged(&mut device).await? {
            session.log.info("Entered enable mode");
        }
        session.log.success(format!(
            "Reconnected to {} at {}",
            device.hostname(),
            self.target
        ));
        session.device = device;
        Ok(())
    }
}

fn summarize<S>(session: &mut UpgradeSession<S>) {
    match session.outcome {
        Outcome::Success => session
            .log
            .success("===== Upgrade Completed successfully! ====="),
        Outcome::Aborted => session.log.warn("===== Upgrade aborted ====="),
        Outcome::Failed | Outcome::Pending => session
            .log
            .error("===== Errors were encountered during the upgrade ====="),
    }

    if let Some(reason) = &session.failure {
        let message = format!("Reason: {}", reason);
        session.log.error(message);
    }

    if session.outcome != Outcome::Success && session.device_state.is_inconsistent() {
        let message = format!(
            "Device left in an inconsistent state ({}). Manual remediation required",
            session.device_state
        );
        session.log.warn(message);
    }
}
