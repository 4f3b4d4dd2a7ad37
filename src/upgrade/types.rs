//! Common types for the supervisor upgrade workflow.

use serde::Serialize;

/// Single-character supervisor slot identifier (e.g. `5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotId(char);

impl SlotId {
    /// Decode the slot from the trailing character of a status line.
    pub fn from_status_line(line: &str) -> Option<Self> {
        line.trim()
            .chars()
            .next_back()
            .filter(char::is_ascii_digit)
            .map(SlotId)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Redundancy state of a standby supervisor as shown by `show module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StandbyStatus {
    #[default]
    Unknown,
    Other,
    Cold,
    Hot,
}

impl StandbyStatus {
    /// Classify module status text. Labels are checked in priority order
    /// Other, Cold, Hot; text with none of them stays `Unknown`.
    pub fn classify(text: &str) -> Self {
        if text.contains("(Other)") {
            StandbyStatus::Other
        } else if text.contains("(Cold)") {
            StandbyStatus::Cold
        } else if text.contains("(Hot)") {
            StandbyStatus::Hot
        } else {
            StandbyStatus::Unknown
        }
    }

    /// Standby has rejoined and can take over (cold or hot).
    pub fn is_standby(&self) -> bool {
        matches!(self, StandbyStatus::Cold | StandbyStatus::Hot)
    }
}

impl std::fmt::Display for StandbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StandbyStatus::Unknown => write!(f, "unknown"),
            StandbyStatus::Other => write!(f, "other"),
            StandbyStatus::Cold => write!(f, "cold"),
            StandbyStatus::Hot => write!(f, "hot"),
        }
    }
}

/// Result of one redundancy analysis. Always freshly derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedundancyReport {
    pub active: Option<SlotId>,
    pub standby: Option<SlotId>,
    pub standby_status: StandbyStatus,
}

impl RedundancyReport {
    /// Both slots known (and therefore distinct).
    pub fn slots(&self) -> Option<(SlotId, SlotId)> {
        Some((self.active?, self.standby?))
    }
}

/// Terminal result of an upgrade session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Outcome {
    #[default]
    Pending,
    Success,
    Aborted,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pending => write!(f, "Pending"),
            Outcome::Success => write!(f, "Success"),
            Outcome::Aborted => write!(f, "Aborted"),
            Outcome::Failed => write!(f, "Failed"),
        }
    }
}

/// How far the device configuration has been changed by this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum DeviceState {
    #[default]
    Untouched,
    /// Boot variable rewritten and saved on both supervisors.
    BootVariableChanged,
    /// Standby supervisor reset onto the new image.
    StandbyReloaded,
    /// Forced switchover issued; the former active is reloading.
    SwitchoverIssued,
    /// Both supervisors verified on the new image.
    Upgraded,
}

impl DeviceState {
    /// Device was changed but the upgrade did not complete.
    pub fn is_inconsistent(&self) -> bool {
        !matches!(self, DeviceState::Untouched | DeviceState::Upgraded)
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Untouched => write!(f, "untouched"),
            DeviceState::BootVariableChanged => write!(f, "boot variable changed"),
            DeviceState::StandbyReloaded => write!(f, "standby reloaded"),
            DeviceState::SwitchoverIssued => write!(f, "switchover issued"),
            DeviceState::Upgraded => write!(f, "upgraded"),
        }
    }
}

/// Why an upgrade stopped before success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// Operator declined at the initial confirmation.
    OperatorDeclined,
    /// Boot variable not confirmed on both supervisors.
    BootVariableNotConfirmed,
    /// Active/standby slots could not be determined.
    SlotsUndetermined,
    /// Standby was not hot before reload.
    StandbyNotHot(StandbyStatus),
    /// Reloaded supervisor never came back as standby.
    ReloadStalled { slot: SlotId, polls: u32 },
    /// Standby not cold/hot at switchover time.
    StandbyNotReady(StandbyStatus),
    /// Operator declined the switchover.
    SwitchoverDeclined,
    /// Previous standby is not active after reconnecting.
    SwitchoverNotEffective { expected: SlotId, active: Option<SlotId> },
    /// Running image does not contain the boot path.
    ImageMismatch,
    /// New standby did not reach hot.
    StandbyNotFullyHot(StandbyStatus),
    /// Transport or reconnection error.
    Session(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::OperatorDeclined => write!(f, "upgrade cancelled by operator"),
            FailureReason::BootVariableNotConfirmed => {
                write!(f, "boot variable not confirmed on both supervisors")
            }
            FailureReason::SlotsUndetermined => {
                write!(f, "could not determine both active and standby slots")
            }
            FailureReason::StandbyNotHot(status) => {
                write!(f, "standby supervisor is {status}, not hot; reload skipped")
            }
            FailureReason::ReloadStalled { slot, polls } => write!(
                f,
                "supervisor in slot {slot} did not return to standby after {polls} polls"
            ),
            FailureReason::StandbyNotReady(status) => {
                write!(f, "standby supervisor is {status}; switchover not issued")
            }
            FailureReason::SwitchoverDeclined => write!(f, "switchover cancelled by operator"),
            FailureReason::SwitchoverNotEffective { expected, active } => match active {
                Some(active) => write!(
                    f,
                    "switchover did not take effect: slot {active} active, expected {expected}"
                ),
                None => write!(
                    f,
                    "switchover did not take effect: active slot unknown, expected {expected}"
                ),
            },
            FailureReason::ImageMismatch => {
                write!(f, "running image does not match the upgrade boot file")
            }
            FailureReason::StandbyNotFullyHot(status) => {
                write!(f, "standby supervisor is {status}, not hot")
            }
            FailureReason::Session(msg) => write!(f, "session error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_status_line() {
        assert_eq!(
            SlotId::from_status_line("       Active Location = slot 5\n"),
            Some(SlotId('5'))
        );
        assert_eq!(
            SlotId::from_status_line("Standby Location = slot 6"),
            Some(SlotId('6'))
        );
        assert_eq!(SlotId::from_status_line("Standby Location = Not Applicable"), None);
        assert_eq!(SlotId::from_status_line(""), None);
    }

    #[test]
    fn test_classify_each_label() {
        assert_eq!(
            StandbyStatus::classify(" 6   Standby Supervisor (Other)"),
            StandbyStatus::Other
        );
        assert_eq!(
            StandbyStatus::classify(" 6   Standby Supervisor (Cold)"),
            StandbyStatus::Cold
        );
        assert_eq!(
            StandbyStatus::classify(" 6   Standby Supervisor (Hot)"),
            StandbyStatus::Hot
        );
    }

    #[test]
    fn test_classify_unclassified() {
        assert_eq!(StandbyStatus::classify(""), StandbyStatus::Unknown);
        assert_eq!(
            StandbyStatus::classify(" 6   Supervisor   Other"),
            StandbyStatus::Unknown
        );
        assert_eq!(
            StandbyStatus::classify("% Invalid input detected at '^' marker."),
            StandbyStatus::Unknown
        );
        assert_eq!(StandbyStatus::classify("standby hot"), StandbyStatus::Unknown);
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(
            StandbyStatus::classify("(Hot) (Cold) (Other)"),
            StandbyStatus::Other
        );
        assert_eq!(StandbyStatus::classify("(Hot) (Cold)"), StandbyStatus::Cold);
    }

    #[test]
    fn test_is_standby() {
        assert!(StandbyStatus::Cold.is_standby());
        assert!(StandbyStatus::Hot.is_standby());
        assert!(!StandbyStatus::Other.is_standby());
        assert!(!StandbyStatus::Unknown.is_standby());
    }

    #[test]
    fn test_redundancy_report_slots() {
        let report = RedundancyReport {
            active: Some(SlotId('5')),
            standby: None,
            standby_status: StandbyStatus::Unknown,
        };
        assert!(report.slots().is_none());

        let report = RedundancyReport {
            standby: Some(SlotId('6')),
            ..report
        };
        assert_eq!(report.slots(), Some((SlotId('5'), SlotId('6'))));
    }

    #[test]
    fn test_device_state_inconsistency() {
        assert!(!DeviceState::Untouched.is_inconsistent());
        assert!(DeviceState::BootVariableChanged.is_inconsistent());
        assert!(DeviceState::StandbyReloaded.is_inconsistent());
        assert!(DeviceState::SwitchoverIssued.is_inconsistent());
        assert!(!DeviceState::Upgraded.is_inconsistent());
        assert!(DeviceState::StandbyReloaded > DeviceState::BootVariableChanged);
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::ReloadStalled {
            slot: SlotId('6'),
            polls: 30,
        };
        assert_eq!(
            reason.to_string(),
            "supervisor in slot 6 did not return to standby after 30 polls"
        );
        assert_eq!(
            FailureReason::StandbyNotFullyHot(StandbyStatus::Cold).to_string(),
            "standby supervisor is cold, not hot"
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Pending.to_string(), "Pending");
        assert_eq!(Outcome::Success.to_string(), "Success");
        assert_eq!(Outcome::Aborted.to_string(), "Aborted");
        assert_eq!(Outcome::Failed.to_string(), "Failed");
    }
}
