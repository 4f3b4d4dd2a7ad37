//! Append-only upgrade log.
//!
//! Every command sent during the upgrade is recorded together with the device
//! output, and every operator-facing decision is recorded as a note. The same
//! notes are printed to the console as they happen.

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use tracing::{Level, debug, info, warn};

/// Severity of an operator-facing note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

/// One entry of the upgrade log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Command {
        at: DateTime<Local>,
        command: String,
        output: String,
    },
    Note {
        at: DateTime<Local>,
        level: NoteLevel,
        message: String,
    },
}

/// Ordered record of a single upgrade session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeLog {
    entries: Vec<LogEntry>,
    #[serde(skip)]
    quiet: bool,
}

impl UpgradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that records without printing to the console.
    pub fn quiet() -> Self {
        Self {
            entries: Vec::new(),
            quiet: true,
        }
    }

    /// True when notes are not printed to the console.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Record a command and its output.
    pub fn record(&mut self, command: &str, output: &str) {
        self.entries.push(LogEntry::Command {
            at: Local::now(),
            command: command.to_string(),
            output: output.to_string(),
        });
    }

    /// Commands recorded so far, in order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Command { command, .. } => Some(command.as_str()),
            LogEntry::Note { .. } => None,
        })
    }

    /// Notes recorded so far, in order.
    pub fn notes(&self) -> impl Iterator<Item = (NoteLevel, &str)> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Note { level, message, .. } => Some((*level, message.as_str())),
            LogEntry::Command { .. } => None,
        })
    }

    pub fn step(&mut self, message: impl Into<String>) {
        self.note(NoteLevel::Step, message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.note(NoteLevel::Info, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.note(NoteLevel::Success, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.note(NoteLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.note(NoteLevel::Error, message.into());
    }

    fn note(&mut self, level: NoteLevel, message: String) {
        let trace = trace_level(level, !self.quiet);
        if trace == Level::WARN {
            warn!("{}", message);
        } else if trace == Level::INFO {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }

        if !self.quiet {
            print_note(level, &message);
        }

        self.entries.push(LogEntry::Note {
            at: Local::now(),
            level,
            message,
        });
    }
}

/// Printed notes are traced at debug only, so the console never shows them
/// twice.
fn trace_level(level: NoteLevel, printed: bool) -> Level {
    match (level, printed) {
        (_, true) => Level::DEBUG,
        (NoteLevel::Warning | NoteLevel::Error, false) => Level::WARN,
        (_, false) => Level::INFO,
    }
}

fn print_note(level: NoteLevel, message: &str) {
    match level {
        NoteLevel::Step => {
            println!();
            println!("{}", message.cyan().bold());
        }
        NoteLevel::Info => println!("  {} {}", "→".cyan(), message),
        NoteLevel::Success => println!("  {} {}", "✓".green(), message),
        NoteLevel::Warning => println!("  {} {}", "⚠".yellow(), message.yellow()),
        NoteLevel::Error => println!("  {} {}", "✗".red(), message.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printed_notes_are_traced_at_debug() {
        for level in [
            NoteLevel::Step,
            NoteLevel::Info,
            NoteLevel::Success,
            NoteLevel::Warning,
            NoteLevel::Error,
        ] {
            assert_eq!(trace_level(level, true), Level::DEBUG);
        }
    }

    #[test]
    fn test_quiet_notes_keep_their_severity() {
        assert_eq!(trace_level(NoteLevel::Warning, false), Level::WARN);
        assert_eq!(trace_level(NoteLevel::Error, false), Level::WARN);
        assert_eq!(trace_level(NoteLevel::Info, false), Level::INFO);
        assert_eq!(trace_level(NoteLevel::Step, false), Level::INFO);
    }

    #[test]
    fn test_log_is_append_only_and_ordered() {
        let mut log = UpgradeLog::quiet();
        log.record("show clock", "*10:00:00 UTC Mon Oct 19 2026");
        log.info("Analyzing supervisor redundancy...");
        log.record("show module 6", "(Hot)");

        assert_eq!(log.entries().len(), 3);
        let commands: Vec<&str> = log.commands().collect();
        assert_eq!(commands, vec!["show clock", "show module 6"]);
        let notes: Vec<_> = log.notes().collect();
        assert_eq!(
            notes,
            vec![(NoteLevel::Info, "Analyzing supervisor redundancy...")]
        );
    }

    #[test]
    fn test_note_levels() {
        let mut log = UpgradeLog::quiet();
        log.step("Phase 1");
        log.success("done");
        log.warn("careful");
        log.error("broken");

        let levels: Vec<NoteLevel> = log.notes().map(|(l, _)| l).collect();
        assert_eq!(
            levels,
            vec![
                NoteLevel::Step,
                NoteLevel::Success,
                NoteLevel::Warning,
                NoteLevel::Error
            ]
        );
    }

    #[test]
    fn test_log_serializes_entries() {
        let mut log = UpgradeLog::quiet();
        log.record("show version", "Cisco IOS Software");
        log.warn("boot variable changed");

        let json = serde_json::to_value(&log).unwrap();
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["kind"], "command");
        assert_eq!(entries[0]["command"], "show version");
        assert_eq!(entries[1]["kind"], "note");
        assert_eq!(entries[1]["level"], "warning");
        assert!(json.get("quiet").is_none());
    }

    #[test]
    fn test_new_log_is_empty() {
        assert!(UpgradeLog::new().entries().is_empty());
    }
}
