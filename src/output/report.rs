//! Upgrade log rendering and persistence.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::{LogFormat, VERSION};
use crate::upgrade::log::{LogEntry, NoteLevel};
use crate::upgrade::orchestrator::UpgradeReport;

/// Render the upgrade log as plain text.
pub fn render_text(report: &UpgradeReport) -> Result<String> {
    let mut out = String::with_capacity(8192);

    write_header(&mut out, report)?;
    write_entries(&mut out, report)?;
    write_footer(&mut out, report)?;

    Ok(out)
}

/// Saved JSON document: the report plus the tool version.
#[derive(Serialize)]
struct JsonLog<'a> {
    tool: &'static str,
    version: &'static str,
    generated_at: DateTime<Local>,
    #[serde(flatten)]
    report: &'a UpgradeReport,
}

/// Render the upgrade report and log as pretty-printed JSON.
pub fn render_json(report: &UpgradeReport) -> Result<String> {
    let doc = JsonLog {
        tool: "iosup",
        version: VERSION,
        generated_at: Local::now(),
        report,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn render(report: &UpgradeReport, format: LogFormat) -> Result<String> {
    match format {
        LogFormat::Text => render_text(report),
        LogFormat::Json => render_json(report),
    }
}

/// Save the upgrade log to `dir`.
///
/// Filename format: `iosup-{host}-{YYYYMMDD-HHMMSS}.{txt|json}`
pub fn save_log(
    report: &UpgradeReport,
    host: &str,
    format: LogFormat,
    dir: &Path,
) -> Result<PathBuf> {
    let content = render(report, format)?;
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!(
        "iosup-{}-{}.{}",
        sanitize(host),
        timestamp,
        format.extension()
    );
    let path = dir.join(filename);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write upgrade log to {}", path.display()))?;
    let path = path.canonicalize().unwrap_or(path);
    Ok(path)
}

// ---------------------------------------------------------------------------
// Text sections
// ---------------------------------------------------------------------------

fn write_header(out: &mut String, report: &UpgradeReport) -> Result<()> {
    writeln!(out, "=======Upgrade Log======")?;
    if let Some(clock) = start_time(report) {
        writeln!(out, " Start Time: {}", clock)?;
    }
    writeln!(out, " Device: {}", report.hostname)?;
    writeln!(out, " Boot image: {}", report.boot_image)?;
    writeln!(out)?;
    Ok(())
}

fn write_entries(out: &mut String, report: &UpgradeReport) -> Result<()> {
    for entry in report.log.entries() {
        match entry {
            LogEntry::Command { at, command, output } => {
                writeln!(out, "[{}] {}# {}", at.format("%H:%M:%S"), report.hostname, command)?;
                for line in output.lines() {
                    writeln!(out, "{}", line)?;
                }
            }
            LogEntry::Note { at, level, message } => {
                writeln!(
                    out,
                    "[{}] {:<7} {}",
                    at.format("%H:%M:%S"),
                    level_label(*level),
                    message
                )?;
            }
        }
    }
    Ok(())
}

fn write_footer(out: &mut String, report: &UpgradeReport) -> Result<()> {
    writeln!(out)?;
    writeln!(out, " Outcome: {}", report.outcome)?;
    if let Some(reason) = &report.failure {
        writeln!(out, " Reason: {}", reason)?;
    }
    writeln!(out, " Device state: {}", report.device_state)?;
    let phases: Vec<String> = report.phases.iter().map(|p| p.to_string()).collect();
    writeln!(out, " Phases: {}", phases.join(" -> "))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Device clock captured at the start of the session.
fn start_time(report: &UpgradeReport) -> Option<&str> {
    report.log.entries().iter().find_map(|e| match e {
        LogEntry::Command {
            command, output, ..
        } if command == "show clock" => Some(output.trim()),
        _ => None,
    })
}

fn level_label(level: NoteLevel) -> &'static str {
    match level {
        NoteLevel::Step => "STEP",
        NoteLevel::Info => "INFO",
        NoteLevel::Success => "OK",
        NoteLevel::Warning => "WARN",
        NoteLevel::Error => "ERROR",
    }
}

/// Make a host name or address safe for use in a file name.
fn sanitize(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
