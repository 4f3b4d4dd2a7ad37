//! Table formatting for CLI output.

use colored::Colorize;
use tabled::settings::Style;
use tabled::settings::themes::Theme;
use tabled::{Table, Tabled};

use crate::image::{DirectoryListing, format_size};
use crate::upgrade::log::NoteLevel;
use crate::upgrade::orchestrator::UpgradeReport;
use crate::upgrade::types::Outcome;

/// Row for the image selection table.
#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "FILE")]
    name: String,
    #[tabled(rename = "SIZE")]
    size: String,
}

/// Row for the final summary table.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "ITEM")]
    item: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Print the `.bin` files of the primary filesystem, numbered from 1.
pub fn print_image_table(listing: &DirectoryListing) {
    println!(
        "{} {}",
        ".bin files available in primary file system".bold(),
        listing.filesystem.cyan()
    );
    println!("{}", image_table(listing));
}

fn image_table(listing: &DirectoryListing) -> String {
    let rows: Vec<ImageRow> = listing
        .images
        .iter()
        .enumerate()
        .map(|(i, image)| ImageRow {
            index: i + 1,
            name: image.name.clone(),
            size: image
                .size
                .map(format_size)
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(&rows);
    apply_table_style(&mut table);
    table.to_string()
}

/// Print the final upgrade summary.
pub fn print_summary(report: &UpgradeReport) {
    println!();
    println!("{}", "Upgrade Summary:".bold());
    println!("{}", summary_table(report, true));

    if report.needs_remediation() {
        println!();
        println!(
            "{}",
            "The device configuration was changed but the upgrade did not complete."
                .yellow()
                .bold()
        );
        println!(
            "{}",
            "Check the boot variable and the running image on both supervisors.".yellow()
        );
    }
}

fn summary_table(report: &UpgradeReport, color: bool) -> String {
    let outcome = match (report.outcome, color) {
        (Outcome::Success, true) => report.outcome.to_string().green().to_string(),
        (Outcome::Aborted, true) => report.outcome.to_string().yellow().to_string(),
        (Outcome::Failed, true) => report.outcome.to_string().red().to_string(),
        _ => report.outcome.to_string(),
    };

    let slot = |s: Option<crate::upgrade::types::SlotId>| {
        s.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
    };

    let mut rows = vec![
        SummaryRow {
            item: "Device",
            value: report.hostname.clone(),
        },
        SummaryRow {
            item: "Boot image",
            value: report.boot_image.clone(),
        },
        SummaryRow {
            item: "Outcome",
            value: outcome,
        },
        SummaryRow {
            item: "Device state",
            value: report.device_state.to_string(),
        },
        SummaryRow {
            item: "Active slot",
            value: slot(report.active_slot),
        },
        SummaryRow {
            item: "Standby slot",
            value: format!("{} ({})", slot(report.standby_slot), report.standby_status),
        },
        SummaryRow {
            item: "Commands sent",
            value: report.log.commands().count().to_string(),
        },
        SummaryRow {
            item: "Warnings",
            value: report
                .log
                .notes()
                .filter(|(level, _)| *level == NoteLevel::Warning)
                .count()
                .to_string(),
        },
    ];

    if let Some(reason) = &report.failure {
        rows.push(SummaryRow {
            item: "Reason",
            value: reason.to_string(),
        });
    }

    let mut table = Table::new(&rows);
    apply_table_style(&mut table);
    table.to_string()
}

fn apply_table_style(table: &mut Table) {
    use tabled::settings::object::Columns;
    use tabled::settings::{Modify, Padding};

    let mut theme = Theme::from_style(Style::empty());
    theme.remove_horizontal_lines();
    table.with(theme);
    table.with(Modify::new(Columns::new(..)).with(Padding::new(0, 2, 0, 0)));
}
