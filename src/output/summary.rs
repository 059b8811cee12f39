use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::harvest::RunSummary;
use crate::record::BuildRecord;

use super::styling::{run_status, Tone};
use super::tables::{attention_cell, create_table, header};

/// Prints a human-readable summary of a scan to stderr.
///
/// Shows the overview of the run and what happened to each build directory.
/// When the harvested records are at hand (dry runs), average phase timings
/// are listed as well.
pub fn print_summary(summary: &RunSummary, records: &[BuildRecord]) {
    eprintln!("{}", render_summary(summary, records));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(
        output,
        "{} {}",
        Tone::Heading.paint(emoji),
        Tone::Heading.paint(title).underlined()
    );
}

#[allow(clippy::cast_precision_loss)]
fn average(records: &[BuildRecord], field: fn(&BuildRecord) -> f64) -> Option<f64> {
    let values: Vec<f64> = records.iter().map(field).filter(|v| *v > 0.0).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn phase_rows() -> [(&'static str, fn(&BuildRecord) -> f64); 8] {
    [
        ("build.sh", |r| r.time_build_sh),
        ("bitbake", |r| r.time_bitbake),
        ("rsync artifacts", |r| r.time_rsync_artifacts),
        ("rm BUILD", |r| r.time_rm_build),
        ("rm BUILD-ARTIFACTS", |r| r.time_rm_build_artifacts),
        ("rm downloads", |r| r.time_rm_downloads),
        ("rm sstate-cache", |r| r.time_rm_sstate),
        ("tasks from scratch", |r| r.num_of_from_scratch),
    ]
}

#[allow(clippy::cast_precision_loss)]
fn render_summary(summary: &RunSummary, records: &[BuildRecord]) -> String {
    let mut output = String::new();
    let counts = &summary.counts;

    add_section_header(&mut output, "📊", "Overview");

    let elapsed = summary.finished_at - summary.started_at;
    let (status_tone, status) = run_status(counts);

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        Tone::Muted.paint("Job:"),
        Tone::Name.paint(&summary.job),
        Tone::Muted.paint("Builds stored:"),
        Tone::Pending.paint(counts.stored),
        Tone::Muted.paint("Status:"),
        status_tone.paint(status),
        Tone::Muted.paint("Elapsed:"),
        Tone::Muted.paint(format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)),
    );

    add_section_header(&mut output, "📋", "Builds");

    let mut builds_table = create_table();
    builds_table.set_header(header(&[
        "Listed",
        "Incomplete",
        "Already stored",
        "Stored",
        "Partial",
        "Failed",
    ]));
    builds_table.add_row(vec![
        Cell::new(counts.listed),
        attention_cell(counts.incomplete, TableColor::Yellow),
        Cell::new(counts.existing).fg(TableColor::DarkGrey),
        Cell::new(counts.stored).fg(TableColor::Green),
        attention_cell(counts.partial, TableColor::Yellow),
        attention_cell(counts.failed, TableColor::Red),
    ]);
    let _ = writeln!(output, "{builds_table}\n");

    let timings: Vec<_> = phase_rows()
        .into_iter()
        .filter_map(|(label, field)| average(records, field).map(|avg| (label, avg)))
        .collect();

    if !timings.is_empty() {
        add_section_header(&mut output, "⏱️", "Average Phase Timings");

        let mut timings_table = create_table();
        timings_table.set_header(header(&["Phase", "Average"]));
        for (label, avg) in timings {
            timings_table.add_row(vec![Cell::new(label), Cell::new(format!("{avg:.1}"))]);
        }
        let _ = writeln!(output, "{timings_table}\n");
    }

    if counts.failed > 0 || counts.partial > 0 {
        add_section_header(&mut output, "💡", "Next Steps");
        let _ = writeln!(
            output,
            "  {} Run with {} to see why builds failed or fell back to defaults",
            Tone::Name.paint("•"),
            Tone::Pending.paint("RUST_LOG=warn"),
        );
    }

    output
}
