//! Report output: a plain-text table per course, or JSON.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use kaprogress_core::RunSummary;
use kaprogress_shared::{CourseReport, ProgressCounts, UnitSnapshot};
use serde::Serialize;

const HEADERS: [&str; 8] = [
    "Unit Title",
    "Completed Articles",
    "Unread Articles",
    "Completed Videos",
    "Unwatched Videos",
    "Completed Exercises",
    "Unmastered Exercises",
    "Status",
];

const DONE: &str = "✅";
const NEEDS_ATTENTION: &str = "❗️";
/// Terminal columns taken by either status glyph.
const STATUS_WIDTH: usize = 2;

/// Output format for `track`.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub(crate) fn render(report: &CourseReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(report)),
        OutputFormat::Json => render_json(report),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

fn row(unit: &UnitSnapshot) -> [String; 8] {
    let c = &unit.counts;
    [
        unit.unit_title.clone(),
        c.completed_articles.to_string(),
        c.unread_articles.to_string(),
        c.completed_videos.to_string(),
        c.unwatched_videos.to_string(),
        c.completed_exercises.to_string(),
        c.unmastered_exercises.to_string(),
        if unit.is_done() { DONE } else { NEEDS_ATTENTION }.to_string(),
    ]
}

/// Terminal columns a cell occupies.
fn cell_width(cell: &str) -> usize {
    if cell == DONE || cell == NEEDS_ATTENTION {
        STATUS_WIDTH
    } else {
        cell.chars().count()
    }
}

fn render_table(report: &CourseReport) -> String {
    let rows: Vec<[String; 8]> = report.units.iter().map(row).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell_width(cell));
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Progress for {}", report.title);

    let line = |out: &mut String, cells: &[&str]| {
        let mut text = String::from("|");
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            let pad = width - cell_width(cell);
            // Counts are right-aligned.
            match i {
                0 => {
                    let _ = write!(text, " {cell}{} |", " ".repeat(pad));
                }
                7 => {
                    let left = pad / 2;
                    let _ = write!(
                        text,
                        " {}{cell}{} |",
                        " ".repeat(left),
                        " ".repeat(pad - left)
                    );
                }
                _ => {
                    let _ = write!(text, " {}{cell} |", " ".repeat(pad));
                }
            }
        }
        let _ = writeln!(out, "{text}");
    };
    let rule = {
        let mut r = String::from("+");
        for w in widths {
            r.push_str(&"-".repeat(w + 2));
            r.push('+');
        }
        r
    };

    let _ = writeln!(out, "{rule}");
    line(&mut out, &HEADERS);
    let _ = writeln!(out, "{rule}");
    for r in &rows {
        let cells: Vec<&str> = r.iter().map(String::as_str).collect();
        line(&mut out, &cells);
    }
    let _ = writeln!(out, "{rule}");

    if report.skipped_units > 0 {
        let _ = writeln!(out, "({} unit(s) skipped, see log)", report.skipped_units);
    }
    out
}

/// One-line outcome of a whole run.
pub(crate) fn summary_line(summary: &RunSummary) -> String {
    let units: usize = summary.reports.iter().map(|r| r.units.len()).sum();
    let done: usize = summary.reports.iter().map(CourseReport::done_units).sum();
    format!(
        "{} course(s) reported, {} failed; {done}/{units} unit(s) done in {:.1}s",
        summary.reports.len(),
        summary.failed.len(),
        summary.elapsed.as_secs_f64()
    )
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonUnit<'a> {
    unit_title: &'a str,
    #[serde(flatten)]
    counts: ProgressCounts,
    done: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    slug: &'a str,
    course: &'a str,
    units: Vec<JsonUnit<'a>>,
    skipped_units: usize,
    generated_at: DateTime<Utc>,
}

fn render_json(report: &CourseReport) -> serde_json::Result<String> {
    let view = JsonReport {
        slug: &report.slug,
        course: &report.title,
        units: report
            .units
            .iter()
            .map(|u| JsonUnit {
                unit_title: &u.unit_title,
                counts: u.counts,
                done: u.is_done(),
            })
            .collect(),
        skipped_units: report.skipped_units,
        generated_at: report.generated_at,
    };
    serde_json::to_string_pretty(&view)
}
