//! Rendering of the crawl report as a table or JSON.

use clap::ValueEnum;
use hubtop::{RepoRecord, TopImagesReport};

/// Output format for the crawl report.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as formatted tables (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// One table row; columns match the canonical record fields.
#[derive(Debug, Clone, tabled::Tabled)]
struct RecordRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Pulls")]
    pulls: String,
    #[tabled(rename = "Stars")]
    stars: u64,
    #[tabled(rename = "Last Updated")]
    last_updated: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl From<&RepoRecord> for RecordRow {
    fn from(record: &RepoRecord) -> Self {
        Self {
            name: record.name.clone(),
            owner: record.owner.clone(),
            pulls: record.pulls.clone(),
            stars: record.stars,
            last_updated: record.last_updated.clone(),
            url: record.url.clone(),
        }
    }
}

/// Print the full report in the requested format.
pub(crate) fn print_report(
    report: &TopImagesReport,
    format: OutputFormat,
) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Table => {
            print_section(
                &format!("Top {} images by pulls", report.top_by_pulls.len()),
                &report.top_by_pulls,
            );
            print_section(
                &format!("Top {} images by stars", report.top_by_stars.len()),
                &report.top_by_stars,
            );
            print_section(
                &format!("Latest {} images (by last updated)", report.latest.len()),
                &report.latest,
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

fn print_section(title: &str, records: &[RepoRecord]) {
    println!("\n{title}");
    println!("{}", "=".repeat(title.len()));

    if records.is_empty() {
        println!("(no results)");
        return;
    }

    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{table}");
}
