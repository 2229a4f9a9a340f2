use std::{fmt::Display, path::Path};

use ansi_term::Style;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    ledger::snapshot::{
        build_rows, category_totals, summarize, DayRange, HistoryRow, StatsSnapshot, Summary,
    },
    storage::{json_store::JsonFileStore, load_ledgers},
    tracker::LEDGER_DIR,
    utils::time::{date_to_key, format_duration},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(
        long = "start",
        short,
        help = "First UTC day of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last UTC day of the range. Examples are \"today\", \"yesterday\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, help = "Print the raw snapshot as JSON instead of a table")]
    json: bool,
}

const DEFAULT_RANGE_DAYS: u32 = 7;

/// Command to process `stats`. Prints the persisted ledgers for the days between `start_date`
/// and `end_date`.
pub async fn process_stats_command(
    StatsCommand {
        start_date,
        end_date,
        date_style,
        json,
    }: StatsCommand,
    app_dir: &Path,
) -> Result<()> {
    let now = Utc::now();
    let today = now.date_naive();
    let range = parse_range(start_date, end_date, date_style, now)?;

    let store = JsonFileStore::new(app_dir.join(LEDGER_DIR))?;
    let ledgers = load_ledgers(&store).await?;
    let snapshot = StatsSnapshot {
        rows: build_rows(&ledgers.history, &date_to_key(today), 0., None),
        language_history: ledgers.language_history,
        framework_history: ledgers.framework_history,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_table(&snapshot, today, range);
    }
    Ok(())
}

/// Also provides the default range of the last week. Relative dates resolve against `now` in
/// UTC, the same zone the ledger keys use.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    now: DateTime<Utc>,
) -> Result<DayRange> {
    let end = match end_date {
        Some(v) => parse_day(&v, date_style, now, "end")?,
        None => now.date_naive(),
    };
    let start = match start_date {
        Some(v) => parse_day(&v, date_style, now, "start")?,
        None => DayRange::ending_at(end, DEFAULT_RANGE_DAYS).start,
    };
    if start > end {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start {start} is after end {end}"),
            )
            .into());
    }
    Ok(DayRange::new(start, end))
}

fn parse_day(
    value: &str,
    date_style: DateStyle,
    now: DateTime<Utc>,
    name: &str,
) -> Result<NaiveDate> {
    match parse_date_string(value, now, date_style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate {name} date {e}"),
            )
            .into()),
    }
}

fn print_table(snapshot: &StatsSnapshot, today: NaiveDate, range: DayRange) {
    let header = Style::new().bold();

    println!(
        "{}",
        header.paint(format!("Recorded time {} to {}", range.start, range.end))
    );
    let rows = rows_in_range(&snapshot.rows, range);
    if rows.is_empty() {
        println!("Nothing recorded");
    }
    for row in rows {
        println!("{}\t{}\t{}", row.date, format_duration(row.ms), row.project);
    }
    println!();

    let Summary {
        today: today_ms,
        range: range_ms,
        month,
        all,
    } = summarize(&snapshot.rows, today, range);
    println!("{}", header.paint("Summary"));
    println!("Today\t{}", format_duration(today_ms));
    println!("Range\t{}", format_duration(range_ms));
    println!("Month\t{}", format_duration(month));
    println!("All\t{}", format_duration(all));

    for (title, history) in [
        ("Languages", &snapshot.language_history),
        ("Frameworks", &snapshot.framework_history),
    ] {
        let totals = category_totals(history, range);
        if totals.is_empty() {
            continue;
        }
        println!();
        println!("{}", header.paint(title));
        for (label, ms) in totals {
            println!("{}\t{label}", format_duration(ms));
        }
    }
}

fn rows_in_range(rows: &[HistoryRow], range: DayRange) -> Vec<&HistoryRow> {
    rows.iter()
        .filter(|row| range.contains_key(&row.date))
        .collect()
}
