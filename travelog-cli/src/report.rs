//! Command results and their console/JSON renderings.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use travelog_core::stats::{self, CountrySummary, Overview};
use travelog_core::{Entry, ErrorKind, MigrationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
}

pub trait Report: Serialize {
    /// # Errors
    /// Returns an error if the writer fails.
    fn render_console(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// # Errors
/// Returns an error if the writer fails or the report cannot be serialised.
pub fn write_report<R: Report>(
    format: ReportFormat,
    report: &R,
    out: &mut dyn Write,
) -> io::Result<()> {
    match format {
        ReportFormat::Console => report.render_console(out),
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityLine {
    pub city: String,
    pub country_code: String,
    pub visit_count: usize,
    pub total_days: i64,
    pub longest_stay: i64,
    pub max_rating: Option<u8>,
    pub average_rating: Option<f64>,
}

/// Per-city aggregates, busiest first.
#[must_use]
pub fn city_lines(entries: &[Entry]) -> Vec<CityLine> {
    let places: BTreeSet<(&str, &str)> = entries
        .iter()
        .map(|e| (e.country_code.as_str(), e.city.as_str()))
        .collect();
    let mut lines: Vec<CityLine> = places
        .into_iter()
        .map(|(code, city)| {
            let visits = stats::visit_stats(city, code, entries);
            CityLine {
                city: city.to_string(),
                country_code: code.to_string(),
                visit_count: visits.visit_count,
                total_days: visits.total_days,
                longest_stay: visits.longest_stay,
                max_rating: visits.max_rating,
                average_rating: visits.average_rating,
            }
        })
        .collect();
    lines.sort_by(|a, b| b.total_days.cmp(&a.total_days));
    lines
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub namespace: String,
    pub residence: Option<String>,
    pub overview: Overview,
    pub countries: Vec<CountrySummary>,
    pub cities: Vec<CityLine>,
}

impl Report for StatsReport {
    fn render_console(&self, out: &mut dyn Write) -> io::Result<()> {
        let o = &self.overview;
        writeln!(out, "{} {}", "Namespace:".bold(), self.namespace)?;
        writeln!(
            out,
            "{} {}",
            "Residence:".bold(),
            self.residence.as_deref().unwrap_or("(not set)")
        )?;
        writeln!(
            out,
            "{} trips, {} countries, {} cities, {} days ({} overseas)",
            o.trips.to_string().green(),
            o.countries,
            o.cities,
            o.total_days,
            o.overseas_days.to_string().yellow()
        )?;
        if !self.countries.is_empty() {
            writeln!(out, "\n{}", "Countries".cyan().bold())?;
            for c in &self.countries {
                writeln!(
                    out,
                    "  {:4} {:20} {:>3} visits {:>5} days {:>3} cities",
                    c.country_code, c.country_label, c.visit_count, c.total_days, c.city_count
                )?;
            }
        }
        if !self.cities.is_empty() {
            writeln!(out, "\n{}", "Cities".cyan().bold())?;
            for c in &self.cities {
                let rating = c
                    .average_rating
                    .map_or_else(|| "-".to_string(), |avg| format!("{avg:.1}"));
                writeln!(
                    out,
                    "  {:20} {:4} {:>3} visits {:>5} days (longest {}) rating {}",
                    c.city, c.country_code, c.visit_count, c.total_days, c.longest_stay, rating
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub namespace: String,
    pub total: usize,
    pub changed: usize,
    pub dropped: usize,
    pub written: bool,
}

impl MigrationSummary {
    #[must_use]
    pub fn new(namespace: &str, report: &MigrationReport, written: bool) -> Self {
        Self {
            namespace: namespace.to_string(),
            total: report.entries.len(),
            changed: report.changed,
            dropped: report.dropped,
            written,
        }
    }
}

impl Report for MigrationSummary {
    fn render_console(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{}: {} entries, {} normalized, {} dropped",
            self.namespace,
            self.total,
            self.changed.to_string().yellow(),
            self.dropped.to_string().red()
        )?;
        let status = if self.written {
            "written back".green()
        } else if self.changed + self.dropped == 0 {
            "already current".green()
        } else {
            "dry run, nothing written".yellow()
        };
        writeln!(out, "{status}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUsage {
    pub key: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub available: bool,
    pub total_bytes: usize,
    pub keys: Vec<KeyUsage>,
    pub errors: BTreeMap<ErrorKind, usize>,
}

impl Report for UsageReport {
    fn render_console(&self, out: &mut dyn Write) -> io::Result<()> {
        let available = if self.available {
            "available".green()
        } else {
            "unavailable".red()
        };
        writeln!(out, "{} {available}", "Storage:".bold())?;
        for usage in &self.keys {
            writeln!(out, "  {:40} {:>8}", usage.key, usage.bytes)?;
        }
        writeln!(out, "  {:40} {:>8}", "total".bold(), self.total_bytes)?;
        for (kind, count) in &self.errors {
            writeln!(out, "{} {count} {kind} error(s)", "warning:".yellow())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub namespace: String,
    pub path: String,
    pub entries: usize,
}

impl Report for TransferSummary {
    fn render_console(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{} {} entries ({}) via {}",
            "✔".green(),
            self.entries,
            self.namespace,
            self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use travelog_core::migrate_entries;

    fn entries() -> Vec<Entry> {
        let raw = vec![
            json!({"id": "1", "countryCode": "JP", "city": "Tokyo", "startDate": "2024-01-01",
                   "endDate": "2024-01-05", "companionType": "solo", "rating": 4}),
            json!({"id": "2", "countryCode": "JP", "city": "Tokyo", "startDate": "2024-05-01",
                   "endDate": "2024-05-03", "companionType": "solo", "rating": 2}),
            json!({"id": "3", "countryCode": "FR", "city": "Paris", "startDate": "2024-03-01",
                   "endDate": "2024-03-01", "companionType": "solo"}),
        ];
        migrate_entries(raw, 0).entries
    }

    #[test]
    fn city_lines_aggregate_repeat_visits() {
        let lines = city_lines(&entries());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].city, "Tokyo");
        assert_eq!(lines[0].visit_count, 2);
        assert_eq!(lines[0].total_days, 8);
        assert_eq!(lines[0].average_rating, Some(3.0));
        assert_eq!(lines[1].max_rating, None);
    }

    #[test]
    fn json_report_is_camel_case() {
        let summary = TransferSummary {
            namespace: "anonymous".into(),
            path: "out.json".into(),
            entries: 3,
        };
        let mut buf = Vec::new();
        write_report(ReportFormat::Json, &summary, &mut buf).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(doc["entries"], json!(3));
        assert_eq!(doc["namespace"], json!("anonymous"));
    }

    #[test]
    fn console_migration_summary_mentions_dry_run() {
        colored::control::set_override(false);
        let summary = MigrationSummary {
            namespace: "travelEntries".into(),
            total: 2,
            changed: 1,
            dropped: 0,
            written: false,
        };
        let mut buf = Vec::new();
        write_report(ReportFormat::Console, &summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("1 normalized"));
        assert!(text.contains("dry run"));
    }
}
