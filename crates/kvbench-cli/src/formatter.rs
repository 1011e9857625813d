//! Report formatting.

use clap::ValueEnum;
use comfy_table::{Cell, CellAlignment, Table};
use kvbench::Measurement;
use serde::Serialize;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Outcome of verifying one backend.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub backend: String,
    pub stored: u64,
    pub verified: u64,
    pub absent_checked: u64,
}

/// Measurement plus derived rates, as written to JSON.
#[derive(Serialize)]
struct MeasurementRow<'a> {
    #[serde(flatten)]
    measurement: &'a Measurement,
    ns_per_op: f64,
    ops_per_sec: f64,
    allocs_per_op: f64,
    bytes_per_op: f64,
}

impl<'a> From<&'a Measurement> for MeasurementRow<'a> {
    fn from(m: &'a Measurement) -> Self {
        Self {
            measurement: m,
            ns_per_op: m.ns_per_op(),
            ops_per_sec: m.ops_per_sec(),
            allocs_per_op: m.allocs_per_op(),
            bytes_per_op: m.bytes_per_op(),
        }
    }
}

pub fn format_measurements(
    measurements: &[Measurement],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<MeasurementRow<'_>> = measurements.iter().map(Into::into).collect();
            serde_json::to_string_pretty(&rows)
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec![
                "backend",
                "workload",
                "workers",
                "ops",
                "elapsed",
                "ns/op",
                "ops/s",
                "allocs/op",
                "bytes/op",
            ]);

            for m in measurements {
                table.add_row(vec![
                    Cell::new(m.backend),
                    Cell::new(m.workload.name()),
                    numeric(m.workers),
                    numeric(m.ops),
                    numeric(format!("{:.3?}", m.elapsed)),
                    numeric(format!("{:.1}", m.ns_per_op())),
                    numeric(format!("{:.0}", m.ops_per_sec())),
                    numeric(format!("{:.2}", m.allocs_per_op())),
                    numeric(format!("{:.1}", m.bytes_per_op())),
                ]);
            }
            Ok(table.to_string())
        }
    }
}

pub fn format_checks(reports: &[CheckReport], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(reports),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["backend", "stored", "verified", "absent checked", "status"]);
            for report in reports {
                table.add_row(vec![
                    Cell::new(&report.backend),
                    numeric(report.stored),
                    numeric(report.verified),
                    numeric(report.absent_checked),
                    Cell::new("ok"),
                ]);
            }
            Ok(table.to_string())
        }
    }
}

fn numeric(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbench::{BackendKind, Workload};
    use std::time::Duration;

    fn measurement() -> Measurement {
        Measurement {
            backend: BackendKind::IndexedLog,
            workload: Workload::Get,
            workers: 2,
            ops: 1_000,
            elapsed: Duration::from_millis(2),
            allocations: 0,
            allocated_bytes: 0,
        }
    }

    #[test]
    fn test_table_output() {
        let output = format_measurements(&[measurement()], OutputFormat::Table).unwrap();
        assert!(output.contains("indexed-log"));
        assert!(output.contains("ns/op"));
        assert!(output.contains("2000.0"));
    }

    #[test]
    fn test_json_output() {
        let output = format_measurements(&[measurement()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let row = &value[0];
        assert_eq!(row["backend"], "indexed-log");
        assert_eq!(row["workload"], "get");
        assert_eq!(row["ops"], 1_000);
        assert_eq!(row["ns_per_op"], 2_000.0);
    }

    #[test]
    fn test_check_output() {
        let reports = vec![CheckReport {
            backend: "redb".to_string(),
            stored: 10,
            verified: 10,
            absent_checked: 5,
        }];
        let output = format_checks(&reports, OutputFormat::Table).unwrap();
        assert!(output.contains("redb"));
        let json = format_checks(&reports, OutputFormat::Json).unwrap();
        assert!(json.contains("\"absent_checked\": 5"));
    }
}
