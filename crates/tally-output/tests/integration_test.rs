//! Integration tests for batch export and summary.

use chrono::NaiveDate;
use tally_output::{
    BatchSummary, ExportFormat, Exporter, ForecastPointExport, NO_HOLIDAY_ROWS, SensitivityExport,
};
use tempfile::TempDir;

fn batch_rows() -> Vec<SensitivityExport> {
    vec![
        SensitivityExport::feature(1, 1, "markdown_1", 2.0, Some(4.0)),
        SensitivityExport::feature(1, 1, "cpi", -0.5, Some(-1.0)),
        SensitivityExport::feature(1, 3, "markdown_1", 1.0, None),
        SensitivityExport::feature(1, 3, "cpi", -1.5, None),
        SensitivityExport::skipped(1, 2, "insufficient history"),
        SensitivityExport::skipped(2, 9, "zero baseline"),
        SensitivityExport::skipped(3, 4, "insufficient history"),
    ]
}

#[test]
fn test_full_batch_workflow() {
    let rows = batch_rows();
    let summary = BatchSummary::from_rows(&rows);

    assert_eq!(summary.total, 5);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.skip_reasons["insufficient history"], 2);
    assert_eq!(summary.skip_reasons["zero baseline"], 1);

    // markdown_1 averages 1.5, cpi averages -1.0
    assert_eq!(summary.features[0].feature, "markdown_1");
    assert!((summary.features[0].mean_overall_pct - 1.5).abs() < 1e-12);
    // only segment (1, 1) had holiday rows
    assert_eq!(summary.features[0].mean_holiday_pct, Some(4.0));
    assert_eq!(summary.features[1].segments, 2);

    let ascii = summary.to_ascii_table();
    assert!(ascii.contains("Batch Summary"));
    assert!(ascii.contains("markdown_1"));
    assert!(ascii.contains("zero baseline"));

    let markdown = summary.to_markdown();
    assert!(markdown.contains("# Batch Summary"));
    assert!(markdown.contains("| Feature |"));
    assert!(markdown.contains("| insufficient history | 2 |"));

    assert_eq!(summary.to_string(), "5 segments: 2 completed, 3 skipped");
}

#[test]
fn test_export_files_round_trip() {
    let dir = TempDir::new().unwrap();
    let rows = batch_rows();

    for format in [ExportFormat::Csv, ExportFormat::Json, ExportFormat::PrettyJson] {
        let path = dir.path().join(format!("batch.{}", format.extension()));
        rows.export_to_file(&path, format).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(NO_HOLIDAY_ROWS));
        assert!(text.contains("insufficient history"));
    }

    let json = rows.export_to_string(ExportFormat::Json).unwrap();
    let parsed: Vec<SensitivityExport> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, rows);
}

#[test]
fn test_forecast_export() {
    let week = NaiveDate::from_ymd_opt(2012, 10, 26).unwrap();
    let points = vec![
        ForecastPointExport::new(week - chrono::Duration::weeks(1), "train", 100.0, 98.5),
        ForecastPointExport::new(week, "test", 110.0, 104.25),
    ];

    let csv = points.export_to_string(ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("2012-10-26,test,"));
}
