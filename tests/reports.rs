use complaint_report::engine::{DEPT, STATUS};
use complaint_report::output::{ChartSeries, Payload, Records};
use complaint_report::types::Aggregation;
use complaint_report::{ErrorKind, Normalizer, ReportConfig, ReportEngine};
use rust_xlsxwriter::Workbook;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const HEADER: [&str; 5] = ["DATE", "COMPLAINT TYPE", "DEPT", "CLOSED/OPEN", "COST"];

const ROWS: [[&str; 5]; 6] = [
    ["2022-03-01", "Leakage", "O&M", "CLOSED", "120"],
    ["2022-05-10", "Leakage", "Operation & Maintenance", "Opened", ""],
    ["2022-11-30", "No Water", "O&M", "OPEN", "80"],
    ["2023-01-15", "Billing", "Comm", "OPEN", ""],
    ["2023-02-20", "Billing", "Commercial", "Close", "15"],
    ["2023-06-01", "Billing", "", "OPEN", "40"],
];

fn write_csv_fixture() -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(f, "{}", HEADER.join(",")).unwrap();
    for row in ROWS {
        writeln!(f, "{}", row.join(",")).unwrap();
    }
    f.flush().unwrap();
    f
}

fn write_xlsx_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("complaints.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, h) in HEADER.iter().enumerate() {
        sheet.write_string(0, c as u16, *h).unwrap();
    }
    for (r, row) in ROWS.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32 + 1, c as u16);
            if cell.is_empty() {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(n) => sheet.write_number(r, c, n).unwrap(),
                Err(_) => sheet.write_string(r, c, *cell).unwrap(),
            };
        }
    }
    workbook.save(&path).unwrap();
    path
}

fn engine(path: &Path) -> ReportEngine {
    ReportEngine::builder()
        .dataset_path(path)
        .normalizer(Normalizer::complaints())
        .build()
        .unwrap()
}

#[test]
fn missing_report_counts_blank_cells() {
    let f = write_csv_fixture();
    let report = engine(f.path()).missing_report().unwrap();
    assert_eq!(report.total_rows, 6);
    assert_eq!(report.total_cells, 30);
    assert_eq!(report.total_missing_values, 3);
    assert_eq!(report.overall_missing_percentage, 10.0);

    let payload = report.to_payload();
    assert_eq!(payload["missing_values_summary"][0]["column"], json!("COST"));
    assert_eq!(payload["missing_values_summary"][0]["missing_percentage"], json!(33.33));
    assert_eq!(payload["missing_values_summary"][1]["column"], json!("DEPT"));
    assert_eq!(
        payload["severity_summary"],
        json!({"critical": 0, "high": 1, "medium": 1, "low": 0})
    );
}

#[test]
fn complaint_pivot_payload_matches_dashboard_shape() {
    let f = write_csv_fixture();
    let payload = engine(f.path()).complaint_pivot().unwrap().to_payload();

    assert_eq!(payload["Leakage"]["O&M CLOSED"], json!(1));
    assert_eq!(payload["Leakage"]["O&M OPEN"], json!(1));
    assert_eq!(payload["Leakage"]["O&M TOTAL"], json!(2));
    assert_eq!(payload["Leakage"]["Grand TOTAL"], json!(2));
    assert_eq!(payload["Billing"]["Commercial TOTAL"], json!(2));
    assert_eq!(payload["Billing"]["(blank) OPEN"], json!(1));
    assert_eq!(payload["Billing"]["Grand TOTAL"], json!(3));
    assert_eq!(payload["No Water"]["Commercial TOTAL"], json!(0));
}

#[test]
fn frequency_respects_min_count() {
    let f = write_csv_fixture();
    let engine = ReportEngine::builder()
        .dataset_path(f.path())
        .normalizer(Normalizer::complaints())
        .min_count(2)
        .build()
        .unwrap();
    let report = engine.frequency(DEPT).unwrap();
    assert_eq!(report.to_payload(), json!({"O&M": 3, "Commercial": 2}));
}

#[test]
fn unnormalized_engine_keeps_raw_labels() {
    let f = write_csv_fixture();
    let raw = ReportEngine::builder()
        .dataset_path(f.path())
        .build()
        .unwrap();
    let report = raw.frequency(STATUS).unwrap();
    assert_eq!(report.get("Opened"), Some(1));
    assert_eq!(report.get("OPEN"), Some(3));
}

#[test]
fn sum_pivot_and_describe_over_cost() {
    let f = write_csv_fixture();
    let e = engine(f.path());
    let p = e
        .pivot("COMPLAINT TYPE", &["CLOSED/OPEN"], "COST", Aggregation::Sum)
        .unwrap();
    assert_eq!(p.row("Leakage").unwrap().grand_total, 120.0);
    assert_eq!(p.row("Billing").unwrap().grand_total, 55.0);

    let stats = e.describe().unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].column, "COST");
    assert_eq!(stats[0].count, 4);
    assert_eq!(stats[0].mean, Some(63.75));
    let records = stats[..].to_records();
    assert_eq!(records[0]["50%"], json!(60.0));
}

#[test]
fn xlsx_and_csv_give_the_same_categorical_reports() {
    let dir = TempDir::new().unwrap();
    let xlsx = write_xlsx_fixture(dir.path());
    let csv = write_csv_fixture();

    let from_xlsx = engine(&xlsx);
    let from_csv = engine(csv.path());
    assert_eq!(
        from_xlsx.complaint_pivot().unwrap().to_payload(),
        from_csv.complaint_pivot().unwrap().to_payload()
    );
    assert_eq!(
        from_xlsx.complaint_charts().unwrap(),
        from_csv.complaint_charts().unwrap()
    );
    assert_eq!(
        from_xlsx.missing_report().unwrap().total_missing_values,
        from_csv.missing_report().unwrap().total_missing_values
    );
}

#[test]
fn na_tokens_are_missing_in_workbooks_too() {
    let dir = TempDir::new().unwrap();
    let xlsx = dir.path().join("departments.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, cell) in ["DEPT", "N/A", "O&M", " NULL "].iter().enumerate() {
        sheet.write_string(r as u32, 0, *cell).unwrap();
    }
    workbook.save(&xlsx).unwrap();

    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(csv, "DEPT\nN/A\nO&M\n NULL ").unwrap();

    let missing = |path: &Path| {
        ReportEngine::builder()
            .dataset_path(path)
            .build()
            .unwrap()
            .missing_report()
            .unwrap()
            .total_missing_values
    };
    assert_eq!(missing(&xlsx), 2);
    assert_eq!(missing(csv.path()), 2);
}

#[test]
fn charts_and_series() {
    let f = write_csv_fixture();
    let e = engine(f.path());
    let charts = e.complaint_charts().unwrap();
    assert_eq!(charts.department_chart.labels, ["(blank)", "Commercial", "O&M"]);
    assert_eq!(charts.department_chart.values, [1.0, 2.0, 3.0]);
    assert_eq!(charts.yearly_chart.labels, ["2022", "2023"]);
    assert_eq!(charts.status_chart.labels, ["CLOSED", "OPEN"]);
    assert_eq!(charts.status_chart.values, [2.0, 4.0]);

    let series = e.status_by_year().unwrap().to_chart_series();
    let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["CLOSED", "OPEN"]);
    assert_eq!(series[1].labels, ["2022", "2023"]);
    assert_eq!(series[1].values, [2.0, 2.0]);
}

#[test]
fn schema_and_path_errors_surface_with_stable_kinds() {
    let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(f, "DEPT,NOTES").unwrap();
    writeln!(f, "O&M,x").unwrap();
    let e = ReportEngine::builder().dataset_path(f.path()).build().unwrap();
    let err = e.complaint_pivot().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(
        err.to_string(),
        "missing required column(s): COMPLAINT TYPE, CLOSED/OPEN"
    );
    assert_eq!(err.status_code(), 422);

    let gone = ReportConfig::new("/nonexistent/complaints.csv").engine().unwrap();
    assert_eq!(gone.dataset_info().unwrap_err().status_code(), 404);
}
