//! Report rows and their table/JSON rendering.

use serde::Serialize;

/// Result of one iteration of one test.
#[derive(Debug, Clone, Serialize)]
pub struct Row {
    pub test: usize,
    pub iter: usize,
    pub precision: String,
    pub path: String,
    pub batch: usize,
    pub max_m: usize,
    pub max_n: usize,
    pub gflop: f64,
    pub engine_ms: Option<f64>,
    pub engine_gflops: Option<f64>,
    pub reference_ms: Option<f64>,
    pub reference_gflops: Option<f64>,
    /// Largest scaled residual over the batch (`NaN` if any check failed).
    pub error: Option<f64>,
    /// Matrices with an exactly zero pivot.
    pub singular: usize,
    /// Overall status code of the engine call.
    pub status: i32,
    pub message: Option<String>,
    pub passed: bool,
}

/// Print rows as an aligned table.
pub fn print_table(rows: &[Row]) {
    println!(
        "{:>4} {:>4} {:>3} {:>15} {:>6} {:>11} {:>11} {:>11} {:>11} {:>11} {:>10}  status",
        "test", "iter", "p", "path", "batch", "max M:N", "eng GF/s", "eng ms", "ref GF/s", "ref ms", "error"
    );
    for row in rows {
        println!(
            "{:>4} {:>4} {:>3} {:>15} {:>6} {:>11} {:>11} {:>11} {:>11} {:>11} {:>10}  {}",
            row.test,
            row.iter,
            row.precision,
            row.path,
            row.batch,
            format!("{}:{}", row.max_m, row.max_n),
            fmt_opt(row.engine_gflops, 2),
            fmt_opt(row.engine_ms, 3),
            fmt_opt(row.reference_gflops, 2),
            fmt_opt(row.reference_ms, 3),
            row.error.map_or_else(|| "---".to_string(), |e| format!("{:.2e}", e)),
            status_text(row)
        );
    }
}

/// Print rows as pretty JSON.
pub fn print_json(rows: &[Row]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

fn fmt_opt(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "---".to_string(), |v| format!("{:.*}", digits, v))
}

fn status_text(row: &Row) -> String {
    let mut text = if row.passed { "ok".to_string() } else { "FAILED".to_string() };
    if row.singular > 0 {
        text.push_str(&format!(" ({} singular)", row.singular));
    }
    if let Some(message) = &row.message {
        text.push_str(&format!(": {}", message));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row {
            test: 1,
            iter: 0,
            precision: "d".into(),
            path: "native".into(),
            batch: 10,
            max_m: 8,
            max_n: 4,
            gflop: 0.001,
            engine_ms: Some(1.5),
            engine_gflops: Some(0.66),
            reference_ms: None,
            reference_gflops: None,
            error: Some(f64::NAN),
            singular: 2,
            status: 0,
            message: None,
            passed: false,
        }
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(&row()), "FAILED (2 singular)");
        let mut ok = row();
        ok.passed = true;
        ok.singular = 0;
        ok.message = Some("note".into());
        assert_eq!(status_text(&ok), "ok: note");
    }

    #[test]
    fn test_json_writes_nan_as_null() {
        let json = serde_json::to_value(row()).unwrap();
        assert!(json["error"].is_null());
        assert_eq!(json["engine_ms"], 1.5);
        assert_eq!(json["reference_ms"], serde_json::Value::Null);
    }
}
