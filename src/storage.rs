use crate::models::SeriesView;
use anyhow::Result;
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save a materialized view as CSV: one `x` column plus one column per
/// series key, empty cells where a series has no value at that x.
pub fn save_csv<P: AsRef<Path>>(view: &SeriesView, path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header = vec!["x".to_string()];
    header.extend(view.series_keys.iter().cloned());
    wtr.write_record(&header)?;
    for row in &view.rows {
        let mut record = vec![row.x.canonical()];
        for key in &view.series_keys {
            record.push(row.value(key).map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a materialized view as pretty JSON.
pub fn save_json<P: AsRef<Path>>(view: &SeriesView, path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(view)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scalar, SeriesRow};
    use tempfile::tempdir;

    #[test]
    fn write_csv_and_json() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("view.csv");
        let jsonp = dir.path().join("view.json");
        let view = SeriesView {
            rows: vec![SeriesRow {
                x: Scalar::Text("2024-01-01".into()),
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
                values: [("revenue".to_string(), 100.0)].into_iter().collect(),
            }],
            series_keys: vec!["revenue".to_string(), "fees".to_string()],
        };
        save_csv(&view, &csvp).unwrap();
        save_json(&view, &jsonp).unwrap();
        let csv_text = std::fs::read_to_string(&csvp).unwrap();
        assert!(csv_text.starts_with("x,revenue,fees"));
        assert!(csv_text.contains("2024-01-01,100,"));
        assert!(jsonp.exists());
    }
}
