//! Data-quality checks over a KPI result set.

use serde::Serialize;

use crate::rows::Row;

/// Columns scanned for extreme values.
const OUTLIER_COLUMNS: [&str; 4] = ["cy_revenue", "cy_volume", "cy_oos_percent", "store_count"];

/// Null share above which a column invalidates the result, in percent.
const NULL_ISSUE_PCT: f64 = 50.0;
/// Null share above which a column earns a warning, in percent.
const NULL_WARNING_PCT: f64 = 10.0;
/// A value this many times the column mean counts as an outlier.
const OUTLIER_FACTOR: f64 = 10.0;

/// Verdict over a result set. Computed per response, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub row_count: usize,
}

/// Check null saturation per column and extreme values in the key numeric columns.
pub fn validate_data_quality(rows: &[Row]) -> DataQualityReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if rows.is_empty() {
        issues.push("No data returned for the specified date range and KPI IDs".to_string());
        return DataQualityReport {
            valid: false,
            issues,
            warnings,
            row_count: 0,
        };
    }

    // Columns in the order their first null was seen.
    let mut null_counts: Vec<(&str, usize)> = Vec::new();
    for row in rows {
        for (column, value) in row.iter() {
            if !value.is_null() {
                continue;
            }
            match null_counts.iter_mut().find(|(name, _)| *name == column) {
                Some((_, count)) => *count += 1,
                None => null_counts.push((column, 1)),
            }
        }
    }

    for (column, count) in null_counts {
        let pct = count as f64 / rows.len() as f64 * 100.0;
        if pct > NULL_ISSUE_PCT {
            issues.push(format!("Column '{}' has {:.1}% null values", column, pct));
        } else if pct > NULL_WARNING_PCT {
            warnings.push(format!("Column '{}' has {:.1}% null values", column, pct));
        }
    }

    for column in OUTLIER_COLUMNS {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_f64()))
            .collect();
        if values.is_empty() {
            continue;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        if mean == 0.0 {
            continue;
        }

        let outliers = values.iter().filter(|v| **v > mean * OUTLIER_FACTOR).count();
        if outliers > 0 {
            warnings.push(format!("Column '{}' has {} extreme outliers", column, outliers));
        }
    }

    DataQualityReport {
        valid: issues.is_empty(),
        issues,
        warnings,
        row_count: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::CellValue;

    fn rows_with_nulls(total: usize, nulls: usize) -> Vec<Row> {
        (0..total)
            .map(|i| {
                let revenue = if i < nulls { CellValue::Null } else { CellValue::Float(100.0) };
                Row::new().with("channel", "Retail").with("cy_revenue", revenue)
            })
            .collect()
    }

    #[test]
    fn test_empty_result_is_invalid() {
        let report = validate_data_quality(&[]);
        assert!(!report.valid);
        assert_eq!(report.row_count, 0);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].starts_with("No data returned"));
    }

    #[test]
    fn test_majority_nulls_is_an_issue() {
        let report = validate_data_quality(&rows_with_nulls(100, 60));
        assert!(!report.valid);
        assert_eq!(report.issues, vec!["Column 'cy_revenue' has 60.0% null values"]);
        assert_eq!(report.row_count, 100);
    }

    #[test]
    fn test_minority_nulls_is_a_warning() {
        let report = validate_data_quality(&rows_with_nulls(100, 30));
        assert!(report.valid);
        assert!(report.issues.is_empty());
        assert_eq!(report.warnings, vec!["Column 'cy_revenue' has 30.0% null values"]);
    }

    #[test]
    fn test_few_nulls_are_ignored() {
        let report = validate_data_quality(&rows_with_nulls(100, 10));
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_outliers_are_warnings() {
        let mut rows: Vec<Row> = (0..20)
            .map(|_| Row::new().with("store_count", 10i64))
            .collect();
        rows.push(Row::new().with("store_count", 10_000i64));

        let report = validate_data_quality(&rows);
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["Column 'store_count' has 1 extreme outliers"]);
    }

    #[test]
    fn test_zero_mean_skips_outliers() {
        let rows = vec![
            Row::new().with("cy_volume", 0.0),
            Row::new().with("cy_volume", 0.0),
        ];
        assert!(validate_data_quality(&rows).warnings.is_empty());
    }
}
