//! Display formatting of KPI result rows.
//!
//! Each non-null cell whose column name matches a rule keeps its raw value
//! and gains a `<column>_formatted` twin. Rules are checked in order against
//! the lowercased column name; the first match decides.

use crate::rows::{CellValue, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Currency,
    Percent,
    Count,
    Date,
}

const FORMAT_RULES: &[(&[&str], Style)] = &[
    (&["revenue"], Style::Currency),
    (&["percent", "oos"], Style::Percent),
    (&["volume", "count"], Style::Count),
    (&["date", "period"], Style::Date),
];

fn style_for(column: &str) -> Option<Style> {
    let column = column.to_lowercase();
    FORMAT_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| column.contains(needle)))
        .map(|(_, style)| *style)
}

/// Format every row for display.
pub fn format_rows(rows: &[Row]) -> Vec<Row> {
    rows.iter().map(format_row).collect()
}

/// Format one row. Null cells stay null and get no twin.
pub fn format_row(row: &Row) -> Row {
    let mut formatted = Row::new();

    for (column, value) in row.iter() {
        if value.is_null() {
            formatted.push(column, CellValue::Null);
            continue;
        }

        let twin = format!("{}_formatted", column);
        match (style_for(column), value) {
            (Some(Style::Date), CellValue::Date(date)) => {
                formatted.push(column, date.format("%Y-%m-%d").to_string());
                formatted.push(twin, date.format("%B %Y").to_string());
            }
            (Some(Style::Date), CellValue::DateTime(at)) => {
                formatted.push(column, at.format("%Y-%m-%d").to_string());
                formatted.push(twin, at.format("%B %Y").to_string());
            }
            (Some(Style::Date), other) => {
                let text = display_text(other);
                formatted.push(column, text.clone());
                formatted.push(twin, text);
            }
            (Some(style), other) => {
                formatted.push(column, other.clone());
                if let Some(number) = other.as_f64() {
                    formatted.push(twin, format_number(style, number));
                }
            }
            (None, other) => formatted.push(column, other.clone()),
        }
    }

    formatted
}

fn format_number(style: Style, value: f64) -> String {
    match style {
        Style::Currency => format!("${}", format_grouped(value, 2)),
        Style::Percent => format_percent(value),
        Style::Count | Style::Date => format_grouped(value, 0),
    }
}

/// Magnitudes below 1 are fractions and are scaled to percent first.
pub fn format_percent(value: f64) -> String {
    let percent = if value.abs() < 1.0 { value * 100.0 } else { value };
    format!("{:.2}%", percent)
}

/// Fixed-point rendering with `,` thousands separators.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3 + 1);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

fn display_text(value: &CellValue) -> String {
    match value {
        CellValue::Text(text) => text.clone(),
        CellValue::Json(json) => json.to_string(),
        other => serde_json::to_value(other)
            .map(|json| match json {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default(),
    }
}
