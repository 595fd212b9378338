//! Builds the single SELECT over the pre-aggregated metrics table.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::catalog::{KpiCatalog, KpiColumn, ResolvedKpi};
use crate::executor::{BindValue, Statement};
use crate::{Error, Result};

/// Always selected, ahead of any KPI column.
const BASE_PROJECTION: [&str; 5] = [
    "mon_year as period",
    "parent_chain_group",
    "company_chain",
    "channel_group",
    "channel",
];

/// Reporting granularity requested by the caller.
///
/// Only the monthly grain exists in the pre-aggregated table; weekly and daily
/// are accepted and echoed but select the same monthly rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Weekly,
    Daily,
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "weekly" => Ok(Frequency::Weekly),
            "daily" => Ok(Frequency::Daily),
            other => Err(Error::Validation(format!(
                "Invalid frequency '{}'. Must be one of: monthly, weekly, daily",
                other
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Monthly => "monthly",
            Frequency::Weekly => "weekly",
            Frequency::Daily => "daily",
        };
        f.write_str(name)
    }
}

/// Inclusive date bounds, normalised to whole months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Parse `"YYYY-MM to YYYY-MM"`. Either side may also be a full `YYYY-MM-DD`.
    ///
    /// The start moves to the first day of its month, the end to the last.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split(" to ");
        let (start, end) = match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => (start.trim(), end.trim()),
            _ => {
                return Err(Error::Validation(format!(
                    "Invalid date range format: {}",
                    text
                )))
            }
        };

        let start = first_day_of_month(parse_month(start)?);
        let end = last_day_of_month(parse_month(end)?);
        if start > end {
            return Err(Error::Validation(format!(
                "Invalid date range: start {} is after end {}",
                start, end
            )));
        }

        Ok(Self { start, end })
    }
}

fn parse_month(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d"))
        .map_err(|_| Error::Validation(format!("Invalid date '{}', expected YYYY-MM", text)))
}

fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last calendar day of the date's month, leap years included.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// The built statement and what it resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiQuery {
    pub statement: Statement,
    /// Final projection, in select order.
    pub columns: Vec<String>,
    pub kpi_info: Vec<ResolvedKpi>,
    /// Distinct chains implicated by the resolved KPIs.
    pub chains: BTreeSet<String>,
}

/// Build the KPI statement for `kpi_ids` over `range` against `table`.
///
/// Unmapped ids are dropped. If nothing resolves the statement still selects
/// the base projection; callers detect that case from an empty `kpi_info`.
/// The chain filter is added only when exactly one chain is implicated.
pub fn build_kpi_query(
    catalog: &KpiCatalog,
    table: &str,
    kpi_ids: &[i64],
    range: DateRange,
    frequency: Frequency,
) -> KpiQuery {
    let kpi_info = catalog.resolve(kpi_ids);
    let selected: BTreeSet<KpiColumn> = kpi_info.iter().map(|kpi| kpi.column).collect();
    let chains: BTreeSet<String> = kpi_info.iter().map(|kpi| kpi.chain.clone()).collect();

    let mut columns: Vec<String> = BASE_PROJECTION.iter().map(|c| c.to_string()).collect();

    // Requested columns sorted by name, then their context siblings.
    let mut requested: Vec<&str> = selected.iter().map(|c| c.as_str()).collect();
    requested.sort_unstable();
    columns.extend(requested.into_iter().map(String::from));
    for column in &selected {
        columns.extend(column.context_columns().iter().map(|c| c.to_string()));
    }

    let mut seen = BTreeSet::new();
    columns.retain(|column| seen.insert(column.clone()));

    let mut where_clauses = vec!["mon_year >= ?".to_string(), "mon_year <= ?".to_string()];
    let mut binds = vec![BindValue::Date(range.start), BindValue::Date(range.end)];

    if chains.len() == 1 {
        if let Some(chain) = chains.iter().next() {
            where_clauses.push("parent_chain_group = ?".to_string());
            binds.push(BindValue::Text(chain.clone()));
        }
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY mon_year, parent_chain_group",
        columns.join(", "),
        table,
        where_clauses.join(" AND ")
    );

    tracing::debug!(
        frequency = %frequency,
        resolved = kpi_info.len(),
        requested = kpi_ids.len(),
        "Built KPI query"
    );

    KpiQuery {
        statement: Statement { sql, binds },
        columns,
        kpi_info,
        chains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_month_bounds() {
        let range = DateRange::parse("2024-01 to 2024-01").unwrap();
        assert_eq!(range.start, date(2024, 1, 1));
        assert_eq!(range.end, date(2024, 1, 31));
    }

    #[test]
    fn test_leap_february() {
        let range = DateRange::parse("2024-02 to 2024-02").unwrap();
        assert_eq!(range.end, date(2024, 2, 29));
        let range = DateRange::parse("2023-02 to 2023-02").unwrap();
        assert_eq!(range.end, date(2023, 2, 28));
    }

    #[test]
    fn test_december_and_full_dates() {
        let range = DateRange::parse("2023-11-15 to 2023-12").unwrap();
        assert_eq!(range.start, date(2023, 11, 1));
        assert_eq!(range.end, date(2023, 12, 31));
    }

    #[test]
    fn test_bad_ranges() {
        assert!(DateRange::parse("2024-01").is_err());
        assert!(DateRange::parse("2024-01 to 2024-13").is_err());
        assert!(DateRange::parse("2024-01 to 2024-02 to 2024-03").is_err());
        let err = DateRange::parse("2024-05 to 2024-01").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!(" weekly ".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("daily".parse::<Frequency>().unwrap().to_string(), "daily");
        assert!("quarterly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_revenue_adds_context_columns_and_chain_filter() {
        let catalog = sample_catalog();
        let range = DateRange::parse("2024-01 to 2024-01").unwrap();
        let query = build_kpi_query(&catalog, "metrics", &[1], range, Frequency::Monthly);

        assert_eq!(
            query.columns,
            vec![
                "mon_year as period",
                "parent_chain_group",
                "company_chain",
                "channel_group",
                "channel",
                "cy_revenue",
                "py_revenue",
                "revenue_variance",
                "revenue_variance_percent",
            ]
        );
        assert_eq!(
            query.statement.binds,
            vec![
                BindValue::Date(date(2024, 1, 1)),
                BindValue::Date(date(2024, 1, 31)),
                BindValue::Text("Customer A".to_string()),
            ]
        );
        assert!(query.statement.sql.contains("FROM metrics WHERE mon_year >= ? AND mon_year <= ? AND parent_chain_group = ?"));
        assert!(query.statement.sql.ends_with("ORDER BY mon_year, parent_chain_group"));
    }

    #[test]
    fn test_revenue_siblings_deduplicated() {
        let catalog = sample_catalog();
        let range = DateRange::parse("2024-01 to 2024-03").unwrap();
        let query = build_kpi_query(&catalog, "metrics", &[1, 2], range, Frequency::Monthly);

        let count = |name: &str| query.columns.iter().filter(|c| *c == name).count();
        assert_eq!(count("py_revenue"), 1);
        assert_eq!(count("cy_revenue"), 1);
        assert_eq!(count("cy_sss_revenue"), 1);
        assert_eq!(query.kpi_info.len(), 2);
    }

    #[test]
    fn test_multiple_chains_leave_filter_off() {
        let catalog = sample_catalog();
        let range = DateRange::parse("2024-01 to 2024-06").unwrap();
        let query = build_kpi_query(&catalog, "metrics", &[3, 6], range, Frequency::Monthly);

        assert_eq!(query.chains.len(), 2);
        assert_eq!(query.statement.binds.len(), 2);
        assert!(!query.statement.sql.contains("parent_chain_group ="));
        assert!(query.columns.contains(&"cy_volume".to_string()));
        assert!(query.columns.contains(&"percent_volume_change".to_string()));
        assert!(query.columns.contains(&"py_oos_percent".to_string()));
    }

    #[test]
    fn test_unmapped_ids_dropped() {
        let catalog = sample_catalog();
        let range = DateRange::parse("2024-01 to 2024-01").unwrap();
        let query = build_kpi_query(&catalog, "metrics", &[1, 7], range, Frequency::Monthly);
        assert_eq!(query.kpi_info.len(), 1);
        assert_eq!(query.kpi_info[0].kpi_id, 1);
    }

    #[test]
    fn test_nothing_resolved_keeps_base_projection() {
        let catalog = sample_catalog();
        let range = DateRange::parse("2024-01 to 2024-01").unwrap();
        let query = build_kpi_query(&catalog, "metrics", &[7, 404], range, Frequency::Daily);

        assert!(query.kpi_info.is_empty());
        assert_eq!(query.columns.len(), BASE_PROJECTION.len());
        assert_eq!(query.statement.binds.len(), 2);
    }
}
