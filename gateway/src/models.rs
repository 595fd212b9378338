//! Canonical request and response payloads.

use serde::Serialize;
use serde_json::Value;

use crate::catalog::ResolvedKpi;
use crate::envelope::Params;
use crate::executor::ExecutionFailure;
use crate::kpi_query::{DateRange, Frequency};
use crate::quality::DataQualityReport;
use crate::rows::Row;
use crate::{Error, Result};

/// Free-form query request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQueryRequest {
    pub query: String,
    pub org_id: String,
    pub timeout_secs: u64,
}

impl SqlQueryRequest {
    /// Build from decoded parameters. `sql_query` is accepted as an alias of `query`,
    /// `timeout_seconds` as an alias of `timeout`.
    pub fn from_params(params: &Params, default_timeout_secs: u64) -> Result<Self> {
        let query = params
            .text_any(&["sql_query", "query"])
            .ok_or_else(|| Error::Validation("Query parameter is required".to_string()))?;
        let org_id = params.text("org_id").ok_or_else(|| {
            Error::Validation("org_id parameter is required for data isolation".to_string())
        })?;
        let timeout_secs = match params.text_any(&["timeout", "timeout_seconds"]) {
            Some(raw) => parse_timeout(&raw)?,
            None => default_timeout_secs,
        };

        Ok(Self {
            query,
            org_id,
            timeout_secs,
        })
    }
}

fn parse_timeout(raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(Error::Validation(format!(
            "timeout must be a positive number of seconds, got '{}'",
            raw
        ))),
    }
}

/// Result of a free-form query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub data: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn success(data: Vec<Row>, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            row_count: data.len(),
            data,
            execution_time_ms,
            error: None,
        }
    }

    /// Zero-row failure. Only a timeout reports elapsed time, and then the full cap.
    pub fn failure(failure: &ExecutionFailure, timeout_secs: u64) -> Self {
        let execution_time_ms = match failure {
            ExecutionFailure::Timeout => timeout_secs.saturating_mul(1000),
            _ => 0,
        };
        Self {
            success: false,
            data: Vec::new(),
            row_count: 0,
            execution_time_ms,
            error: Some(failure.describe(timeout_secs)),
        }
    }
}

/// Aggregated KPI request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiDataRequest {
    pub kpi_ids: Vec<i64>,
    /// The caller's range text, echoed back unchanged.
    pub date_range_text: String,
    pub date_range: DateRange,
    pub frequency: Frequency,
    pub org_id: String,
}

impl KpiDataRequest {
    pub fn from_params(params: &Params) -> Result<Self> {
        let kpi_ids = match params.get("kpi_ids") {
            Some(value) => parse_kpi_ids(value)?,
            None => Vec::new(),
        };
        if kpi_ids.is_empty() {
            return Err(Error::Validation("No KPI IDs provided".to_string()));
        }

        let date_range_text = params
            .text("date_range")
            .ok_or_else(|| Error::Validation("date_range parameter is required".to_string()))?;
        let date_range = DateRange::parse(&date_range_text)?;

        let frequency = match params.text("frequency") {
            Some(raw) => raw.parse()?,
            None => Frequency::Monthly,
        };

        Ok(Self {
            kpi_ids,
            date_range_text,
            date_range,
            frequency,
            org_id: params.text("org_id").unwrap_or_else(|| "default".to_string()),
        })
    }
}

/// Accepts `"1, 2,3"`, `[1, 2, "3"]` or a bare integer.
pub fn parse_kpi_ids(value: &Value) -> Result<Vec<i64>> {
    let invalid = |raw: &dyn std::fmt::Display| {
        Error::Validation(format!("Invalid KPI ID: {}", raw))
    };

    match value {
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i64>().map_err(|_| invalid(&part)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => n.as_i64().ok_or_else(|| invalid(n)),
                Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid(s)),
                other => Err(invalid(other)),
            })
            .collect(),
        Value::Number(n) => n.as_i64().map(|id| vec![id]).ok_or_else(|| invalid(n)),
        other => Err(invalid(other)),
    }
}

/// Body of a successful KPI data reply.
#[derive(Debug, Clone, Serialize)]
pub struct KpiDataResponse {
    pub success: bool,
    pub kpi_data: Vec<Row>,
    pub count: usize,
    pub kpi_ids: Vec<i64>,
    pub kpi_info: Vec<ResolvedKpi>,
    pub date_range: String,
    pub frequency: Frequency,
    pub data_quality: DataQualityReport,
}

/// Catalog listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableKpisRequest {
    pub customer: String,
}

impl AvailableKpisRequest {
    pub fn from_params(params: &Params) -> Self {
        Self {
            customer: params.text("customer").unwrap_or_else(|| "all".to_string()),
        }
    }
}

/// One catalog entry as shown to the planning agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub kpi_id: i64,
    pub kpi_name: String,
    pub definition: String,
    pub unit: String,
    pub group: String,
}

/// Body of a catalog listing reply.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableKpisResponse {
    pub success: bool,
    pub customer: String,
    pub kpi_count: usize,
    pub kpis: Vec<KpiSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => Params(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sql_request_requires_query_then_org() {
        let err = SqlQueryRequest::from_params(&params(json!({"org_id": "o"})), 30).unwrap_err();
        assert_eq!(err.to_string(), "Query parameter is required");

        let err = SqlQueryRequest::from_params(&params(json!({"query": "SELECT 1"})), 30).unwrap_err();
        assert_eq!(err.to_string(), "org_id parameter is required for data isolation");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_sql_request_timeout() {
        let req = SqlQueryRequest::from_params(&params(json!({"query": "SELECT 1", "org_id": "o"})), 30).unwrap();
        assert_eq!(req.timeout_secs, 30);

        let req = SqlQueryRequest::from_params(
            &params(json!({"sql_query": "SELECT 1", "org_id": "o", "timeout": "12"})),
            30,
        )
        .unwrap();
        assert_eq!(req.query, "SELECT 1");
        assert_eq!(req.timeout_secs, 12);

        let req = SqlQueryRequest::from_params(
            &params(json!({"query": "SELECT 1", "org_id": "o", "timeout_seconds": 45})),
            30,
        )
        .unwrap();
        assert_eq!(req.timeout_secs, 45);

        let err = SqlQueryRequest::from_params(
            &params(json!({"query": "SELECT 1", "org_id": "o", "timeout": 0})),
            30,
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_parse_kpi_ids_shapes() {
        assert_eq!(parse_kpi_ids(&json!("1, 2,3,")).unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_kpi_ids(&json!([4, "5"])).unwrap(), vec![4, 5]);
        assert_eq!(parse_kpi_ids(&json!(7)).unwrap(), vec![7]);
        assert!(parse_kpi_ids(&json!("1,abc")).is_err());
        assert!(parse_kpi_ids(&json!({"id": 1})).is_err());
    }

    #[test]
    fn test_kpi_request_defaults() {
        let req = KpiDataRequest::from_params(&params(json!({
            "kpi_ids": "10,11",
            "date_range": "2024-01 to 2024-03"
        })))
        .unwrap();
        assert_eq!(req.kpi_ids, vec![10, 11]);
        assert_eq!(req.frequency, Frequency::Monthly);
        assert_eq!(req.org_id, "default");
        assert_eq!(req.date_range_text, "2024-01 to 2024-03");
    }

    #[test]
    fn test_kpi_request_validation() {
        let err = KpiDataRequest::from_params(&params(json!({"kpi_ids": "", "date_range": "2024-01 to 2024-01"}))).unwrap_err();
        assert_eq!(err.to_string(), "No KPI IDs provided");

        let err = KpiDataRequest::from_params(&params(json!({"kpi_ids": "1"}))).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = KpiDataRequest::from_params(&params(json!({
            "kpi_ids": "1",
            "date_range": "2024-01 to 2024-01",
            "frequency": "hourly"
        })))
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
