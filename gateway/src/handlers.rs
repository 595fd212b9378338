//! Action group entry points.
//!
//! Each handler takes the raw invocation event and always returns a rendered
//! envelope: request problems become 400/403 replies, execution problems
//! 500 replies, and nothing escapes as an error.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::KpiCatalog;
use crate::envelope::{Invocation, Reply};
use crate::executor::{execute_query, QueryRunner};
use crate::formatting::format_rows;
use crate::kpi_query::build_kpi_query;
use crate::models::{AvailableKpisRequest, AvailableKpisResponse, KpiDataRequest, KpiDataResponse, SqlQueryRequest};
use crate::quality::validate_data_quality;
use crate::sql_guard::check_query;
use crate::Error;

pub const SQL_ACTION_GROUP: &str = "ExecuteSqlQueryActionGroup";
pub const SQL_API_PATH: &str = "/execute_sql_query";
pub const KPI_ACTION_GROUP: &str = "GetKpiDataActionGroup";
pub const KPI_API_PATH: &str = "/get_kpi_data";
pub const CATALOG_ACTION_GROUP: &str = "GetAvailableKpisActionGroup";
pub const CATALOG_API_PATH: &str = "/get_available_kpis";

/// Everything the KPI path needs, built once per process.
pub struct KpiContext {
    pub runner: Arc<dyn QueryRunner>,
    pub catalog: Arc<KpiCatalog>,
    pub table: String,
    pub timeout_secs: u64,
}

fn error_body(err: &Error, empty_field: Option<&str>) -> Value {
    let mut body = json!({
        "success": false,
        "error": err.to_string(),
    });
    if let Some(field) = empty_field {
        body[field] = json!([]);
    }
    body
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Validate and run a free-form read-only query.
pub async fn execute_sql_query(
    runner: &dyn QueryRunner,
    default_timeout_secs: u64,
    event: &Value,
) -> Value {
    let Invocation { params, reply } = match Invocation::decode(event, SQL_ACTION_GROUP, SQL_API_PATH) {
        Ok(invocation) => invocation,
        Err((reply, e)) => return reply.render(e.status_code(), &error_body(&e, None)),
    };
    let bedrock_format = matches!(reply, Reply::ActionGroup(_));

    let request = match SqlQueryRequest::from_params(&params, default_timeout_secs) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return reply.render(e.status_code(), &error_body(&e, None));
        }
    };

    info!(
        "Parameters: query={}, org_id={}, timeout={}, bedrock_format={}",
        truncate(&request.query, 100),
        request.org_id,
        request.timeout_secs,
        bedrock_format
    );

    if let Err(violation) = check_query(&request.query) {
        warn!("Security validation failed: {}", violation);
        let e = Error::Forbidden(violation.to_string());
        return reply.render(e.status_code(), &error_body(&e, None));
    }

    let outcome = execute_query(runner, &request).await;
    info!(
        "Query execution result: success={}, row_count={}",
        outcome.success, outcome.row_count
    );

    let status = if outcome.success { 200 } else { 500 };
    reply.render(status, &outcome)
}

/// Resolve KPI ids, run the aggregated query, and return formatted, quality-checked rows.
pub async fn get_kpi_data(ctx: &KpiContext, event: &Value) -> Value {
    let Invocation { params, reply } = match Invocation::decode(event, KPI_ACTION_GROUP, KPI_API_PATH) {
        Ok(invocation) => invocation,
        Err((reply, e)) => return reply.render(e.status_code(), &error_body(&e, Some("kpi_data"))),
    };

    let request = match KpiDataRequest::from_params(&params) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return reply.render(e.status_code(), &error_body(&e, Some("kpi_data")));
        }
    };

    info!(
        "Parameters: kpi_ids={:?}, date_range={}, frequency={}, org_id={}",
        request.kpi_ids, request.date_range_text, request.frequency, request.org_id
    );

    let query = build_kpi_query(
        &ctx.catalog,
        &ctx.table,
        &request.kpi_ids,
        request.date_range,
        request.frequency,
    );
    info!(
        "Executing query for chains {:?}: {}",
        query.chains, query.statement.sql
    );
    if query.kpi_info.is_empty() {
        warn!(
            "None of the requested KPI ids map to a column: {:?}",
            request.kpi_ids
        );
    }

    let rows = match ctx.runner.fetch_rows(&query.statement, ctx.timeout_secs).await {
        Ok(rows) => rows,
        Err(failure) => {
            error!("KPI query failed: {:?}", failure);
            let body = json!({
                "success": false,
                "error": failure.describe(ctx.timeout_secs),
                "kpi_data": [],
            });
            return reply.render(500, &body);
        }
    };
    info!("Retrieved {} rows", rows.len());

    let data_quality = validate_data_quality(&rows);
    info!(
        "Data validation: valid={}, issues={}, warnings={}",
        data_quality.valid,
        data_quality.issues.len(),
        data_quality.warnings.len()
    );

    let kpi_data = format_rows(&rows);
    let body = KpiDataResponse {
        success: true,
        count: kpi_data.len(),
        kpi_data,
        kpi_ids: request.kpi_ids,
        kpi_info: query.kpi_info,
        date_range: request.date_range_text,
        frequency: request.frequency,
        data_quality,
    };

    reply.render(200, &body)
}

/// List the catalog entries available for a customer.
pub fn get_available_kpis(catalog: &KpiCatalog, event: &Value) -> Value {
    let Invocation { params, reply } =
        match Invocation::decode(event, CATALOG_ACTION_GROUP, CATALOG_API_PATH) {
            Ok(invocation) => invocation,
            Err((reply, e)) => return reply.render(e.status_code(), &error_body(&e, Some("kpis"))),
        };

    let request = AvailableKpisRequest::from_params(&params);
    let kpis = catalog.available_for(&request.customer);
    info!(
        "Filtered to {} of {} KPIs for customer: {}",
        kpis.len(),
        catalog.descriptors().len(),
        request.customer
    );

    reply.render(
        200,
        &AvailableKpisResponse {
            success: true,
            customer: request.customer,
            kpi_count: kpis.len(),
            kpis,
        },
    )
}
