//! Query gateway for the agentic chat action groups.
//!
//! This crate holds the read-only SQL gate, the free-form executor, the KPI
//! catalog and query builder, and the result formatting and data-quality
//! checks shared by the action group Lambda functions.

pub mod catalog;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod formatting;
pub mod handlers;
pub mod kpi_query;
pub mod models;
pub mod quality;
pub mod rows;
pub mod secrets;
pub mod sql_guard;

pub use catalog::{KpiCatalog, KpiColumn, KpiDescriptor, ResolvedKpi};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{ExecutionFailure, MySqlRunner, QueryRunner, Statement};
pub use handlers::KpiContext;
pub use models::{KpiDataRequest, QueryOutcome, SqlQueryRequest};
pub use quality::DataQualityReport;
pub use rows::{CellValue, Row};
pub use secrets::{get_database_credentials, resolve_database_credentials, CredentialSource, DatabaseCredentials};
pub use sql_guard::{validate_sql_security, SqlValidation};
