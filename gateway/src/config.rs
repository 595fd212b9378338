//! Configuration management for the action group functions.

use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

/// Default server-side execution cap, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default pre-aggregated metrics table.
pub const DEFAULT_KPI_TABLE: &str = "reddyice_s3_commercial_money";

const METADATA_RELATIVE_PATH: &str = "metadata/kpi_meta_data.json";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
    /// Database (schema) name
    pub db_name: String,
    /// Username used when no secret ARN is configured
    pub db_user: Option<String>,
    /// Password used when no secret ARN is configured
    pub db_password: Option<String>,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: Option<String>,
    /// AWS region
    pub aws_region: String,
    /// Default execution cap applied when the caller sends none
    pub query_timeout_secs: u64,
    /// Explicit location of the KPI metadata catalog
    pub kpi_metadata_path: Option<PathBuf>,
    /// Table holding the pre-aggregated KPI rows
    pub kpi_table: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let query_timeout_secs = match env::var("QUERY_TIMEOUT_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("QUERY_TIMEOUT_SECONDS is not a number: {}", raw)))?,
            Err(_) => DEFAULT_QUERY_TIMEOUT_SECS,
        };

        let db_port = match env::var("DB_PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("DB_PORT is not a valid port: {}", raw)))?,
            Err(_) => 3306,
        };

        Ok(Self {
            db_host: required("DB_HOST")?,
            db_port,
            db_name: required("DB_NAME")?,
            db_user: env::var("DB_USER").ok(),
            db_password: env::var("DB_PASSWORD").ok(),
            db_secret_arn: env::var("DB_SECRET_ARN").ok(),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-west-2".to_string()),
            query_timeout_secs,
            kpi_metadata_path: env::var("KPI_METADATA_PATH").ok().map(PathBuf::from),
            kpi_table: env::var("KPI_TABLE").unwrap_or_else(|_| DEFAULT_KPI_TABLE.to_string()),
        })
    }

    /// Candidate locations for the KPI catalog, most specific first.
    pub fn kpi_metadata_candidates(&self) -> Vec<PathBuf> {
        metadata_candidates(self.kpi_metadata_path.clone())
    }
}

/// Catalog lookup for functions that never touch the database.
///
/// An explicit path wins; otherwise the file is looked up next to the running
/// binary (the Lambda task root) and then relative to the working directory.
pub fn metadata_candidates(explicit: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path);
    }
    if let Some(dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(PathBuf::from)) {
        candidates.push(dir.join(METADATA_RELATIVE_PATH));
    }
    candidates.push(PathBuf::from(METADATA_RELATIVE_PATH));
    candidates
}

/// Same as [`metadata_candidates`], reading `KPI_METADATA_PATH` itself.
pub fn metadata_candidates_from_env() -> Vec<PathBuf> {
    metadata_candidates(env::var("KPI_METADATA_PATH").ok().map(PathBuf::from))
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{} not set", name)))
}
