//! Database credentials from Secrets Manager or the environment.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::info;

use crate::{Config, Error, Result};

/// Secret strings by ARN, kept for the life of the process.
static SECRET_STRINGS: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn secret_strings() -> &'static RwLock<HashMap<String, String>> {
    SECRET_STRINGS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Login for the metrics database.
///
/// The optional connection fields are only ever filled from a secret and
/// override the environment when present.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
}

/// Where the credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Secret(String),
    Environment { username: String, password: String },
}

impl CredentialSource {
    /// `DB_SECRET_ARN` wins over `DB_USER`/`DB_PASSWORD`.
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Some(arn) = &config.db_secret_arn {
            return Ok(Self::Secret(arn.clone()));
        }
        match (&config.db_user, &config.db_password) {
            (Some(username), Some(password)) => Ok(Self::Environment {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(Error::Config(
                "either DB_SECRET_ARN or DB_USER and DB_PASSWORD must be set".to_string(),
            )),
        }
    }
}

/// Fetch a secret string, hitting Secrets Manager only on first use per ARN.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    if let Some(cached) = secret_strings().read().await.get(secret_arn) {
        return Ok(cached.clone());
    }

    let output = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;
    let value = output
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?;

    secret_strings()
        .write()
        .await
        .insert(secret_arn.to_string(), value.clone());
    Ok(value)
}

/// Read `{username, password, host?, port?, dbname?}` from a secret.
pub async fn get_database_credentials(
    client: &SecretsClient,
    secret_arn: &str,
) -> Result<DatabaseCredentials> {
    parse_credentials(&get_secret(client, secret_arn).await?)
}

/// Resolve credentials for the configured database.
pub async fn resolve_database_credentials(
    config: &Config,
    client: &SecretsClient,
) -> Result<DatabaseCredentials> {
    match CredentialSource::from_config(config)? {
        CredentialSource::Secret(arn) => {
            info!("Using database credentials from Secrets Manager");
            get_database_credentials(client, &arn).await
        }
        CredentialSource::Environment { username, password } => {
            info!("Using database credentials from the environment");
            Ok(DatabaseCredentials {
                username,
                password,
                host: None,
                port: None,
                dbname: None,
            })
        }
    }
}

fn parse_credentials(secret: &str) -> Result<DatabaseCredentials> {
    serde_json::from_str(secret)
        .map_err(|e| Error::Aws(format!("Failed to parse database credentials: {}", e)))
}
