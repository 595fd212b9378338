//! Database connection management.

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

use crate::secrets::DatabaseCredentials;
use crate::Config;

/// Create a MySQL connection pool.
///
/// Connections are opened lazily so an unreachable database surfaces as a
/// classified failure on the invocation that needs it rather than at cold start.
/// Host, port and schema from the secret override the environment when present.
pub fn create_pool(config: &Config, credentials: &DatabaseCredentials) -> MySqlPool {
    let options = MySqlConnectOptions::new()
        .host(credentials.host.as_deref().unwrap_or(&config.db_host))
        .port(credentials.port.unwrap_or(config.db_port))
        .database(credentials.dbname.as_deref().unwrap_or(&config.db_name))
        .username(&credentials.username)
        .password(&credentials.password);

    MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(options)
}
