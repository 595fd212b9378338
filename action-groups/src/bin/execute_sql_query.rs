//! Execute SQL Query Lambda - Free-form read-only query action group.
//!
//! Validates the query against the read-only rules, runs it with a
//! server-side execution cap, and returns rows or a classified failure.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use query_gateway::{db, handlers, resolve_database_credentials, Config, MySqlRunner};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across invocations.
struct AppState {
    runner: MySqlRunner,
    default_timeout_secs: u64,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

        let credentials = resolve_database_credentials(&config, &secrets_client).await?;
        let pool = db::create_pool(&config, &credentials);

        info!(
            "SQL executor ready: host={}, database={}, default_timeout={}s",
            config.db_host, config.db_name, config.query_timeout_secs
        );

        Ok(Self {
            runner: MySqlRunner::new(pool),
            default_timeout_secs: config.query_timeout_secs,
        })
    }
}

async fn handler(state: Arc<AppState>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    info!("Invocation {}", event.context.request_id);
    Ok(handlers::execute_sql_query(&state.runner, state.default_timeout_secs, &event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
