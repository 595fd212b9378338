//! Get KPI Data Lambda - Aggregated KPI retrieval action group.
//!
//! Maps KPI ids to columns of the pre-aggregated metrics table, runs one
//! SELECT over the requested months, and returns formatted rows with a
//! data-quality verdict.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use query_gateway::{db, handlers, resolve_database_credentials, Config, KpiCatalog, KpiContext, MySqlRunner};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn build_context() -> Result<KpiContext, Error> {
    let config = Config::from_env()?;
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .load()
        .await;
    let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

    let credentials = resolve_database_credentials(&config, &secrets_client).await?;
    let pool = db::create_pool(&config, &credentials);

    let catalog = KpiCatalog::load_or_empty(&config.kpi_metadata_candidates());
    info!(
        "KPI data ready: table={}, mapped_kpis={}",
        config.kpi_table,
        catalog.mapped_count()
    );

    Ok(KpiContext {
        runner: Arc::new(MySqlRunner::new(pool)),
        catalog: Arc::new(catalog),
        table: config.kpi_table,
        timeout_secs: config.query_timeout_secs,
    })
}

async fn handler(ctx: Arc<KpiContext>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    info!("Invocation {}", event.context.request_id);
    Ok(handlers::get_kpi_data(&ctx, &event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let ctx = Arc::new(build_context().await?);

    run(service_fn(move |event| {
        let ctx = Arc::clone(&ctx);
        async move { handler(ctx, event).await }
    }))
    .await
}
