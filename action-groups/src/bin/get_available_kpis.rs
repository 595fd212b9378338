//! Get Available KPIs Lambda - Catalog listing action group.
//!
//! Returns the KPI catalog entries for a customer so the planning agent can
//! choose which KPI ids to request.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use query_gateway::{config, handlers, KpiCatalog};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn handler(catalog: Arc<KpiCatalog>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    info!("Invocation {}", event.context.request_id);
    Ok(handlers::get_available_kpis(&catalog, &event.payload))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let catalog = Arc::new(KpiCatalog::load(&config::metadata_candidates_from_env())?);
    info!("Loaded {} KPIs", catalog.descriptors().len());

    run(service_fn(move |event| {
        let catalog = Arc::clone(&catalog);
        async move { handler(catalog, event).await }
    }))
    .await
}
