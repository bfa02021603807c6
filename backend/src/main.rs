use std::sync::Arc;

use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::infra::db::postgres::postgres_connection::{self, PoolSettings};
use crates::payments::stripe_client::{StripeClient, StripeConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        PoolSettings::default(),
    )?;
    info!("Postgres connection has been established");

    let stripe = &dotenvy_env.stripe;
    let stripe_client = StripeClient::new(StripeConfig {
        secret_key: stripe.secret_key.clone(),
        webhook_secret: stripe.webhook_secret.clone(),
        api_base: stripe.api_base.clone(),
        webhook_tolerance_secs: stripe.webhook_tolerance_secs,
        request_timeout: stripe.request_timeout,
    })?;
    info!("Stripe client has been configured");

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(stripe_client),
    )
    .await?;

    Ok(())
}
