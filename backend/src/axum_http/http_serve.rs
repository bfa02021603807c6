use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
};
use crates::{
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payments::PaymentPostgres, plans::PlanPostgres, subscriptions::SubscriptionPostgres,
            webhook_events::WebhookEventPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    axum_http::{default_routers, routers, routers::webhooks::STRIPE_SIGNATURE_HEADER},
    config::config_model::DotEnvyConfig,
    usecases::payments::PaymentUseCase,
};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
) -> Result<()> {
    let payment_usecase = PaymentUseCase::new(
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
    );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1", routers::routes(Arc::new(payment_usecase)))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([
                    CONTENT_TYPE,
                    HeaderName::from_static(STRIPE_SIGNATURE_HEADER),
                ])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        stage = %config.stage,
        "Server is running on port {}",
        config.backend_server.port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
