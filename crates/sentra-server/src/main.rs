//! Sentra fraud decision engine HTTP server.

use anyhow::Result;
use sentra_engine::{
    CaseCoordinator, DecisionPipeline, FeatureExtractor, MlPredictor, RuleEngine,
};
use sentra_repository::{PgCaseRepository, PgDecisionRepository, PgRuleRepository};
use sentra_server::api::{create_router, AppState};
use sentra_server::config::SentraConfig;
use sentra_store::RedisWindowStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = SentraConfig::load()?;
    info!(
        "configuration loaded: listening on {}:{}, strategy {:?}",
        config.server.host, config.server.port, config.fraud.scoring_strategy
    );

    let state = init_state(&config).await?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("server listening on http://{}", addr);
    info!("  health:  http://{}/health", addr);
    info!("  analyze: http://{}/api/v1/fraud/analyze", addr);

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    serve_with_graceful_shutdown(listener, app, grace).await?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sentra_server=info,sentra_engine=info,sentra_store=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    Ok(())
}

/// Wire up the pool, window store, repositories, engine, and pipeline.
async fn init_state(config: &SentraConfig) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("../sentra-repository/migrations")
        .run(&pool)
        .await?;
    info!("database connected, migrations applied");

    let store = Arc::new(RedisWindowStore::connect(&config.redis.url).await?);

    let rule_repo = Arc::new(PgRuleRepository::new(pool.clone()));
    let decision_repo = Arc::new(PgDecisionRepository::new(pool.clone()));
    let case_repo = Arc::new(PgCaseRepository::new(pool.clone()));

    let engine = Arc::new(RuleEngine::new(rule_repo, store.clone()));
    let predictor = Arc::new(MlPredictor::new(
        FeatureExtractor::new(
            config.fraud.high_value_threshold,
            config.fraud.blocked_countries.clone(),
        ),
        config.ml.model_version.clone(),
        config.ml.enabled,
    ));
    let coordinator = Arc::new(CaseCoordinator::new(case_repo, decision_repo.clone()));

    let pipeline = Arc::new(DecisionPipeline::new(
        engine.clone(),
        predictor,
        store.clone(),
        decision_repo.clone(),
        coordinator.clone(),
        config.fraud.pipeline_config(),
    ));

    Ok(AppState {
        pipeline,
        engine,
        coordinator,
        decisions: decision_repo,
        store,
        db: Some(pool),
    })
}

/// Serve until SIGINT/SIGTERM, then drain connections for at most `grace`.
async fn serve_with_graceful_shutdown(
    listener: TcpListener,
    app: axum::Router,
    grace: Duration,
) -> Result<()> {
    let notify = Arc::new(tokio::sync::Notify::new());
    let shutdown_notify = notify.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_notify.notified().await });
    let mut server = std::pin::pin!(std::future::IntoFuture::into_future(server));

    tokio::select! {
        result = &mut server => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, draining connections (up to {:?})", grace);
            notify.notify_one();
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!("shutdown grace period elapsed, exiting with open connections"),
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
