mod config;
mod constants;
mod domain;
mod ledger;
mod models;
mod privacy_sweep;
mod routes;
mod services;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, ContainerNames};
use ledger::{Ledger, PgLedger};
use services::counters::CounterService;
use services::identity::FirebaseIdentityStore;
use services::privacy::ViewLimitPolicy;
use services::promotion::PromotionCoordinator;
use services::storage::{AzureSasSigner, StorageUrls, UnconfiguredStorage};
use services::visibility::VisibilityResolver;

pub struct AppState {
    pub db: PgPool,
    pub ledger: Arc<dyn Ledger>,
    pub resolver: VisibilityResolver,
    pub counters: CounterService,
    pub promotion: PromotionCoordinator,
    pub storage: Arc<dyn StorageUrls>,
    pub containers: ContainerNames,
    pub jwt_secret: Vec<u8>,
    pub frontend_url: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return Ok(cors.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {}", o)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(cors.allow_origin(origins).allow_credentials(true))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let identity = FirebaseIdentityStore::new(
        &config.firebase.project_id,
        &config.firebase.api_key,
        &config.firebase.access_token,
    )
    .context("Failed to build identity store client")?;

    let storage: Arc<dyn StorageUrls> = match &config.azure {
        Some(azure) => Arc::new(
            AzureSasSigner::new(&azure.account_name, &azure.account_key)
                .context("Invalid Azure storage credentials")?,
        ),
        None => {
            tracing::warn!("Azure storage not configured; upload URLs will be null");
            Arc::new(UnconfiguredStorage)
        }
    };

    let ledger: Arc<dyn Ledger> = Arc::new(PgLedger::new(pool.clone()));
    let policy = Arc::new(ViewLimitPolicy::new(config.default_video_view_limit));

    let state = Arc::new(AppState {
        db: pool.clone(),
        resolver: VisibilityResolver::new(ledger.clone()),
        counters: CounterService::new(ledger.clone(), policy),
        promotion: PromotionCoordinator::new(ledger.clone(), Arc::new(identity)),
        ledger,
        storage,
        containers: config.containers.clone(),
        jwt_secret: config.jwt_secret.clone().into_bytes(),
        frontend_url: config.frontend_url.clone(),
    });

    let sweep_pool = pool.clone();
    let default_view_limit = config.default_video_view_limit;
    let schedule = config.privacy_sweep_cron.clone();
    tokio::spawn(async move {
        if let Err(e) =
            privacy_sweep::run_privacy_sweep_worker(sweep_pool, default_view_limit, schedule).await
        {
            tracing::error!(error = %e, "privacy sweep worker stopped");
        }
    });

    let app = routes::build_routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins)?)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "listening");
    // Connect info feeds the rate limiter's IP key
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server failed")
}
