use polysleuth::api::router::create_router;
use polysleuth::config::AppConfig;
use polysleuth::services::scheduler::run_detection_scheduler;
use polysleuth::{db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected");

    let metrics_handle = metrics::init_metrics();

    // Periodic batch detection over accumulated trades.
    let scheduler_pool = pool.clone();
    let scheduler_config = config.clone();
    tokio::spawn(async move {
        run_detection_scheduler(scheduler_pool, scheduler_config).await;
    });
    tracing::info!(
        interval_secs = config.detection_interval_secs,
        shards = config.detection_shards,
        "Detection scheduler spawned"
    );

    let state = AppState {
        db: pool,
        config,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
