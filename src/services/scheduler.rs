use sqlx::PgPool;
use tokio::time::{interval, Duration};

use crate::config::AppConfig;
use crate::engine;

/// Trigger a detection run on a fixed interval. The engine is a batch
/// recompute, so an individual failed run is logged and the next tick just
/// tries again.
pub async fn run_detection_scheduler(pool: PgPool, config: AppConfig) {
    let mut ticker = interval(Duration::from_secs(config.detection_interval_secs));

    loop {
        ticker.tick().await;

        tracing::debug!("Detection scheduler: starting run");

        match engine::run_detection(&pool, &config).await {
            Ok(summary) => {
                if summary.errored > 0 {
                    tracing::warn!(
                        errored = summary.errored,
                        "Detection run finished with errors"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Detection run failed");
            }
        }
    }
}
