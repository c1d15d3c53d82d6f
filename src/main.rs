use anyhow::Result;
use hospitals_etl::{Config, Orchestrator};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(
        output_dir = %config.output_dir.display(),
        catalog = %config.catalog_url,
        workers = config.max_workers,
        watermark = %config.watermark,
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let orchestrator = Orchestrator::new(config)?;
    match orchestrator.run().await {
        Ok(summary) => {
            info!(processed = summary.processed.len(), "all done");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run aborted");
            Err(e.into())
        }
    }
}
