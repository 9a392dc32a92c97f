use anyhow::{bail, Result};
use chartexport_config::ExportConfig;
use chartexport_worker::Worker;
use tracing::info;

/// Spawn a worker and report whether it answers a liveness ping
pub async fn ping_command(config: &ExportConfig) -> Result<()> {
    let worker = Worker::spawn(&config.worker).await?;
    let outcome = worker.ping().await;
    let state = worker.state();
    worker.cleanup();

    if outcome? {
        println!("Worker on port {} is alive ({})", worker.port(), state);
        info!("Ping succeeded");
        Ok(())
    } else {
        bail!(
            "Worker on port {} gave an unexpected ping answer ({})",
            worker.port(),
            state
        )
    }
}
