use anyhow::{bail, Context, Result};
use chartexport_config::ExportConfig;
use chartexport_worker::{Monitor, Worker};
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::signal;
use tracing::{debug, info, warn};

/// Read a job payload from a file, or from stdin when the source is `-`
pub async fn read_payload(source: &str) -> Result<String> {
    if source == "-" {
        let mut payload = String::new();
        tokio::io::stdin()
            .read_to_string(&mut payload)
            .await
            .context("Failed to read payload from stdin")?;
        Ok(payload)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read payload from {}", source))
    }
}

/// Spawn a worker, run the payload through it `repeat` times and print every
/// response. The worker is cleaned up on every exit path, Ctrl-C included.
pub async fn convert_command(config: &ExportConfig, source: &str, repeat: u32) -> Result<()> {
    let payload = read_payload(source).await?;
    debug!("Loaded {} byte payload from {}", payload.len(), source);

    let worker = Worker::spawn(&config.worker).await?;
    info!(
        "Worker ready on {}:{} (pid {:?})",
        worker.host(),
        worker.port(),
        worker.pid()
    );

    let monitor = Monitor::new();
    let result = run_jobs(config, &worker, &monitor, &payload, repeat).await;

    if config.monitor.enabled {
        info!("{}", monitor.report());
    }
    worker.cleanup();
    result
}

async fn run_jobs(
    config: &ExportConfig,
    worker: &Worker,
    monitor: &Monitor,
    payload: &str,
    repeat: u32,
) -> Result<()> {
    let mut last_report = Instant::now();

    for job in 1..=repeat {
        if config.monitor.enabled {
            monitor.add();
        }

        let outcome = tokio::select! {
            outcome = worker.request(payload) => outcome,
            _ = signal::ctrl_c() => {
                warn!("Received interrupt, shutting down worker on port {}", worker.port());
                worker.cleanup();
                bail!("Interrupted while job {} was running", job);
            }
        };

        match outcome {
            Ok(body) => println!("{}", body),
            Err(e) => {
                if config.monitor.enabled {
                    monitor.add_error();
                }
                return Err(e).with_context(|| format!("Job {} of {} failed", job, repeat));
            }
        }

        if config.monitor.enabled
            && job < repeat
            && last_report.elapsed() >= config.monitor.report_interval
        {
            info!("{}", monitor.report());
            last_report = Instant::now();
        }
    }

    Ok(())
}
