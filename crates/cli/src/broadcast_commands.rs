use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::Args,
    herald_common::types::Frequency,
    herald_config::HeraldConfig,
    herald_delivery::{
        BroadcastFilter, DeliveryPipeline, FileQueue, PendingQueue, RateLimit, plan_broadcast,
    },
    herald_telegram::TelegramSender,
    tracing::{info, warn},
};

use crate::{open_registry, require_token};

#[derive(Args)]
pub struct BroadcastArgs {
    /// Queue file (overrides `delivery.queue_path`).
    #[arg(long)]
    queue: Option<PathBuf>,

    /// Exit non-zero when any message failed or was skipped.
    #[arg(long, default_value_t = false)]
    fail_on_error: bool,

    /// Write a Prometheus textfile after the run (overrides
    /// `delivery.metrics_textfile`).
    #[arg(long)]
    metrics_textfile: Option<PathBuf>,
}

#[derive(Args)]
pub struct EnqueueArgs {
    /// Message body.
    #[arg(short, long)]
    message: String,

    /// Only subscribers with this frequency.
    #[arg(long)]
    frequency: Option<Frequency>,

    /// Only subscribers following this source id (`#` optional).
    #[arg(long)]
    source: Option<String>,

    /// Queue file (overrides `delivery.queue_path`).
    #[arg(long)]
    queue: Option<PathBuf>,
}

pub async fn broadcast(
    config: &HeraldConfig,
    data_dir: Option<&PathBuf>,
    args: BroadcastArgs,
) -> anyhow::Result<()> {
    let token = require_token(config)?;
    let registry = open_registry(config, data_dir).await?;
    let textfile = args
        .metrics_textfile
        .or_else(|| config.delivery.metrics_textfile.clone());

    #[cfg(feature = "metrics")]
    let metrics = herald_metrics::init_metrics(herald_metrics::MetricsRecorderConfig {
        enabled: textfile.is_some(),
        global_labels: Vec::new(),
    })?;

    let queue = FileQueue::new(
        args.queue
            .unwrap_or_else(|| config.delivery.queue_path.clone()),
    );
    let pipeline = DeliveryPipeline::new(
        TelegramSender::from_token(token),
        registry,
        RateLimit::per_second(config.delivery.max_messages_per_second),
    );

    info!(queue = %queue.path().display(), "starting broadcast");
    let report = pipeline.run_queue(&queue).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &textfile {
        #[cfg(feature = "metrics")]
        write_textfile(path, &metrics.render()).await?;
        #[cfg(not(feature = "metrics"))]
        warn!(path = %path.display(), "built without metrics, textfile not written");
    }

    if args.fail_on_error && !report.is_clean() {
        anyhow::bail!(
            "{} of {} messages failed, {} queue entries skipped{}",
            report.failed.len(),
            report.attempted,
            report.skipped,
            report
                .queue_error
                .as_deref()
                .map(|e| format!(", delivered batch not cleared: {e}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn enqueue(
    config: &HeraldConfig,
    data_dir: Option<&PathBuf>,
    args: EnqueueArgs,
) -> anyhow::Result<()> {
    if args.message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }
    let registry = open_registry(config, data_dir).await?;
    let filter = BroadcastFilter {
        frequency: args.frequency,
        source_id: args
            .source
            .map(|s| s.trim().trim_start_matches('#').to_string())
            .filter(|s| !s.is_empty()),
    };

    let subscriptions = registry.scan().await?;
    let planned = plan_broadcast(&subscriptions, &filter, &args.message);
    if planned.is_empty() {
        warn!(?filter, "no subscribers match, nothing queued");
        return Ok(());
    }

    let queue = FileQueue::new(
        args.queue
            .unwrap_or_else(|| config.delivery.queue_path.clone()),
    );
    queue.append(&planned).await?;
    info!(
        queued = planned.len(),
        queue = %queue.path().display(),
        "messages queued"
    );
    println!("Queued {} message(s) in {}", planned.len(), queue.path().display());
    Ok(())
}

/// Atomic write so a node-exporter scrape never sees a partial file.
#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
async fn write_textfile(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path).await?;
    info!(path = %path.display(), "metrics textfile written");
    Ok(())
}
