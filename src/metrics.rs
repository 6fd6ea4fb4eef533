use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

/// One-time metrics registration (so series show up in the export).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_fetched_total", "News items fetched and normalized.");
        describe_counter!(
            "digest_provider_errors_total",
            "Source fetch/parse errors."
        );
        describe_counter!(
            "digest_keyword_kept_total",
            "Items kept by the keyword prefilter."
        );
        describe_counter!("digest_ai_kept_total", "Items judged relevant by the oracle.");
        describe_counter!(
            "digest_oracle_fallback_total",
            "Oracle replies replaced by a fallback, by stage."
        );
        describe_counter!("digest_delivered_total", "Items delivered and recorded.");
        describe_counter!(
            "digest_delivery_failures_total",
            "Messages that failed after all retries."
        );
        describe_gauge!("digest_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Prometheus recorder whose output goes to a node-exporter textfile.
pub struct Metrics {
    handle: PrometheusHandle,
    textfile: PathBuf,
}

impl Metrics {
    pub fn init(textfile: PathBuf) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle, textfile })
    }

    /// Render the exposition text and swap it into place.
    pub fn flush(&self) -> Result<()> {
        let body = self.handle.render();
        let tmp = self.textfile.with_extension("prom.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("writing metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.textfile)?;
        Ok(())
    }
}
