//! Crypto news digest: binary entrypoint.
//! One invocation = one pipeline run; meant to be started by cron or a
//! scheduled job. Exit code 0 on success or an early "nothing to send" stop.

use std::process::ExitCode;

use crypto_news_digest::bootstrap::Runtime;
use crypto_news_digest::config::AppConfig;
use crypto_news_digest::failure_notice;
use crypto_news_digest::metrics::Metrics;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("pipeline=info,ingest=info,ledger=info,notify=info,oracle=warn,warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Configuration errors abort before any network I/O.
    let cfg = match AppConfig::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %format!("{e:#}"), "configuration error");
            return ExitCode::FAILURE;
        }
    };

    let metrics = match cfg.metrics.textfile.clone().map(Metrics::init).transpose() {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    let runtime = match Runtime::from_config(cfg) {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.pipeline.run().await;

    if let Some(m) = &metrics {
        if let Err(e) = m.flush() {
            warn!(error = %e, "could not write metrics textfile");
        }
    }

    match result {
        Ok(report) => {
            info!(
                fetched = report.fetched,
                keyword_kept = report.keyword_kept,
                ai_kept = report.ai_kept,
                unsent = report.unsent,
                delivered = report.delivered,
                outcome = ?report.outcome,
                "run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            let notifier = runtime.pipeline.notifier();
            if let Err(notify_err) = notifier.send_text(&failure_notice(&e)).await {
                warn!(error = %notify_err, "failure notice not delivered");
            }
            ExitCode::FAILURE
        }
    }
}
