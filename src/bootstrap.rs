// src/bootstrap.rs
use crate::analyze::ai_adapter::{DynOracle, FixedOracle, OpenAiOracle, OracleHandle};
use crate::config::AppConfig;
use crate::ingest::providers::{http_client, rss::RssProvider, web::WebProvider};
use crate::ingest::types::SourceProvider;
use crate::ledger::Ledger;
use crate::notify::telegram::TelegramNotifier;
use crate::notify::{Notifier, StdoutNotifier};
use crate::pipeline::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Everything one scheduled run needs, wired from config.
pub struct Runtime {
    pub cfg: AppConfig,
    pub pipeline: Pipeline,
}

pub fn build_oracle(cfg: &AppConfig) -> anyhow::Result<DynOracle> {
    if cfg.mock_ai {
        return Ok(Arc::new(FixedOracle::neutral()));
    }
    let oracle = OpenAiOracle::new(
        cfg.ai.api_key.clone(),
        &cfg.ai.model,
        &cfg.ai.base_url,
        Duration::from_secs(cfg.ai.timeout_secs),
    )?;
    Ok(Arc::new(oracle))
}

pub fn build_notifier(cfg: &AppConfig) -> Arc<dyn Notifier> {
    if cfg.dry_run {
        return Arc::new(StdoutNotifier);
    }
    Arc::new(
        TelegramNotifier::new(cfg.telegram.bot_token.clone(), cfg.telegram.chat_id.clone())
            .with_timeout(cfg.telegram.timeout_secs),
    )
}

impl Runtime {
    pub fn from_config(cfg: AppConfig) -> anyhow::Result<Self> {
        // Safe diagnostics: only provider + mode flags + key length
        info!(
            "config loaded: provider={}, model={}, mock_ai={}, dry_run={}, key_len={}, rss={}, web={}",
            cfg.ai.provider,
            cfg.ai.model,
            cfg.mock_ai,
            cfg.dry_run,
            cfg.ai.api_key.len(),
            cfg.rss.len(),
            cfg.web.len()
        );

        let client = http_client(FETCH_TIMEOUT)?;
        let rss: Vec<Box<dyn SourceProvider>> = cfg
            .rss
            .iter()
            .map(|spec| {
                Box::new(RssProvider::from_url(spec.clone(), client.clone())) as Box<dyn SourceProvider>
            })
            .collect();
        let web = cfg
            .web
            .iter()
            .map(|spec| {
                WebProvider::from_url(spec.clone(), client.clone())
                    .map(|p| Box::new(p) as Box<dyn SourceProvider>)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let oracle = OracleHandle::new(
            build_oracle(&cfg)?,
            Duration::from_secs(cfg.ai.timeout_secs),
        );
        let ledger =
            Ledger::new(cfg.ledger.path.clone()).with_retention_days(cfg.ledger.retention_days);

        let pipeline = Pipeline::new(oracle, build_notifier(&cfg), ledger)
            .with_rss(rss)
            .with_web(web)
            .with_keywords(cfg.keyword_categories())
            .with_pacing(cfg.pacing.to_pacing())
            .with_retry(cfg.telegram.retry_policy())
            .with_language(&cfg.ai.language)
            .with_max_items(cfg.digest.max_items);

        Ok(Self { cfg, pipeline })
    }
}
