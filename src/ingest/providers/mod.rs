pub mod rss;
pub mod web;

use std::time::Duration;

/// Shared HTTP client for fetch collaborators.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent("crypto-news-digest/0.1")
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()?;
    Ok(client)
}
