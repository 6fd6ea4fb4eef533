// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{Origin, RawRecord, SourceProvider, SourceSpec};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

/// RSS 2.0 feed provider.
pub struct RssProvider {
    spec: SourceSpec,
    mode: Mode,
}

impl RssProvider {
    pub fn from_url(spec: SourceSpec, client: reqwest::Client) -> Self {
        Self {
            spec,
            mode: Mode::Http(client),
        }
    }

    /// Serve a fixed XML document instead of hitting the network.
    pub fn from_fixture(spec: SourceSpec, xml: &str) -> Self {
        Self {
            spec,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn parse_items_from_str(s: &str) -> Result<Vec<RawRecord>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        Ok(rss
            .channel
            .item
            .into_iter()
            .map(|it| RawRecord {
                title: it.title,
                description: it.description,
                link: it.link,
                published: it.pub_date,
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http(client) => {
                let body = client
                    .get(&self.spec.url)
                    .send()
                    .await
                    .with_context(|| format!("rss get {}", self.spec.url))?
                    .error_for_status()
                    .with_context(|| format!("rss status {}", self.spec.url))?
                    .text()
                    .await
                    .context("rss body")?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn origin(&self) -> Origin {
        Origin::Rss
    }

    fn base_url(&self) -> &str {
        &self.spec.url
    }
}

// quick-xml only knows the five XML entities.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
