//! CSS-selector scraper for news listing pages.
//!
//! Each element matched by the configured selector becomes one record: the
//! element itself (when it is an `<a>`) or its first `a[href]` descendant
//! supplies link and title, the first `<p>` the description, and a
//! `time[datetime]` descendant the publication date.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::ingest::types::{Origin, RawRecord, SourceProvider, SourceSpec};

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

pub struct WebProvider {
    spec: SourceSpec,
    selector: String,
    mode: Mode,
}

impl WebProvider {
    pub fn from_url(spec: SourceSpec, client: reqwest::Client) -> Result<Self> {
        let selector = Self::selector_of(&spec)?;
        Ok(Self {
            spec,
            selector,
            mode: Mode::Http(client),
        })
    }

    pub fn from_fixture(spec: SourceSpec, html: &str) -> Result<Self> {
        let selector = Self::selector_of(&spec)?;
        Ok(Self {
            spec,
            selector,
            mode: Mode::Fixture(html.to_string()),
        })
    }

    fn selector_of(spec: &SourceSpec) -> Result<String> {
        let sel = spec
            .selector
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("web source `{}` has no selector", spec.name))?;
        parse_selector(&sel)?;
        Ok(sel)
    }
}

fn parse_selector(sel: &str) -> Result<Selector> {
    Selector::parse(sel).map_err(|e| anyhow!("invalid selector `{sel}`: {e:?}"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Extract records from an HTML document. Links are returned as found
/// (possibly relative); resolution happens during normalization.
pub fn parse_page(html: &str, selector: &str) -> Result<Vec<RawRecord>> {
    let item_sel = parse_selector(selector)?;
    let link_sel = parse_selector("a[href]")?;
    let para_sel = parse_selector("p")?;
    let time_sel = parse_selector("time[datetime]")?;

    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for el in doc.select(&item_sel) {
        let anchor = if el.value().name() == "a" {
            Some(el)
        } else {
            el.select(&link_sel).next()
        };
        let Some(anchor) = anchor else {
            continue;
        };
        let description = el.select(&para_sel).next().map(element_text);
        let published = el
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(str::to_string);

        out.push(RawRecord {
            title: Some(element_text(anchor)),
            description,
            link: anchor.value().attr("href").map(str::to_string),
            published,
        });
    }
    Ok(out)
}

#[async_trait]
impl SourceProvider for WebProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => parse_page(s, &self.selector),
            Mode::Http(client) => {
                let body = client
                    .get(&self.spec.url)
                    .send()
                    .await
                    .with_context(|| format!("web get {}", self.spec.url))?
                    .error_for_status()
                    .with_context(|| format!("web status {}", self.spec.url))?
                    .text()
                    .await
                    .context("web body")?;
                parse_page(&body, &self.selector)
            }
        }
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn origin(&self) -> Origin {
        Origin::Web
    }

    fn base_url(&self) -> &str {
        &self.spec.url
    }
}
