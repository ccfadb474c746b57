use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{internal_error, AppError};

const SOCIAL_DOMAINS: [&str; 5] = [
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
];

/// Markup-derived signals. An empty document yields all defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignals {
    /// Trimmed text of the first `<title>`, empty when absent.
    pub title: String,
    pub has_favicon: bool,
    pub has_description: bool,
    pub has_social_net: bool,
    pub has_submit_button: bool,
    pub has_hidden_fields: bool,
    pub has_copyright_info: bool,
}

pub struct PageParser {
    title: Selector,
    favicon: Selector,
    description: Selector,
    submit: Selector,
    hidden: Selector,
    links: Selector,
}

impl PageParser {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            title: selector("title")?,
            favicon: selector(r#"link[rel~="icon"]"#)?,
            description: selector(r#"meta[name="description"]"#)?,
            submit: selector(r#"input[type="submit"]"#)?,
            hidden: selector(r#"input[type="hidden"]"#)?,
            links: selector("a[href]")?,
        })
    }

    pub fn parse(&self, html: &str) -> PageSignals {
        if html.is_empty() {
            return PageSignals::default();
        }

        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let has_social_net = document.select(&self.links).any(|link| {
            let href = link.value().attr("href").unwrap_or_default().to_lowercase();
            SOCIAL_DOMAINS.iter().any(|domain| href.contains(domain))
        });

        let has_copyright_info = document
            .root_element()
            .text()
            .any(|text| text.to_lowercase().contains("copyright"));

        PageSignals {
            title,
            has_favicon: document.select(&self.favicon).next().is_some(),
            has_description: document.select(&self.description).next().is_some(),
            has_social_net,
            has_submit_button: document.select(&self.submit).next().is_some(),
            has_hidden_fields: document.select(&self.hidden).next().is_some(),
            has_copyright_info,
        }
    }
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| internal_error(&format!("bad selector {}: {}", css, e)))
}

/// Single-shot page download. Redirects are followed and any status is
/// accepted; the caller decides what a failure means.
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> Result<String, AppError> {
        let response = self.client.get(url.clone()).send().await?;
        debug!("Fetched {} with status {}", url, response.status());
        Ok(response.text().await?)
    }
}
