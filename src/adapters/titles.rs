use crate::domain::ports::TitleLookup;
use crate::utils::error::Result;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://www.uspto.gov/web/patents/classification/cpc/html/cpc-{}.html";
pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const CPC_NOT_FOUND: &str = "CPC not found";

static UPPERCASE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]+\b").expect("uppercase word pattern is valid"));

/// Scrapes CPC titles from the USPTO classification pages.
pub struct UsptoTitleLookup {
    client: Client,
    url_template: String,
}

impl UsptoTitleLookup {
    pub fn new(url_template: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    /// `B64C39/024` → `.../cpc-B64C39-024.html`
    pub fn page_url(&self, code: &str) -> String {
        self.url_template.replace("{}", &code.replace('/', "-"))
    }

    async fn fetch(&self, code: &str) -> std::result::Result<String, reqwest::Error> {
        let response = self.client.get(self.page_url(code)).send().await?;
        if !response.status().is_success() {
            tracing::debug!("Title page for {} returned {}", code, response.status());
            return Ok(CPC_NOT_FOUND.to_string());
        }
        let html = response.text().await?;
        Ok(extract_title(&html).unwrap_or_else(|| TITLE_NOT_FOUND.to_string()))
    }
}

#[async_trait]
impl TitleLookup for UsptoTitleLookup {
    async fn title(&self, code: &str) -> String {
        match self.fetch(code).await {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!("Title lookup for {} failed: {}", code, e);
                format!("Error fetching title: {}", e)
            }
        }
    }
}

/// Text of the first `div.class-title`, reduced to its all-caps words.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.class-title").ok()?;
    let element = document.select(&selector).next()?;

    let full_title = element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let words: Vec<&str> = UPPERCASE_WORD
        .find_iter(&full_title)
        .map(|m| m.as_str())
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}
