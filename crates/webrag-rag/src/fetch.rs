//! Page fetching and readable-text extraction.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::Client;
use tracing::{debug, warn};

use webrag_core::config::FetchSettings;
use webrag_core::traits::TextFetcher;

const STRIPPED_BLOCKS: [&str; 6] = ["script", "style", "nav", "footer", "header", "aside"];
const MAIN_CONTENT_ID: &str = "mw-content-text";

/// Regex-based HTML to text conversion.
///
/// Boilerplate blocks are removed wholesale, the main article container is
/// preferred when the page has one, every remaining tag becomes a line break
/// and common entities are decoded.
pub struct HtmlExtractor {
    blocks: Vec<Regex>,
    comment: Regex,
    main_open: Regex,
    div_tag: Regex,
    tag: Regex,
    entity: Regex,
}

impl HtmlExtractor {
    pub fn new() -> Result<Self> {
        let blocks = STRIPPED_BLOCKS
            .iter()
            .map(|name| Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>")))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            blocks,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            main_open: Regex::new(&format!(r#"(?i)<div\b[^>]*\bid\s*=\s*["']{MAIN_CONTENT_ID}["'][^>]*>"#))?,
            div_tag: Regex::new(r"(?i)<(/?)div\b[^>]*>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            entity: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);")?,
        })
    }

    pub fn extract(&self, html: &str) -> String {
        let mut cleaned = self.comment.replace_all(html, " ").into_owned();
        for block in &self.blocks {
            cleaned = block.replace_all(&cleaned, " ").into_owned();
        }
        let body = self.main_content(&cleaned).unwrap_or(&cleaned);
        let text = self.tag.replace_all(body, "\n");
        let text = self.entity.replace_all(&text, |caps: &Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()));

        text.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
    }

    /// Inner HTML of the main content `<div>`, balanced against nested divs.
    fn main_content<'a>(&self, html: &'a str) -> Option<&'a str> {
        let open = self.main_open.find(html)?;
        let inner_start = open.end();
        let mut depth = 1usize;
        for caps in self.div_tag.captures_iter(&html[inner_start..]) {
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if closing {
                depth -= 1;
                if depth == 0 {
                    let whole = caps.get(0)?;
                    return Some(&html[inner_start..inner_start + whole.start()]);
                }
            } else {
                depth += 1;
            }
        }
        Some(&html[inner_start..])
    }
}

fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

pub struct HttpFetcher {
    client: Client,
    extractor: HtmlExtractor,
}

impl HttpFetcher {
    pub fn from_settings(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("building fetch HTTP client")?;
        Ok(Self { client, extractor: HtmlExtractor::new()? })
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "fetch returned non-success status");
            return Ok(String::new());
        }
        let html = response.text().await.with_context(|| format!("reading body of {url}"))?;
        let text = self.extractor.extract(&html);
        debug!(url, html_bytes = html.len(), text_chars = text.len(), "extracted page text");
        Ok(text)
    }
}
