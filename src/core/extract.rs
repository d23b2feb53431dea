use crate::core::urls::{canonicalize, normalize_url};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector {selector:?}: {message}")]
    Selector {
        selector: &'static str,
        message: String,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// An image reference found on a page, with the best alt text known there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: Url,
    pub alt: String,
}

/// Everything a page contributes to the crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub links: Vec<Url>,
    pub images: Vec<ImageRef>,
}

/// Pulls same-host links and candidate image URLs out of page markup.
///
/// Malformed markup never fails extraction; it only yields fewer results.
pub struct Extractor {
    anchors: Selector,
    images: Selector,
    metas: Selector,
    styled: Selector,
    background: Regex,
}

fn selector(selector: &'static str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector,
        message: e.to_string(),
    })
}

impl Extractor {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            anchors: selector("a[href]")?,
            images: selector("img")?,
            metas: selector("meta")?,
            styled: selector("[style]")?,
            background: Regex::new(
                r#"(?i)background-image\s*:\s*url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"]*))\s*\)"#,
            )?,
        })
    }

    pub fn extract(&self, html: &str, page_url: &Url, base_host: &str) -> PageContent {
        let document = Html::parse_document(html);
        PageContent {
            links: self.links(&document, page_url, base_host),
            images: self.images(&document, page_url),
        }
    }

    /// Canonical http(s) links on `base_host`, first-seen order, no repeats.
    pub fn links(&self, document: &Html, page_url: &Url, base_host: &str) -> Vec<Url> {
        let mut seen = HashSet::new();
        document
            .select(&self.anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| normalize_url(page_url, href))
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .filter(|url| url.host_str() == Some(base_host))
            .map(|url| canonicalize(&url))
            .filter(|url| seen.insert(url.to_string()))
            .collect()
    }

    /// Image URLs from `<img>` src/srcset, `og:image` meta tags and inline
    /// `background-image` styles, first-seen order, no repeats.
    pub fn images(&self, document: &Html, page_url: &Url) -> Vec<ImageRef> {
        let mut found: Vec<ImageRef> = Vec::new();

        for img in document.select(&self.images) {
            let alt = img.value().attr("alt").unwrap_or_default().trim().to_string();
            if let Some(src) = img.value().attr("src").and_then(|s| normalize_url(page_url, s)) {
                found.push(ImageRef {
                    url: src,
                    alt: alt.clone(),
                });
            }
            if let Some(srcset) = img.value().attr("srcset") {
                for url in parse_srcset(srcset, page_url) {
                    found.push(ImageRef {
                        url,
                        alt: alt.clone(),
                    });
                }
            }
        }

        for meta in document.select(&self.metas) {
            if !is_social_preview(meta) {
                continue;
            }
            if let Some(content) = meta
                .value()
                .attr("content")
                .and_then(|c| normalize_url(page_url, c))
            {
                found.push(ImageRef {
                    url: content,
                    alt: String::new(),
                });
            }
        }

        for node in document.select(&self.styled) {
            let style = node.value().attr("style").unwrap_or_default();
            for caps in self.background.captures_iter(style) {
                let value = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                if let Some(url) = normalize_url(page_url, value) {
                    found.push(ImageRef {
                        url,
                        alt: String::new(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        found.retain(|image| seen.insert(image.url.to_string()));
        found
    }
}

fn is_social_preview(meta: ElementRef<'_>) -> bool {
    let attrs = meta.value();
    attrs
        .attr("property")
        .or_else(|| attrs.attr("name"))
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("og:image"))
}

/// First token of every comma-separated srcset candidate.
fn parse_srcset(srcset: &str, page_url: &Url) -> Vec<Url> {
    srcset
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .filter_map(|token| normalize_url(page_url, token))
        .collect()
}
