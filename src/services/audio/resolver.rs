//! Resolution of a word to its remote pronunciation audio.
//!
//! One request to the ordnet.dk dictionary lookup page, then a fixed
//! extraction pattern over the returned markup: the pronunciation section is
//! the element with `id="id-udt"`, and the audio reference is the first
//! anchor inside it whose id ends in `_fallback`.

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::errors::{FetchFailure, ResolveError};
use crate::models::ResourceLocator;

pub const ORDNET_BASE: &str = "https://ordnet.dk";
pub const SEARCH_URL: &str = "https://ordnet.dk/ddo/ordbog";

/// Resolves a word to the locator of its pronunciation audio.
#[async_trait]
pub trait AudioResolver: Send + Sync {
    async fn resolve(&self, word: &str) -> Result<ResourceLocator, ResolveError>;
}

/// Resolver backed by the ordnet.dk dictionary.
pub struct OrdnetResolver {
    client: Client,
}

impl OrdnetResolver {
    pub fn new(client: Client) -> Self {
        OrdnetResolver { client }
    }
}

#[async_trait]
impl AudioResolver for OrdnetResolver {
    async fn resolve(&self, word: &str) -> Result<ResourceLocator, ResolveError> {
        debug!("looking up '{}' at {}", word, SEARCH_URL);

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("query", word)])
            .send()
            .await
            .map_err(|e| ResolveError::Fetch(FetchFailure::from_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Fetch(FetchFailure::from_status(status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::Fetch(FetchFailure::from_transport(&e)))?;

        match extract_audio_url(&body) {
            Some(url) => {
                debug!("found audio URL for '{}': {}", word, url);
                Ok(ResourceLocator { url })
            }
            None => Err(ResolveError::NotFound),
        }
    }
}

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<a\b[^>]*>").unwrap());
static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href\s*=\s*"([^"]+)""#).unwrap());
static FALLBACK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"id\s*=\s*"[^"]*_fallback""#).unwrap());

/// Extract the first audio fallback link from the pronunciation section of a
/// lookup page. Returns `None` when the page has no pronunciation audio.
pub fn extract_audio_url(html: &str) -> Option<String> {
    let section_start = html.find(r#"id="id-udt""#)?;
    let section = &html[section_start..];

    for anchor in ANCHOR_RE.find_iter(section) {
        let tag = anchor.as_str();
        if !FALLBACK_ID_RE.is_match(tag) {
            continue;
        }
        if let Some(captures) = HREF_RE.captures(tag) {
            return Some(absolutize(&captures[1]));
        }
    }
    None
}

/// Turn a possibly relative href from the page into a full URL.
fn absolutize(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{ORDNET_BASE}{href}")
    } else {
        format!("{ORDNET_BASE}/ddo/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_WITH_AUDIO: &str = r#"
        <div class="definitionBoxTop"><span class="tekstmedium">substantiv, intetkøn</span></div>
        <div id="id-udt" class="definitionBox">
          <span class="lydskrift">[ˈhuˀs]</span>
          <a href="https://static.ordnet.dk/mp3/11019/11019539.mp3" id="11019539_fallback" class="lydSkrift">
            <img src="speaker.gif">
          </a>
        </div>"#;

    const PAGE_WITHOUT_SECTION: &str = r#"
        <div class="searchResultBox"><p>Ingen resultater</p></div>"#;

    const PAGE_SECTION_NO_LINK: &str = r#"
        <div id="id-udt" class="definitionBox">
          <span class="lydskrift">[ˈhuˀs]</span>
          <a href="/ddo/hjaelp" id="help_link">?</a>
        </div>"#;

    #[test]
    fn test_extracts_first_fallback_link() {
        assert_eq!(
            extract_audio_url(PAGE_WITH_AUDIO).as_deref(),
            Some("https://static.ordnet.dk/mp3/11019/11019539.mp3")
        );
    }

    #[test]
    fn test_no_pronunciation_section() {
        assert_eq!(extract_audio_url(PAGE_WITHOUT_SECTION), None);
    }

    #[test]
    fn test_section_without_fallback_anchor() {
        assert_eq!(extract_audio_url(PAGE_SECTION_NO_LINK), None);
    }

    #[test]
    fn test_relative_hrefs_are_absolutized() {
        let page = r#"<div id="id-udt"><a id="x_fallback" href="/mp3/a.mp3">s</a></div>"#;
        assert_eq!(
            extract_audio_url(page).as_deref(),
            Some("https://ordnet.dk/mp3/a.mp3")
        );

        let protocol_relative =
            r#"<div id="id-udt"><a id="x_fallback" href="//static.ordnet.dk/a.mp3">s</a></div>"#;
        assert_eq!(
            extract_audio_url(protocol_relative).as_deref(),
            Some("https://static.ordnet.dk/a.mp3")
        );
    }

    #[test]
    fn test_anchor_attribute_order_does_not_matter() {
        let page = r#"<div id="id-udt"><a id="y_fallback" class="lyd" href="https://x.dk/y.mp3">s</a></div>"#;
        assert_eq!(extract_audio_url(page).as_deref(), Some("https://x.dk/y.mp3"));
    }
}
