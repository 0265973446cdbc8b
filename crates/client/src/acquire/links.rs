//! Downloadable resource discovery on listing pages.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Subtype for plain exports.
pub const SUBTYPE_STANDARD: &str = "standard";

/// Subtype for exports that embed document metadata.
pub const SUBTYPE_WITH_METADATA: &str = "with_metadata";

/// A resource link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLink {
    /// Resolved absolute URL
    pub url: String,
    pub subtype: String,
    /// Anchor text, `[link]` when blank
    pub text: String,
}

/// Find export links in a listing page.
///
/// Every `<a href>` whose raw href matches `pattern` is resolved against
/// `base_url` and kept once (first occurrence wins). Hrefs containing
/// `export_meta` are classed as `with_metadata`, everything else as
/// `standard`.
pub fn discover_resources(html: &str, base_url: &Url, pattern: &Regex) -> Vec<ResourceLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if !pattern.is_match(href) {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        let resolved = resolved.to_string();

        if !seen.insert(resolved.clone()) {
            continue;
        }

        let subtype = if href.contains("export_meta") { SUBTYPE_WITH_METADATA } else { SUBTYPE_STANDARD };

        let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
        let text = if text.is_empty() { "[link]".to_string() } else { text };

        links.push(ResourceLink { url: resolved, subtype: subtype.to_string(), text });
    }

    links
}
