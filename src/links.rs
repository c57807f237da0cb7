//! Link extraction and Amazon product URL normalization.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*\\(),]|%[0-9a-fA-F]{2})+").expect("url pattern")
});

static CANONICAL_PRODUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://www\.amazon\.in/.*?/dp/[A-Z0-9]{10}").expect("product pattern")
});

static ASIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("asin pattern"));

/// Every URL-shaped substring of `text`, in order of appearance.
pub fn find_links(text: &str) -> Vec<&str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

/// Cheap pre-filter applied before a link is resolved over the network.
pub fn is_amazon_candidate(link: &str) -> bool {
    link.contains("amazon") || link.contains("amzn")
}

/// Reduces a product URL to `https://www.amazon.in/<slug>/dp/<ASIN>`,
/// dropping query strings and trailing path segments.
pub fn canonicalize_amazon_url(url: &str) -> Option<String> {
    CANONICAL_PRODUCT
        .find(url)
        .map(|m| m.as_str().to_string())
}

pub fn extract_asin(url: &str) -> Option<String> {
    ASIN.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
