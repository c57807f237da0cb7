use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Title and price scraped from a product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetails {
    pub title: String,
    pub price: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedLink {
    pub url: String,
    pub asin: Option<String>,
    pub tag: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed,
    SendFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedLink {
    pub url: String,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

/// Summary of one relay run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub dry_run: bool,
    pub candidates: usize,
    pub published: Vec<PublishedLink>,
    pub skipped: Vec<SkippedLink>,
    pub next_tag_index: usize,
    pub stages: Vec<StageReport>,
}
