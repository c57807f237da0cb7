use crate::http::build_client;
use crate::models::ProductDetails;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;

pub const PRICE_PLACEHOLDER: &str = "Check Website";
const CURRENCY_SYMBOL: &str = "₹";

static TITLE_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("#productTitle").ok());
static PRICE_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".a-price-whole").ok());

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("product page has no title")]
    MissingTitle,
}

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn fetch_details(&self, url: &str) -> Result<ProductDetails, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ProductFetcher {
    http: Client,
}

impl ProductFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        Self {
            http: build_client(timeout, user_agent),
        }
    }
}

#[async_trait]
impl ProductLookup for ProductFetcher {
    async fn fetch_details(&self, url: &str) -> Result<ProductDetails, FetchError> {
        let html = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?
            .text()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;
        parse_product_page(&html, url)
    }
}

/// Extracts title and price from a product page. The title is required; a
/// missing price becomes [`PRICE_PLACEHOLDER`].
pub fn parse_product_page(html: &str, url: &str) -> Result<ProductDetails, FetchError> {
    let doc = Html::parse_document(html);

    let title = select_text(&doc, &TITLE_SELECTOR)
        .filter(|title| !title.is_empty())
        .ok_or(FetchError::MissingTitle)?;

    let price = select_text(&doc, &PRICE_SELECTOR)
        .map(|whole| format!("{CURRENCY_SYMBOL}{whole}"))
        .unwrap_or_else(|| PRICE_PLACEHOLDER.to_string());

    Ok(ProductDetails {
        title,
        price,
        url: url.to_string(),
    })
}

fn select_text(doc: &Html, selector: &Option<Selector>) -> Option<String> {
    let selector = selector.as_ref()?;
    doc.select(selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
