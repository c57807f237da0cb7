use crate::models::ProductDetails;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("bot api rejected message: {0}")]
    Rejected(String),
}

/// Destination for formatted posts.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_html(&self, text: &str) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for &T {
    async fn send_html(&self, text: &str) -> Result<(), PublishError> {
        (**self).send_html(text).await
    }
}

/// Round-robin over the configured affiliate tags, advanced only after a
/// successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRotation {
    tags: Vec<String>,
    index: usize,
}

impl TagRotation {
    /// `tags` must not be empty. A persisted index outside the range wraps.
    pub fn new(tags: Vec<String>, index: usize) -> Self {
        let index = if tags.is_empty() { 0 } else { index % tags.len() };
        Self { tags, index }
    }

    pub fn active(&self) -> &str {
        self.tags.get(self.index).map(String::as_str).unwrap_or_default()
    }

    pub fn advance(&mut self) {
        if !self.tags.is_empty() {
            self.index = (self.index + 1) % self.tags.len();
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Buy link for `product_url` attributed to `tag`.
pub fn affiliate_link(product_url: &str, tag: &str) -> String {
    let separator = if product_url.contains('?') { '&' } else { '?' };
    format!(
        "{product_url}{separator}tag={}",
        urlencoding::encode(tag)
    )
}

/// HTML caption in the subset Telegram accepts with `parse_mode=HTML`.
pub fn format_caption(details: &ProductDetails, tag: &str) -> String {
    let link = affiliate_link(&details.url, tag);
    format!(
        "🔥 <b>{title}</b>\n\n💰 <b>Price:</b> {price}\n\n🔗 <a href=\"{href}\">Buy Now (ID: {tag})</a>",
        title = html_escape::encode_text(&details.title),
        price = html_escape::encode_text(&details.price),
        href = html_escape::encode_double_quoted_attribute(&link),
        tag = html_escape::encode_text(tag),
    )
}

pub struct Publisher<S> {
    sink: S,
    rotation: TagRotation,
}

impl<S: MessageSink> Publisher<S> {
    pub fn new(sink: S, rotation: TagRotation) -> Self {
        Self { sink, rotation }
    }

    /// Sends one post and returns the tag it used. The rotation moves on only
    /// when the send succeeds.
    pub async fn publish(&mut self, details: &ProductDetails) -> Result<String, PublishError> {
        let tag = self.rotation.active().to_string();
        let caption = format_caption(details, &tag);
        self.sink.send_html(&caption).await?;
        info!(
            target = "relay.publisher",
            url = %details.url,
            tag = %tag,
            "product posted"
        );
        self.rotation.advance();
        Ok(tag)
    }

    pub fn rotation(&self) -> &TagRotation {
        &self.rotation
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<String>>,
        pub(crate) fail_on: Option<usize>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_html(&self, text: &str) -> Result<(), PublishError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_on == Some(sent.len()) {
                // Fail once; later sends go through.
                sent.push(String::new());
                return Err(PublishError::Rejected("chat not found".into()));
            }
            sent.push(text.to_string());
            Ok(())
        }
    }

    fn details(title: &str) -> ProductDetails {
        ProductDetails {
            title: title.to_string(),
            price: "₹1,299".to_string(),
            url: "https://www.amazon.in/Some-Product/dp/B0TESTID99".to_string(),
        }
    }

    fn tags() -> Vec<String> {
        vec!["first-21".to_string(), "second-21".to_string()]
    }

    #[test]
    fn rotation_wraps_out_of_range_index() {
        let rotation = TagRotation::new(tags(), 3);
        assert_eq!(rotation.index(), 1);
        assert_eq!(rotation.active(), "second-21");
    }

    #[test]
    fn single_tag_never_moves() {
        let mut rotation = TagRotation::new(vec!["only-21".to_string()], 0);
        rotation.advance();
        rotation.advance();
        assert_eq!(rotation.index(), 0);
        assert_eq!(rotation.active(), "only-21");
    }

    #[test]
    fn affiliate_link_appends_tag() {
        assert_eq!(
            affiliate_link("https://www.amazon.in/X/dp/B0TESTID99", "my tag&1"),
            "https://www.amazon.in/X/dp/B0TESTID99?tag=my%20tag%261"
        );
        assert_eq!(
            affiliate_link("https://www.amazon.in/X/dp/B0TESTID99?th=1", "t-21"),
            "https://www.amazon.in/X/dp/B0TESTID99?th=1&tag=t-21"
        );
    }

    #[test]
    fn caption_escapes_title() {
        let caption = format_caption(&details("Cable <USB-C> & Charger"), "first-21");
        assert!(caption.contains("<b>Cable &lt;USB-C&gt; &amp; Charger</b>"));
        assert!(caption.contains("<b>Price:</b> ₹1,299"));
        assert!(caption.contains(
            "<a href=\"https://www.amazon.in/Some-Product/dp/B0TESTID99?tag=first-21\">Buy Now (ID: first-21)</a>"
        ));
    }

    #[tokio::test]
    async fn tags_alternate_by_send_order() {
        let mut publisher = Publisher::new(RecordingSink::default(), TagRotation::new(tags(), 0));
        let first = publisher.publish(&details("One")).await.unwrap();
        let second = publisher.publish(&details("Two")).await.unwrap();
        let third = publisher.publish(&details("Three")).await.unwrap();
        assert_eq!(
            vec![first, second, third],
            vec!["first-21", "second-21", "first-21"]
        );
        assert_eq!(publisher.rotation().index(), 1);
        assert_eq!(publisher.sink.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_send_keeps_tag() {
        let sink = RecordingSink {
            fail_on: Some(0),
            ..RecordingSink::default()
        };
        let mut publisher = Publisher::new(sink, TagRotation::new(tags(), 0));
        assert!(publisher.publish(&details("One")).await.is_err());
        assert_eq!(publisher.rotation().index(), 0);
        let tag = publisher.publish(&details("Two")).await.unwrap();
        assert_eq!(tag, "first-21");
        assert_eq!(publisher.rotation().index(), 1);
    }
}
