use crate::config::ScanSettings;
use crate::links::{canonicalize_amazon_url, find_links, is_amazon_candidate};
use crate::resolver::LinkResolver;
use crate::store::RelayMemory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("session is not authorized; log in once interactively to create it")]
    Unauthorized,
    #[error("session file error: {0}")]
    Session(String),
    #[error("telegram request failed: {0}")]
    Telegram(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("listing dialogs failed: {0}")]
    ListDialogs(#[source] SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Private,
    Group,
    Channel,
}

impl ConversationKind {
    pub fn is_scanned(self) -> bool {
        matches!(self, ConversationKind::Group | ConversationKind::Channel)
    }
}

#[derive(Debug, Clone)]
pub struct Conversation<H> {
    pub title: String,
    pub kind: ConversationKind,
    pub handle: H,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub date: DateTime<Utc>,
    pub text: String,
}

/// Read-only view of the conversations visible to the scanning account.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    type Handle: Send + Sync;

    async fn conversations(&self) -> Result<Vec<Conversation<Self::Handle>>, SourceError>;

    /// Message history of `conversation`, newest first, at most `limit` items.
    fn history<'a>(
        &'a self,
        conversation: &'a Conversation<Self::Handle>,
        limit: usize,
    ) -> BoxStream<'a, Result<ChatMessage, SourceError>>;
}

/// Walks recent group and channel messages and collects canonical product
/// links that have not been posted yet.
#[derive(Debug, Clone, Copy)]
pub struct DialogScanner {
    settings: ScanSettings,
}

impl DialogScanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings }
    }

    pub async fn scan<S, R>(
        &self,
        source: &S,
        resolver: &R,
        posted: &RelayMemory,
    ) -> Result<Vec<String>, ScanError>
    where
        S: ConversationSource,
        R: LinkResolver,
    {
        self.scan_at(source, resolver, posted, Utc::now()).await
    }

    /// Same as [`scan`](Self::scan) with an explicit clock. Links come back
    /// in discovery order without duplicates.
    pub async fn scan_at<S, R>(
        &self,
        source: &S,
        resolver: &R,
        posted: &RelayMemory,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ScanError>
    where
        S: ConversationSource,
        R: LinkResolver,
    {
        let cutoff = now
            .checked_sub_signed(self.settings.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let conversations = source
            .conversations()
            .await
            .map_err(ScanError::ListDialogs)?;

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for conversation in conversations.iter().filter(|c| c.kind.is_scanned()) {
            let before = found.len();
            let outcome = self
                .scan_conversation(
                    source,
                    resolver,
                    posted,
                    conversation,
                    cutoff,
                    &mut seen,
                    &mut found,
                )
                .await;
            match outcome {
                Ok(messages) => debug!(
                    target = "relay.scanner",
                    conversation = %conversation.title,
                    messages,
                    new_links = found.len() - before,
                    "conversation scanned"
                ),
                Err(err) => warn!(
                    target = "relay.scanner",
                    conversation = %conversation.title,
                    error = %err,
                    "conversation scan aborted"
                ),
            }
        }

        info!(
            target = "relay.scanner",
            conversations = conversations.len(),
            candidates = found.len(),
            "scan finished"
        );
        Ok(found)
    }

    #[allow(clippy::too_many_arguments)]
    async fn scan_conversation<S, R>(
        &self,
        source: &S,
        resolver: &R,
        posted: &RelayMemory,
        conversation: &Conversation<S::Handle>,
        cutoff: DateTime<Utc>,
        seen: &mut HashSet<String>,
        found: &mut Vec<String>,
    ) -> Result<usize, SourceError>
    where
        S: ConversationSource,
        R: LinkResolver,
    {
        let limit = self.settings.messages_per_dialog;
        let mut history = source.history(conversation, limit).take(limit);
        let mut visited = 0;

        while let Some(message) = history.try_next().await? {
            // History is newest first, so everything after this is older too.
            if message.date < cutoff {
                break;
            }
            visited += 1;
            if message.text.is_empty() {
                continue;
            }

            for link in find_links(&message.text) {
                if !is_amazon_candidate(link) {
                    continue;
                }
                let resolved = match resolver.resolve(link).await {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        debug!(
                            target = "relay.scanner",
                            url = link,
                            error = %err,
                            "resolve failed"
                        );
                        continue;
                    }
                };
                let Some(canonical) = canonicalize_amazon_url(&resolved) else {
                    continue;
                };
                if posted.contains(&canonical) || !seen.insert(canonical.clone()) {
                    continue;
                }
                found.push(canonical);
            }
        }

        Ok(visited)
    }
}
