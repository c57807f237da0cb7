use crate::config::TelegramConfig;
use crate::scanner::{
    ChatMessage, Conversation, ConversationKind, ConversationSource, SourceError,
};
use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use grammers_client::{Client, Config, InitParams, types::Chat};
use grammers_session::{PackedChat, Session};
use std::path::PathBuf;
use tracing::{debug, info};

/// User-account session used to read dialogs and their history.
pub struct UserSession {
    client: Client,
    session_file: PathBuf,
}

impl UserSession {
    /// Connects using an existing session file. The session must already be
    /// logged in.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, SourceError> {
        let session = Session::load_file_or_create(&config.session_file)
            .map_err(|err| SourceError::Session(err.to_string()))?;
        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|err| SourceError::Telegram(err.to_string()))?;

        let authorized = client
            .is_authorized()
            .await
            .map_err(|err| SourceError::Telegram(err.to_string()))?;
        if !authorized {
            return Err(SourceError::Unauthorized);
        }

        info!(
            target = "relay.telegram",
            session = %config.session_file.display(),
            "user session connected"
        );
        Ok(Self {
            client,
            session_file: config.session_file.clone(),
        })
    }

    /// Persists refreshed auth keys and update state back to the session file.
    pub fn close(self) -> Result<(), SourceError> {
        self.client
            .session()
            .save_to_file(&self.session_file)
            .map_err(|err| SourceError::Session(err.to_string()))
    }
}

fn conversation_kind(chat: &Chat) -> ConversationKind {
    match chat {
        Chat::User(_) => ConversationKind::Private,
        Chat::Group(_) => ConversationKind::Group,
        Chat::Channel(_) => ConversationKind::Channel,
    }
}

#[async_trait]
impl ConversationSource for UserSession {
    type Handle = PackedChat;

    async fn conversations(&self) -> Result<Vec<Conversation<PackedChat>>, SourceError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut out = Vec::new();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|err| SourceError::Telegram(err.to_string()))?
        {
            let chat = dialog.chat();
            out.push(Conversation {
                title: chat.name().to_string(),
                kind: conversation_kind(chat),
                handle: chat.pack(),
            });
        }
        debug!(target = "relay.telegram", dialogs = out.len(), "dialogs listed");
        Ok(out)
    }

    fn history<'a>(
        &'a self,
        conversation: &'a Conversation<PackedChat>,
        limit: usize,
    ) -> BoxStream<'a, Result<ChatMessage, SourceError>> {
        let messages = self.client.iter_messages(conversation.handle).limit(limit);
        stream::try_unfold(messages, |mut messages| async move {
            match messages.next().await {
                Ok(Some(message)) => {
                    let item = ChatMessage {
                        date: message.date(),
                        text: message.text().to_string(),
                    };
                    Ok(Some((item, messages)))
                }
                Ok(None) => Ok(None),
                Err(err) => Err(SourceError::Telegram(err.to_string())),
            }
        })
        .boxed()
    }
}
