//! Telegram adapter (teloxide).
//!
//! Implements the `fw-core` [`Notifier`] and [`ChatSession`] ports over the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

use tokio::time::sleep;

use fw_core::{
    domain::{ChannelHandle, ChannelId},
    formatting::{render_html, NotificationPayload},
    ports::{ChatSession, Notifier, SendError},
};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    fn tg_chat(id: ChannelId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(id.0)
    }

    fn map_err(channel: Option<ChannelId>, e: RequestError) -> SendError {
        match (e, channel) {
            (RequestError::RetryAfter(d), _) => SendError::RateLimited(d),
            (RequestError::Api(ApiError::ChatNotFound), Some(id)) => SendError::ChannelNotFound(id),
            (RequestError::Api(api), _) => SendError::Rejected(api.to_string()),
            (other, _) => SendError::Transport(other.to_string()),
        }
    }

    async fn with_retry<T, Fut>(
        &self,
        channel: Option<ChannelId>,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T, SendError>
    where
        Fut: std::future::IntoFuture<Output = Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram rate limit hit, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(channel, other)),
                },
            }
        }
    }
}

/// Human-readable label for a resolved chat: its title, then `@username`, then the raw id.
fn display_name(title: Option<&str>, username: Option<&str>, id: ChannelId) -> String {
    match (title, username) {
        (Some(t), _) if !t.trim().is_empty() => t.to_string(),
        (_, Some(u)) if !u.trim().is_empty() => format!("@{u}"),
        _ => id.to_string(),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn resolve_channel(&self, id: ChannelId) -> Result<ChannelHandle, SendError> {
        let chat = self
            .with_retry(Some(id), || self.bot.get_chat(Self::tg_chat(id)))
            .await?;

        Ok(ChannelHandle {
            id,
            name: display_name(chat.title(), chat.username(), id),
        })
    }

    async fn send(
        &self,
        channel: &ChannelHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        let html = render_html(payload);
        self.with_retry(Some(channel.id), || {
            self.bot
                .send_message(Self::tg_chat(channel.id), html.clone())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatSession for TelegramNotifier {
    async fn connect(&self) -> Result<String, SendError> {
        let me = self.with_retry(None, || self.bot.get_me()).await?;
        Ok(match me.user.username.as_deref() {
            Some(u) => format!("@{u}"),
            None => me.user.first_name.clone(),
        })
    }
}
