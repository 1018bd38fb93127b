use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InputFile, LinkPreviewOptions, ParseMode, ReplyParameters};
use teloxide::RequestError;
use tracing::debug;

use super::{ChatId, File, FileId, Me, Message, MessageId, SendMessage, Transport, Update, WebhookInfo};
use crate::config::TelegramConfig;
use crate::error::TransportError;

fn request_failed(method: &'static str) -> impl Fn(RequestError) -> TransportError {
    move |source| TransportError::Request { method, source }
}

/// A photo or document given as a URL is fetched by Telegram, anything else is a file id.
fn input_file(source: &str) -> InputFile {
    match reqwest::Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => InputFile::url(url),
        _ => InputFile::file_id(FileId(source.to_string())),
    }
}

fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Telegram Bot API client backed by a `teloxide::Bot`.
///
/// Only the `Requester` methods are used; update offsets and dedup stay with
/// our own dispatcher.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build Telegram HTTP client")?;

        let api_url = reqwest::Url::parse(&config.api_url)
            .with_context(|| format!("Invalid Telegram API URL: {}", config.api_url))?;

        let bot = Bot::with_client(config.bot_token.clone(), client).set_api_url(api_url);

        Ok(Self { bot })
    }
}

#[async_trait]
impl Transport for TelegramClient {
    #[allow(deprecated)]
    async fn send_message(&self, request: SendMessage) -> Result<Message, TransportError> {
        debug!("Sending message to chat {}", request.chat_id.0);

        let mut call = self.bot.send_message(request.chat_id, request.text);
        if let Some(id) = request.reply_to {
            call = call.reply_parameters(ReplyParameters::new(id));
        }
        if request.disable_web_page_preview {
            call = call.link_preview_options(no_preview());
        }
        if request.markdown {
            call = call.parse_mode(ParseMode::Markdown);
        }

        call.await.map_err(request_failed("sendMessage"))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &str,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<Message, TransportError> {
        let mut call = self.bot.send_photo(chat_id, input_file(photo));
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            call = call.caption(caption);
        }
        if let Some(id) = reply_to {
            call = call.reply_parameters(ReplyParameters::new(id));
        }

        call.await.map_err(request_failed("sendPhoto"))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        document: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, TransportError> {
        let mut call = self.bot.send_document(chat_id, input_file(document));
        if let Some(id) = reply_to {
            call = call.reply_parameters(ReplyParameters::new(id));
        }

        call.await.map_err(request_failed("sendDocument"))
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let mut call = self.bot.get_updates();
        if let Some(offset) = offset {
            let offset =
                i32::try_from(offset).map_err(|_| TransportError::InvalidOffset(offset))?;
            call = call.offset(offset);
        }

        let updates = call.await.map_err(request_failed("getUpdates"))?;
        debug!("getUpdates({:?}) returned {} updates", offset, updates.len());

        Ok(updates)
    }

    async fn get_file(&self, file_id: &FileId) -> Result<File, TransportError> {
        self.bot
            .get_file(file_id.clone())
            .await
            .map_err(request_failed("getFile"))
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TransportError> {
        let mut buffer = Vec::new();
        self.bot
            .download_file(file_path, &mut buffer)
            .await
            .map_err(|source| TransportError::Download {
                path: file_path.to_string(),
                source,
            })?;

        Ok(buffer)
    }

    async fn get_me(&self) -> Result<Me, TransportError> {
        self.bot.get_me().await.map_err(request_failed("getMe"))
    }

    async fn get_webhook_info(&self) -> Result<WebhookInfo, TransportError> {
        self.bot
            .get_webhook_info()
            .await
            .map_err(request_failed("getWebhookInfo"))
    }

    async fn delete_webhook(&self) -> Result<bool, TransportError> {
        self.bot
            .delete_webhook()
            .await
            .map_err(request_failed("deleteWebhook"))?;

        Ok(true)
    }

    async fn set_webhook(&self, url: &str) -> Result<bool, TransportError> {
        let target = reqwest::Url::parse(url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;

        self.bot
            .set_webhook(target)
            .await
            .map_err(request_failed("setWebhook"))?;

        Ok(true)
    }
}
