use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use super::{Command, CommandDeps, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::{Message, Transport};
use crate::store::Store;

const UPLOAD_URL: &str = "https://api.imgur.com/3/image";
const CLIENT_KEY: &str = "bot:imgur:client";
const CACHE_KEY: &str = "bot:imgur";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<UploadedImage>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    #[serde(default)]
    link: Option<String>,
}

/// Rehosts photos sent to the bot in private chats on imgur.
pub struct Imgur {
    matcher: Matcher,
    store: Store,
    transport: Arc<dyn Transport>,
    http: reqwest::Client,
    upload_url: String,
}

pub fn imgur(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(Imgur::new(deps, UPLOAD_URL)?))
}

impl Imgur {
    fn new(deps: &CommandDeps, upload_url: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/imgurid [client_id]"], false)?,
            store: deps.store.clone(),
            transport: deps.transport.clone(),
            http: deps.http.clone(),
            upload_url: upload_url.to_string(),
        })
    }

    async fn set_client_id(&self, client_id: &str) -> Result<String> {
        if self.store.set_if_absent(CLIENT_KEY, client_id).await? {
            info!("Imgur client id configured");
            Ok("we are set for imgur".to_string())
        } else {
            Ok("i already have a client id. clean it by hand before resetting".to_string())
        }
    }

    async fn upload(&self, message: &Message) -> Result<String> {
        let Some(photo) = message.photo().and_then(|sizes| sizes.last()) else {
            return Ok(String::new());
        };
        let file_id = photo.file.id.0.as_str();

        if let Some(link) = self.store.hget(CACHE_KEY, file_id).await? {
            return Ok(link);
        }

        let Some(client_id) = self.store.get(CLIENT_KEY).await? else {
            return Ok("Nobody set my client id for imgur".to_string());
        };

        let file = self.transport.get_file(&photo.file.id).await?;
        anyhow::ensure!(
            !file.path.is_empty(),
            "Telegram returned no path for file {}",
            file_id
        );
        let bytes = self.transport.download_file(&file.path).await?;

        let form = Form::new().part("image", Part::bytes(bytes).file_name("image.jpg"));
        let response = self
            .http
            .post(&self.upload_url)
            .header("Authorization", format!("Client-ID {}", client_id))
            .multipart(form)
            .send()
            .await
            .context("Failed to reach imgur")?;

        let link = match response.json::<UploadResponse>().await {
            Ok(UploadResponse {
                success: true,
                data: Some(UploadedImage { link: Some(link) }),
            }) => link,
            Ok(body) => {
                warn!("Imgur rejected upload of {}: {:?}", file_id, body);
                return Ok("Could not upload :(".to_string());
            }
            Err(e) => {
                warn!("Unreadable imgur response for {}: {}", file_id, e);
                return Ok("Could not upload :(".to_string());
            }
        };

        self.store.hset(CACHE_KEY, file_id, &link).await?;
        Ok(link)
    }
}

#[async_trait]
impl Command for Imgur {
    fn name(&self) -> &'static str {
        "imgur"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Any photo in a private chat is an upload request.
    fn can_respond(
        &self,
        text: &str,
        message: &Message,
    ) -> Result<Option<MatchContext>, CommandError> {
        match message.photo() {
            Some(photo) => {
                Ok((message.chat.is_private() && !photo.is_empty()).then(MatchContext::default))
            }
            None => self.matcher.matches(text),
        }
    }

    async fn respond(
        &self,
        _text: &str,
        message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let answer = match matched.command() {
            Some(_) => {
                self.set_client_id(matched.args.require("client_id")?)
                    .await?
            }
            None => self.upload(message).await?,
        };
        Ok(answer.into())
    }
}
