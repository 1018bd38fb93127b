use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Command, CommandDeps, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::{Message, Transport};
use crate::store::Store;

const WIKI_QUERY_URL: &str = "http://yugioh.wikia.com/wiki/Special:Ask/-5B-5BMedium::TCG-5D-5D/mainlabel%3D/limit%3D500/format%3Djson/offset%3D";
const IMAGE_URL: &str = "http://yugiohprices.com/api/card_image";
const PAGE_SIZE: usize = 500;
const PAGES: usize = 12;
const DRAW_ATTEMPTS: usize = 5;

const CARDS_KEY: &str = "cards";
const CACHE_KEY: &str = "card_cache";

#[derive(Debug, Deserialize)]
struct WikiPage {
    #[serde(default)]
    results: HashMap<String, serde_json::Value>,
}

/// Random Yu-Gi-Oh! TCG cards, with image file ids cached after first send.
pub struct YugiohCard {
    matcher: Matcher,
    store: Store,
    transport: Arc<dyn Transport>,
    http: reqwest::Client,
    /// Never follows redirects: the card image url is the `Location` header
    no_redirect: reqwest::Client,
    wiki_url: String,
    image_url: String,
}

pub fn yugioh(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(YugiohCard::new(deps, WIKI_QUERY_URL, IMAGE_URL)?))
}

impl YugiohCard {
    fn new(deps: &CommandDeps, wiki_url: &str, image_url: &str) -> Result<Self> {
        let no_redirect = reqwest::Client::builder()
            .timeout(deps.config.telegram.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build card image HTTP client")?;

        Ok(Self {
            matcher: Matcher::slash(&["/downloadcards", "/randomcard"], false)?,
            store: deps.store.clone(),
            transport: deps.transport.clone(),
            http: deps.http.clone(),
            no_redirect,
            wiki_url: wiki_url.to_string(),
            image_url: image_url.to_string(),
        })
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<String>> {
        let url = format!("{}{}", self.wiki_url, offset);
        let page: WikiPage = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch card page at offset {}", offset))?
            .json()
            .await
            .with_context(|| format!("Unreadable card page at offset {}", offset))?;
        Ok(page.results.into_keys().collect())
    }

    /// Fill the card set once; later calls only report its size.
    async fn download(&self) -> Result<String> {
        let mut count = self.store.scard(CARDS_KEY).await?;

        if count == 0 {
            let pages = join_all((0..PAGES).map(|page| self.fetch_page(page * PAGE_SIZE))).await;
            let names = pages
                .into_iter()
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();

            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            self.store.sadd(CARDS_KEY, &names).await?;
            count = self.store.scard(CARDS_KEY).await?;
            info!("Downloaded {} card names", count);
        }

        Ok(format!("Downloaded {}", count))
    }

    /// Image url for a card, or `None` when the price site doesn't know it.
    async fn image(&self, card: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.image_url, card);
        let response = self
            .no_redirect
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to look up image for {}", card))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(location);
        }

        Ok(response.status().is_success().then_some(url))
    }

    async fn draw(&self, message: &Message) -> Result<Response> {
        for _ in 0..DRAW_ATTEMPTS {
            let Some(card) = self.store.srandmember(CARDS_KEY).await? else {
                return Ok("I don't know any cards yet, try /downloadcards".into());
            };

            let image = match self.store.hget(CACHE_KEY, &card).await? {
                Some(file_id) => Some(file_id),
                None => self.image(&card).await?,
            };
            let Some(image) = image else {
                debug!("No image for card {}, drawing again", card);
                continue;
            };

            let caption = format!(
                "{} - http://yugioh.wikia.com/wiki/{}",
                card,
                card.replace(' ', "_")
            );
            let sent = self
                .transport
                .send_photo(message.chat.id, &image, Some(&caption), None)
                .await?;

            if let Some(photo) = sent.photo().and_then(|p| p.first()) {
                self.store.hset(CACHE_KEY, &card, &photo.file.id.0).await?;
            }

            return Ok(Response::Nothing);
        }

        warn!("No card image found after {} draws", DRAW_ATTEMPTS);
        Ok("Could not find a card, try again".into())
    }
}

#[async_trait]
impl Command for YugiohCard {
    fn name(&self) -> &'static str {
        "yugioh"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn respond(
        &self,
        _text: &str,
        message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let response: Response = match matched.command() {
            Some("downloadcards") => self.download().await?.into(),
            Some("randomcard") => self.draw(message).await?,
            _ => Response::Nothing,
        };
        Ok(response)
    }
}
