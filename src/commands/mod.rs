//! Command descriptors and everything a descriptor needs: syntactic matching,
//! response decoration and the static registry.

pub mod matcher;
pub mod registry;
pub mod response;

mod chance;
mod gifs;
mod imgur;
mod quote;
mod simple;
mod square;
mod web;
mod yugioh;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::CommandError;
use crate::platform::{Message, Transport};
use crate::store::Store;

pub use matcher::{Args, MatchContext, Matcher};
pub use response::{Decorator, Envelope, Response};

/// Shared collaborators handed to every command constructor.
#[derive(Clone)]
pub struct CommandDeps {
    pub transport: Arc<dyn Transport>,
    pub store: Store,
    /// Pooled client for third-party lookups, separate from the Telegram client
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl CommandDeps {
    /// Build the scoped HTTP client commands use for outside lookups.
    pub fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(config.telegram.request_timeout())
            .user_agent(concat!("ofensivaria/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build command HTTP client")
    }

    /// GET `url` and decode a JSON body, failing on non-2xx statuses.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CommandError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// The bot's own mention, e.g. `@ofensivaria_bot`.
    pub fn mention(&self) -> String {
        format!("@{}", self.config.telegram.username)
    }
}

/// A registered command handler.
///
/// Only `respond` is required. The default `can_respond` runs the command's
/// [`Matcher`]; commands keyed on something other than text override it.
#[async_trait]
pub trait Command: Send + Sync {
    /// Registry name, used in logs.
    fn name(&self) -> &'static str;

    fn matcher(&self) -> &Matcher;

    /// Decorators applied, in order, to every response of this command.
    fn decorators(&self) -> &'static [Decorator] {
        &[]
    }

    fn can_respond(
        &self,
        text: &str,
        _message: &Message,
    ) -> Result<Option<MatchContext>, CommandError> {
        self.matcher().matches(text)
    }

    /// One-time async preparation, run before the command is registered.
    async fn prepare(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn respond(
        &self,
        text: &str,
        message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError>;
}
