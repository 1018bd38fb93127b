use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{Command, CommandDeps, Decorator, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::Message;
use crate::store::Store;

const NAMES_KEY: &str = "bot:gifs";

fn urls_key(name: &str) -> String {
    format!("{}:{}", NAMES_KEY, name)
}

/// Named gif collection. Saying a known `name.gif` posts one of its urls.
pub struct MessageToGif {
    matcher: Matcher,
    store: Store,
}

pub fn message_to_gif(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(MessageToGif {
        matcher: Matcher::slash(
            &["/teach [name] [url]", "/forget [name]", "/randomgif", "/gifs"],
            true,
        )?,
        store: deps.store.clone(),
    }))
}

impl MessageToGif {
    async fn gif(&self, name: &str) -> Result<Option<String>> {
        let urls = self.store.lrange(&urls_key(name)).await?;
        Ok(urls.choose(&mut rand::thread_rng()).cloned())
    }

    async fn teach(&self, name: &str, url: &str) -> Result<String> {
        if !name.ends_with(".gif") {
            return Ok("gif name must end with .gif".to_string());
        }
        if !url.contains("http") {
            return Ok("gif is not a link".to_string());
        }

        self.store.sadd(NAMES_KEY, &[name]).await?;
        self.store.lpush(&urls_key(name), url).await?;
        Ok(format!("now i know about {}", name))
    }

    async fn forget(&self, name: &str) -> Result<String> {
        self.store.delete(&urls_key(name)).await?;
        self.store.srem(NAMES_KEY, name).await?;
        Ok(format!("forgot {}", name))
    }

    async fn random(&self) -> Result<Option<String>> {
        match self.store.srandmember(NAMES_KEY).await? {
            Some(name) => self.gif(&name).await,
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<String> {
        Ok(self.store.smembers(NAMES_KEY).await?.join(", "))
    }
}

#[async_trait]
impl Command for MessageToGif {
    fn name(&self) -> &'static str {
        "message_to_gif"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        &[Decorator::Preview]
    }

    fn can_respond(
        &self,
        text: &str,
        _message: &Message,
    ) -> Result<Option<MatchContext>, CommandError> {
        if text.ends_with(".gif") && !text.contains(' ') {
            return Ok(Some(MatchContext::default()));
        }
        self.matcher.matches(text)
    }

    async fn respond(
        &self,
        text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let args = &matched.args;

        let response: Response = match matched.command() {
            None => self.gif(text.trim()).await?.into(),
            Some("teach") => self.teach(args.require("name")?, args.require("url")?).await?.into(),
            Some("forget") => self.forget(args.require("name")?).await?.into(),
            Some("randomgif") => self.random().await?.into(),
            Some("gifs") => self.list().await?.into(),
            Some(_) => Response::Nothing,
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::testing::{deps, message};
    use crate::platform::testing::RecordingTransport;

    async fn run(command: &dyn Command, text: &str) -> Result<Option<Response>, CommandError> {
        let message = message(text);
        let Some(matched) = command.can_respond(text, &message)? else {
            return Ok(None);
        };
        let response = command.respond(text, &message, &matched).await?;
        Ok(Some(response.decorate(command.decorators())))
    }

    fn answer(response: Option<Response>) -> String {
        response
            .and_then(Response::into_envelope)
            .map(|e| e.answer)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_teach_then_recall() {
        let deps = deps(Arc::new(RecordingTransport::default()));
        let gifs = message_to_gif(&deps).unwrap();

        let taught = run(gifs.as_ref(), "/teach party.gif http://i.imgur.com/p.gif")
            .await
            .unwrap();
        assert_eq!(answer(taught), "now i know about party.gif");

        let recalled = run(gifs.as_ref(), "party.gif").await.unwrap().unwrap();
        let envelope = recalled.into_envelope().unwrap();
        assert_eq!(envelope.answer, "http://i.imgur.com/p.gif");
        assert!(envelope.needs_preview);

        let listed = run(gifs.as_ref(), "/gifs").await.unwrap();
        assert_eq!(answer(listed), "party.gif");
    }

    #[tokio::test]
    async fn test_teach_rejects_bad_input() {
        let deps = deps(Arc::new(RecordingTransport::default()));
        let gifs = message_to_gif(&deps).unwrap();

        let bad_name = run(gifs.as_ref(), "/teach party http://x").await.unwrap();
        assert_eq!(answer(bad_name), "gif name must end with .gif");

        let bad_url = run(gifs.as_ref(), "/teach party.gif nope").await.unwrap();
        assert_eq!(answer(bad_url), "gif is not a link");

        let err = run(gifs.as_ref(), "/teach party.gif").await.unwrap_err();
        assert!(matches!(err, CommandError::Validation(msg) if msg.contains("/teach [name] [url]")));
    }

    #[tokio::test]
    async fn test_forget_removes_gif() {
        let deps = deps(Arc::new(RecordingTransport::default()));
        let gifs = message_to_gif(&deps).unwrap();

        run(gifs.as_ref(), "/teach a.gif http://a").await.unwrap();
        let forgot = run(gifs.as_ref(), "/forget a.gif").await.unwrap();
        assert_eq!(answer(forgot), "forgot a.gif");

        assert_eq!(run(gifs.as_ref(), "a.gif").await.unwrap(), Some(Response::Nothing));
        assert_eq!(run(gifs.as_ref(), "/randomgif").await.unwrap(), Some(Response::Nothing));
    }

    #[tokio::test]
    async fn test_ignores_sentences_mentioning_gifs() {
        let deps = deps(Arc::new(RecordingTransport::default()));
        let gifs = message_to_gif(&deps).unwrap();

        assert_eq!(run(gifs.as_ref(), "look at this.gif").await.unwrap(), None);
    }
}
