use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{Command, CommandDeps, Decorator, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::Message;

/// Slash command answering with one of a fixed set of texts.
pub struct Canned {
    name: &'static str,
    matcher: Matcher,
    answers: &'static [&'static str],
    decorators: &'static [Decorator],
}

impl Canned {
    fn build(
        name: &'static str,
        form: &str,
        answers: &'static [&'static str],
        decorators: &'static [Decorator],
    ) -> Result<Box<dyn Command>> {
        Ok(Box::new(Self {
            name,
            matcher: Matcher::slash(&[form], false)?,
            answers,
            decorators,
        }))
    }

    fn pick(&self) -> Option<&'static str> {
        self.answers.choose(&mut rand::thread_rng()).copied()
    }
}

#[async_trait]
impl Command for Canned {
    fn name(&self) -> &'static str {
        self.name
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        self.decorators
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        _matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        Ok(self.pick().map_or(Response::Nothing, Response::from))
    }
}

const DANCES: &[&str] = &[
    "http://i.imgur.com/EE8XOqr.gifv",
    "http://i.imgur.com/VeK7Otb.gifv",
    "http://i.imgur.com/ZtwGLMW.gifv",
];

pub fn ping(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build("ping", "/ping", &["pong"], &[])
}

/// Why the chat is called what it is called.
pub fn title(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build(
        "title",
        "/title",
        &["season 1: http://imgur.com/a/0OlQR\nseason 2: http://imgur.com/a/y6A2F"],
        &[],
    )
}

pub fn help(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build(
        "help",
        "/help",
        &["Deus ajuda quem cedo madruga"],
        &[Decorator::Reply],
    )
}

pub fn flip_table(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build("flip_table", "/flip", &["(╯°□°）╯︵ ┻━┻"], &[])
}

pub fn shrug(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build("shrug", "/shrug", &[r"¯\_(ツ)_/¯"], &[])
}

pub fn dance_gif(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Canned::build(
        "dance_gif",
        "/dance",
        DANCES,
        &[Decorator::Reply, Decorator::Preview],
    )
}
