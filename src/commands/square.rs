use anyhow::Result;
use async_trait::async_trait;

use super::{Command, CommandDeps, Decorator, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::Message;

pub struct SquareMeme {
    matcher: Matcher,
}

pub fn square_meme(_deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(SquareMeme {
        matcher: Matcher::slash(&["/square [text]"], true)?,
    }))
}

/// Text across the top, reversed along the bottom, and down both sides.
fn meme(value: &[char]) -> String {
    let rev: Vec<char> = value.iter().rev().copied().collect();
    let inner = value.len().saturating_sub(2);

    let mut rows = vec![join(value.iter().copied())];
    for i in 1..value.len().saturating_sub(1) {
        let row = std::iter::once(value[i])
            .chain(std::iter::repeat(' ').take(inner))
            .chain(std::iter::once(rev[i]));
        rows.push(join(row));
    }
    rows.push(join(rev.iter().copied()));

    rows.join("\n")
}

fn join(chars: impl Iterator<Item = char>) -> String {
    chars.map(String::from).collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Command for SquareMeme {
    fn name(&self) -> &'static str {
        "square_meme"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        &[Decorator::Markdown]
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let chars: Vec<char> = matched
            .args
            .require("text")?
            .chars()
            .filter(|c| *c != ' ')
            .collect();

        if chars.len() < 2 {
            return Ok(Response::Nothing);
        }

        Ok(format!("```\n{}\n```", meme(&chars)).into())
    }
}
