use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::{Command, CommandDeps, Decorator, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::{sender_name, Message};
use crate::store::Store;

const EIGHT_BALL_ANSWERS: &[&str] = &[
    "Definitivamente",
    "Sem dúvidas",
    "Você pode contar com isso",
    "Sinais apontam que sim",
    "Como eu vejo, sim",
    "Pergunta nebulosa, tente novamente",
    "Pergunte novamente mais tarde",
    "Melhor não te falar agora",
    "Não é possível prever agora",
    "Concentre-se e pergunte novamente",
    "Não conte com isso",
    "Minha resposta é não",
    "Minhas fontes dizem não",
    "A perspectiva não é boa",
    "Duvido muito",
];

const SCORES_KEY: &str = "russian";

/// `@bot this ou that?` picks one side, or just says "sim".
pub struct EitherOr {
    matcher: Matcher,
    mention: String,
}

pub fn either_or(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(EitherOr {
        matcher: Matcher::regex(r"(.+?)\sou\s(.+?)\?+$")?,
        mention: deps.mention(),
    }))
}

fn choose_side(choices: &[String]) -> Option<String> {
    let mut rng = rand::thread_rng();
    if rng.gen_range(1..=100) < 10 {
        return Some("sim".to_string());
    }
    choices.choose(&mut rng).map(|c| c.trim().to_string())
}

#[async_trait]
impl Command for EitherOr {
    fn name(&self) -> &'static str {
        "either_or"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        &[Decorator::Reply]
    }

    async fn respond(
        &self,
        text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        if !text.starts_with(&self.mention) {
            return Ok(Response::Nothing);
        }

        let answer = choose_side(&matched.captures)
            .map(|answer| answer.replace(&self.mention, ""));
        Ok(answer.into())
    }
}

/// Magic eight ball for questions addressed to the bot.
pub struct EightBall {
    matcher: Matcher,
    mention: String,
}

pub fn eight_ball(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(EightBall {
        matcher: Matcher::regex(r"@[A-Za-z0-9_-]+\s(.+?)\?+$")?,
        mention: deps.mention(),
    }))
}

#[async_trait]
impl Command for EightBall {
    fn name(&self) -> &'static str {
        "eight_ball"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        &[Decorator::Reply]
    }

    async fn respond(
        &self,
        text: &str,
        _message: &Message,
        _matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        if !text.starts_with(&self.mention) {
            return Ok(Response::Nothing);
        }

        let answer = EIGHT_BALL_ANSWERS.choose(&mut rand::thread_rng()).copied();
        Ok(answer.map_or(Response::Nothing, Response::from))
    }
}

pub struct RussianRoulette {
    matcher: Matcher,
    store: Store,
}

pub fn russian_roulette(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(RussianRoulette {
        matcher: Matcher::slash(&["/roulette"], false)?,
        store: deps.store.clone(),
    }))
}

fn pull_trigger() -> bool {
    rand::thread_rng().gen_range(1..=6) == 3
}

#[async_trait]
impl Command for RussianRoulette {
    fn name(&self) -> &'static str {
        "russian_roulette"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn respond(
        &self,
        _text: &str,
        message: &Message,
        _matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        if !pull_trigger() {
            return Ok("*click*".into());
        }

        self.store
            .hincrby(SCORES_KEY, sender_name(message), 1)
            .await?;
        Ok("BANG! ~reloading".into())
    }
}

pub struct RussianScoreboard {
    matcher: Matcher,
    store: Store,
    cleanup: Regex,
}

pub fn russian_scoreboard(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(RussianScoreboard {
        matcher: Matcher::slash(&["/scoreboard"], false)?,
        store: deps.store.clone(),
        cleanup: Regex::new(r"`|\*|\|")?,
    }))
}

impl RussianScoreboard {
    fn render(&self, scores: Vec<(String, String)>) -> String {
        let mut scores: Vec<(String, i64)> = scores
            .into_iter()
            .map(|(name, count)| (name, count.parse().unwrap_or(0)))
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1));

        let lines = scores
            .iter()
            .enumerate()
            .map(|(i, (name, count))| {
                let word = if *count <= 1 { "time" } else { "times" };
                let name = self.cleanup.replace_all(name, "");
                format!("{}.\t{} - {} {}", i + 1, name, count, word)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("```\n{}\n```", lines)
    }
}

#[async_trait]
impl Command for RussianScoreboard {
    fn name(&self) -> &'static str {
        "russian_scoreboard"
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
        _matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let scores = self.store.hgetall(SCORES_KEY).await?;

        if scores.is_empty() {
            return Ok("No one killed themselves yet :)".into());
        }

        Ok(self.render(scores).into())
    }
}
