use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{info, warn};

use super::{Command, CommandDeps, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::Message;

const MAX_CHARS: usize = 140;
const ATTEMPTS: usize = 20;

/// Word-level Markov chain built from one sentence per line.
#[derive(Debug, Default)]
pub struct Chain {
    starts: Vec<String>,
    next: HashMap<String, Vec<Option<String>>>,
}

impl Chain {
    pub fn from_corpus(corpus: &str) -> Self {
        let mut chain = Chain::default();

        for line in corpus.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            let Some(first) = words.first() else {
                continue;
            };
            chain.starts.push(first.to_string());

            for pair in words.windows(2) {
                chain
                    .next
                    .entry(pair[0].to_string())
                    .or_default()
                    .push(Some(pair[1].to_string()));
            }
            if let Some(last) = words.last() {
                chain.next.entry(last.to_string()).or_default().push(None);
            }
        }

        chain
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    fn walk(&self, start: &str, max_chars: usize) -> Option<String> {
        let mut rng = rand::thread_rng();
        let mut sentence = start.to_string();
        let mut current = start;

        while let Some(Some(word)) = self.next.get(current)?.choose(&mut rng) {
            sentence.push(' ');
            sentence.push_str(word);
            if sentence.chars().count() > max_chars {
                return None;
            }
            current = word.as_str();
        }

        (sentence.chars().count() <= max_chars).then_some(sentence)
    }

    /// A sentence from a random opening word, retried until it fits.
    pub fn short_sentence(&self, max_chars: usize) -> Option<String> {
        (0..ATTEMPTS).find_map(|_| {
            let start = self.starts.choose(&mut rand::thread_rng())?;
            self.walk(start, max_chars)
        })
    }

    /// A sentence opening with `start`; `None` if the word was never seen.
    pub fn sentence_with_start(&self, start: &str, max_chars: usize) -> Option<String> {
        let words: Vec<&str> = start.split_whitespace().collect();
        let last = words.last()?;
        if !self.next.contains_key(*last) {
            return None;
        }

        let prefix = words[..words.len() - 1].join(" ");
        (0..ATTEMPTS).find_map(|_| {
            let tail = self.walk(last, max_chars)?;
            let sentence = if prefix.is_empty() {
                tail
            } else {
                format!("{} {}", prefix, tail)
            };
            (sentence.chars().count() <= max_chars).then_some(sentence)
        })
    }
}

/// Random "quotes" generated from the chat's corpus.
pub struct Quote {
    matcher: Matcher,
    corpus_path: PathBuf,
    mention: String,
    cleanup: Regex,
    chain: Option<Chain>,
}

pub fn quote(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(Quote {
        matcher: Matcher::slash(&["/quote [start]"], false)?,
        corpus_path: deps.config.quote.corpus_path.clone(),
        mention: deps.mention(),
        cleanup: Regex::new(r"@\w+\s?")?,
        chain: None,
    }))
}

impl Quote {
    async fn load(&self) -> Result<Chain> {
        let corpus = tokio::fs::read_to_string(&self.corpus_path)
            .await
            .with_context(|| format!("Failed to read corpus {}", self.corpus_path.display()))?;
        Ok(Chain::from_corpus(&corpus))
    }

    fn misunderstood(chain: &Chain, start: &str) -> String {
        let thought = chain.short_sentence(MAX_CHARS).unwrap_or_default();
        format!(
            "I didn't understand {}. Here's a random thought: \"{}\"",
            start, thought
        )
    }
}

#[async_trait]
impl Command for Quote {
    fn name(&self) -> &'static str {
        "quote"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// A missing or unreadable corpus leaves the command without a model.
    async fn prepare(&mut self) -> Result<()> {
        match self.load().await {
            Ok(chain) if !chain.is_empty() => {
                info!("Loaded quote model from {}", self.corpus_path.display());
                self.chain = Some(chain);
            }
            Ok(_) => warn!("Quote corpus {} is empty", self.corpus_path.display()),
            Err(e) => warn!("Couldn't load the quote model: {:#}", e),
        }
        Ok(())
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let Some(chain) = &self.chain else {
            return Ok("I don't have a model, sorry :(".into());
        };

        let Some(start) = matched.args.get("start") else {
            return Ok(chain.short_sentence(MAX_CHARS).into());
        };

        let start = if start.starts_with(&self.mention) {
            self.cleanup.replace_all(start, "").into_owned()
        } else {
            start.to_string()
        };

        let phrase = if start.is_empty() {
            chain.short_sentence(MAX_CHARS)
        } else {
            chain.sentence_with_start(&start, MAX_CHARS)
        };

        Ok(phrase
            .unwrap_or_else(|| Self::misunderstood(chain, &start))
            .into())
    }
}
