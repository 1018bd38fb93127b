use std::collections::HashMap;

use regex::Regex;

use crate::error::CommandError;

/// Named slash-command arguments in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<(String, String)>);

impl Args {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like `get`, but a missing argument is a handler failure.
    pub fn require(&self, name: &str) -> Result<&str, CommandError> {
        self.get(name)
            .ok_or_else(|| CommandError::Failed(anyhow::anyhow!("missing argument [{}]", name)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Args {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Args(iter.into_iter().collect())
    }
}

/// Result of a successful match, scoped to one dispatch of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchContext {
    /// Lowercased slash alias that matched
    pub command: Option<String>,
    pub args: Args,
    /// Capture groups of a regex match, in order
    pub captures: Vec<String>,
}

impl MatchContext {
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }
}

/// How a command recognises text addressed to it.
#[derive(Debug, Clone)]
pub enum Matcher {
    Slash(SlashMatcher),
    Regex(Regex),
    /// Only custom `can_respond` overrides can accept
    Never,
}

impl Matcher {
    pub fn slash(forms: &[&str], exact_arity: bool) -> Result<Self, regex::Error> {
        SlashMatcher::new(forms, exact_arity).map(Matcher::Slash)
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Matcher::Regex)
    }

    /// Slash invocation forms, empty for non-slash matchers.
    pub fn usages(&self) -> Vec<&str> {
        match self {
            Matcher::Slash(slash) => slash.usages(),
            _ => Vec::new(),
        }
    }

    pub fn matches(&self, text: &str) -> Result<Option<MatchContext>, CommandError> {
        match self {
            Matcher::Slash(slash) => slash.matches(text),
            Matcher::Regex(re) => Ok(match_regex(re, text)),
            Matcher::Never => Ok(None),
        }
    }
}

fn match_regex(re: &Regex, text: &str) -> Option<MatchContext> {
    let caps = re.captures(text)?;

    let captures = if caps.len() == 1 {
        vec![caps[0].to_string()]
    } else {
        caps.iter()
            .skip(1)
            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect()
    };

    Some(MatchContext {
        captures,
        ..Default::default()
    })
}

#[derive(Debug, Clone)]
struct SlashForm {
    /// Full invocation, e.g. `/teach [name] [url]`
    usage: String,
    params: Vec<String>,
}

/// Matches `/alias args...` against a set of invocation forms.
#[derive(Debug, Clone)]
pub struct SlashMatcher {
    pattern: Regex,
    forms: HashMap<String, SlashForm>,
    exact_arity: bool,
}

impl SlashMatcher {
    pub fn new(forms: &[&str], exact_arity: bool) -> Result<Self, regex::Error> {
        let param = Regex::new(r"\[(\w+)\]")?;

        let forms: HashMap<String, SlashForm> = forms
            .iter()
            .map(|form| {
                let alias = form
                    .split(' ')
                    .next()
                    .unwrap_or_default()
                    .replace('/', "")
                    .to_lowercase();
                let params = param
                    .captures_iter(form)
                    .map(|c| c[1].to_string())
                    .collect();
                (
                    alias,
                    SlashForm {
                        usage: form.to_string(),
                        params,
                    },
                )
            })
            .collect();

        let mut aliases: Vec<&str> = forms.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        let alternatives = aliases
            .iter()
            .map(|alias| format!(r"\b{}\b", regex::escape(alias)))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"(?i)^/({})\s?(.*)$", alternatives))?;

        Ok(Self {
            pattern,
            forms,
            exact_arity,
        })
    }

    pub fn matches(&self, text: &str) -> Result<Option<MatchContext>, CommandError> {
        let Some(caps) = self.pattern.captures(text) else {
            return Ok(None);
        };

        let alias = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
        let rest = caps.get(2).map_or("", |m| m.as_str());

        let Some(form) = self.forms.get(&alias) else {
            return Ok(None);
        };

        let mut tokens: Vec<String> = rest.split_whitespace().map(str::to_string).collect();

        // A single declared parameter takes the whole trailing text.
        if form.params.len() == 1 && tokens.len() > 1 {
            tokens = vec![tokens.join(" ")];
        }

        if self.exact_arity && !form.params.is_empty() && form.params.len() != tokens.len() {
            return Err(CommandError::validation(format!(
                "Wrong number of arguments {}",
                form.usage
            )));
        }

        let args = form.params.iter().cloned().zip(tokens).collect();

        Ok(Some(MatchContext {
            command: Some(alias),
            args,
            captures: Vec::new(),
        }))
    }

    /// Declared invocation forms, sorted by alias.
    pub fn usages(&self) -> Vec<&str> {
        let mut usages: Vec<&str> = self.forms.values().map(|f| f.usage.as_str()).collect();
        usages.sort_unstable();
        usages
    }
}
