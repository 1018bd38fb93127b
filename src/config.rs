use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_polling_config")]
    pub polling: PollingConfig,
    #[serde(default = "default_storage_config")]
    pub storage: StorageConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default = "default_quote_config")]
    pub quote: QuoteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Bot username without the leading `@`, used by mention-triggered commands
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
    /// Keep only this many processed update ids; unset keeps all of them.
    #[serde(default)]
    pub retain_processed: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Public URL Telegram should call, without the token query parameter
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Skips the `?token=` check on inbound requests
    #[serde(default)]
    pub debug: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            public_url: String::new(),
            listen: default_listen(),
            debug: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuoteConfig {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
}

fn default_username() -> String {
    "ofensivaria_bot".to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    4
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ofensivaria.db")
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("markov/corpus.txt")
}

fn default_polling_config() -> PollingConfig {
    PollingConfig {
        interval_secs: default_poll_interval(),
    }
}

fn default_storage_config() -> StorageConfig {
    StorageConfig {
        database_path: default_db_path(),
        retain_processed: None,
    }
}

fn default_quote_config() -> QuoteConfig {
    QuoteConfig {
        corpus_path: default_corpus_path(),
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }

        Ok(config)
    }

    /// URL registered with `setWebhook`; carries the token so inbound calls can be checked.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}?token={}",
            self.webhook.public_url, self.telegram.bot_token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("[telegram]\nbot_token = \"123:abc\"\n").unwrap();
        assert_eq!(config.telegram.username, "ofensivaria_bot");
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.telegram.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.polling.interval(), Duration::from_secs(4));
        assert_eq!(config.storage.database_path, PathBuf::from("ofensivaria.db"));
        assert!(config.storage.retain_processed.is_none());
        assert_eq!(config.webhook.listen, "0.0.0.0:8000");
        assert!(!config.webhook.debug);
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(Config::parse("[telegram]\nbot_token = \"  \"\n").is_err());
    }

    #[test]
    fn test_missing_telegram_section_rejected() {
        assert!(Config::parse("[polling]\ninterval_secs = 1\n").is_err());
    }

    #[test]
    fn test_webhook_url_carries_token() {
        let config = Config::parse(
            "[telegram]\nbot_token = \"t0k\"\n[webhook]\npublic_url = \"https://bot.example/telegram\"\n",
        )
        .unwrap();
        assert_eq!(config.webhook_url(), "https://bot.example/telegram?token=t0k");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[telegram]\nbot_token = \"abc\"\nusername = \"other_bot\"\n\n[storage]\nretain_processed = 500\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.telegram.username, "other_bot");
        assert_eq!(config.storage.retain_processed, Some(500));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load(Path::new("/definitely/not/here.toml")).is_err());
    }
}
