//! Commands backed by third-party HTTP APIs.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Command, CommandDeps, Decorator, MatchContext, Matcher, Response};
use crate::error::CommandError;
use crate::platform::{Message, Transport};

const WAYBACK_URL: &str = "http://archive.org/wayback/available";
const GOOGLE_URL: &str = "https://www.google.com.br/search";
const RATES_URL: &str = "https://api.frankfurter.app/latest";
const EXCUSE_URL: &str = "http://pe-api.herokuapp.com/";
const SCRYFALL_URL: &str = "https://api.scryfall.com/cards/random";
const SGDQ_URL: &str = "https://horaro.org/-/api/v1/schedules/45114j6eoi219j7ab0/ticker";

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:39.0) Gecko/20100101 Firefox/39.0";

/// Brasília time, where the chat lives.
const LOCAL_OFFSET_SECS: i32 = -3 * 3600;

// ── archive_url ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WaybackAvailable {
    #[serde(default)]
    archived_snapshots: WaybackSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct WaybackSnapshots {
    closest: Option<WaybackSnapshot>,
}

#[derive(Debug, Deserialize)]
struct WaybackSnapshot {
    url: String,
}

/// Closest Wayback Machine snapshot of a url, or a link to archive it.
pub struct ArchiveUrl {
    matcher: Matcher,
    deps: CommandDeps,
    endpoint: String,
}

pub fn archive_url(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(ArchiveUrl::new(deps, WAYBACK_URL)?))
}

impl ArchiveUrl {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/archive [url]"], true)?,
            deps: deps.clone(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Command for ArchiveUrl {
    fn name(&self) -> &'static str {
        "archive_url"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let url = matched.args.require("url")?;

        let available: WaybackAvailable =
            self.deps.fetch_json(&self.endpoint, &[("url", url)]).await?;

        let answer = match available.archived_snapshots.closest {
            Some(snapshot) => snapshot.url,
            None => format!("Click here to archive - https://archive.is/?run=1&url={}", url),
        };
        Ok(answer.into())
    }
}

// ── google ────────────────────────────────────────────────────────────────────

/// "I'm feeling lucky": the url Google redirects the query to.
pub struct Google {
    matcher: Matcher,
    http: reqwest::Client,
    endpoint: String,
}

pub fn google(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(Google::new(deps, GOOGLE_URL)?))
}

impl Google {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(deps.config.telegram.request_timeout())
            .user_agent(BROWSER_AGENT)
            .build()
            .context("Failed to build google HTTP client")?;

        Ok(Self {
            matcher: Matcher::slash(&["/google [query]"], true)?,
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Command for Google {
    fn name(&self) -> &'static str {
        "google"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn decorators(&self) -> &'static [Decorator] {
        &[Decorator::Reply, Decorator::Preview]
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let query = matched.args.require("query")?;

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("btnI", "")])
            .send()
            .await?;

        debug!("Google answered {} for {:?}", response.status(), query);
        Ok(response.url().to_string().into())
    }
}

// ── convert_currency ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Rates {
    #[serde(default)]
    rates: std::collections::HashMap<String, f64>,
}

/// Converts an amount of some currency to reais.
pub struct ConvertCurrency {
    matcher: Matcher,
    deps: CommandDeps,
    endpoint: String,
}

pub fn convert_currency(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(ConvertCurrency::new(deps, RATES_URL)?))
}

impl ConvertCurrency {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/convert [value] [symbol]"], true)?,
            deps: deps.clone(),
            endpoint: endpoint.to_string(),
        })
    }

    async fn rate(&self, symbol: &str) -> Option<f64> {
        let rates: Rates = match self
            .deps
            .fetch_json(&self.endpoint, &[("from", symbol), ("to", "BRL")])
            .await
        {
            Ok(rates) => rates,
            Err(e) => {
                warn!("Rate lookup for {} failed: {}", symbol, e);
                return None;
            }
        };
        rates.rates.get("BRL").copied()
    }
}

#[async_trait]
impl Command for ConvertCurrency {
    fn name(&self) -> &'static str {
        "convert_currency"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        let symbol = matched.args.require("symbol")?.to_uppercase();
        let Ok(value) = matched.args.require("value")?.parse::<f64>() else {
            return Ok("value must be a number".into());
        };

        let answer = match self.rate(&symbol).await {
            Some(rate) => format!("R${:.2}", value * rate),
            None => format!("Could not get value for currency {}", symbol),
        };
        Ok(answer.into())
    }
}

// ── excuse ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Excuse {
    message: String,
}

pub struct ProgrammerExcuse {
    matcher: Matcher,
    deps: CommandDeps,
    endpoint: String,
}

pub fn excuse(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(ProgrammerExcuse::new(deps, EXCUSE_URL)?))
}

impl ProgrammerExcuse {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/excuse"], false)?,
            deps: deps.clone(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Command for ProgrammerExcuse {
    fn name(&self) -> &'static str {
        "excuse"
    }

    fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn respond(
        &self,
        _text: &str,
        _message: &Message,
        _matched: &MatchContext,
    ) -> Result<Response, CommandError> {
        match self.deps.fetch_json::<Excuse>(&self.endpoint, &[]).await {
            Ok(excuse) => Ok(excuse.message.into()),
            Err(e) => {
                warn!("Excuse lookup failed: {}", e);
                Ok("The internet tubes are clogged.".into())
            }
        }
    }
}

// ── mtg ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScryfallCard {
    name: String,
    scryfall_uri: String,
    #[serde(default)]
    image_uris: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    prices: ScryfallPrices,
}

#[derive(Debug, Default, Deserialize)]
struct ScryfallPrices {
    usd: Option<String>,
}

/// Random Magic card: the image goes out as a photo, the caption as text.
pub struct MtgCard {
    matcher: Matcher,
    deps: CommandDeps,
    transport: Arc<dyn Transport>,
    endpoint: String,
}

pub fn mtg(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(MtgCard::new(deps, SCRYFALL_URL)?))
}

impl MtgCard {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/mtg"], false)?,
            deps: deps.clone(),
            transport: deps.transport.clone(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Command for MtgCard {
    fn name(&self) -> &'static str {
        "mtg"
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
        let card: ScryfallCard = match self.deps.fetch_json(&self.endpoint, &[]).await {
            Ok(card) => card,
            Err(e) => {
                warn!("Scryfall lookup failed: {}", e);
                return Ok("Spellfire will be reprinted!".into());
            }
        };

        let image = card
            .image_uris
            .get("large")
            .or_else(|| card.image_uris.values().next());
        let Some(image) = image else {
            warn!("Scryfall card {} has no image", card.name);
            return Ok("Could not get a card. Try again?".into());
        };

        let price = card.prices.usd.as_deref().unwrap_or("0");
        let caption = format!("{}\n{}\nUSD {}", card.name, card.scryfall_uri, price);

        self.transport
            .send_photo(message.chat.id, image, None, None)
            .await?;
        Ok(caption.into())
    }
}

// ── sgdq ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    data: TickerData,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    ticker: Ticker,
    schedule: TickerSchedule,
}

#[derive(Debug, Deserialize)]
struct TickerSchedule {
    link: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    current: Option<TickerRun>,
    next: Option<TickerRun>,
}

#[derive(Debug, Deserialize)]
struct TickerRun {
    scheduled_t: i64,
    /// Columns: title, runners, estimate, ...
    data: Vec<serde_json::Value>,
}

impl TickerRun {
    fn column(&self, index: usize) -> &str {
        self.data
            .get(index)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    fn scheduled(&self) -> Option<DateTime<FixedOffset>> {
        let local = FixedOffset::east_opt(LOCAL_OFFSET_SECS)?;
        DateTime::from_timestamp(self.scheduled_t, 0).map(|utc| utc.with_timezone(&local))
    }
}

/// `h:mm:ss`, hours unbounded.
fn format_countdown(delta: chrono::Duration) -> String {
    let secs = delta.num_seconds();
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

fn render_ticker(data: &TickerData, now: DateTime<Utc>) -> String {
    let mut lines = Vec::new();

    match &data.ticker.current {
        Some(run) => {
            let at = run
                .scheduled()
                .map(|dt| dt.format("%H:%M").to_string())
                .unwrap_or_default();
            lines.push(format!("Now: {} - {} - {}", at, run.column(0), run.column(2)));
        }
        None => lines.push("Nothing right now".to_string()),
    }

    if let Some(run) = &data.ticker.next {
        if let Some(at) = run.scheduled() {
            let countdown = format_countdown(at.with_timezone(&Utc) - now);
            lines.push(format!("In {} - {}", countdown, run.column(0)));
        }
    }

    format!(
        "```\n{}\n```\nFull schedule here: {}",
        lines.join("\n"),
        data.schedule.link
    )
}

pub struct SgdqSchedule {
    matcher: Matcher,
    deps: CommandDeps,
    endpoint: String,
}

pub fn sgdq(deps: &CommandDeps) -> Result<Box<dyn Command>> {
    Ok(Box::new(SgdqSchedule::new(deps, SGDQ_URL)?))
}

impl SgdqSchedule {
    fn new(deps: &CommandDeps, endpoint: &str) -> Result<Self> {
        Ok(Self {
            matcher: Matcher::slash(&["/sgdq"], false)?,
            deps: deps.clone(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Command for SgdqSchedule {
    fn name(&self) -> &'static str {
        "sgdq"
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
        let ticker: TickerEnvelope = self.deps.fetch_json(&self.endpoint, &[]).await?;
        Ok(render_ticker(&ticker.data, Utc::now()).into())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{deps, message};
    use crate::platform::testing::RecordingTransport;
    use mockito::Matcher as Query;

    async fn ask(command: &dyn Command, text: &str) -> Result<Response, CommandError> {
        let message = message(text);
        let matched = command.can_respond(text, &message)?.unwrap();
        command
            .respond(text, &message, &matched)
            .await
            .map(|r| r.decorate(command.decorators()))
    }

    #[tokio::test]
    async fn test_archive_returns_closest_snapshot() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/wayback/available")
            .match_query(Query::UrlEncoded("url".into(), "example.com".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"archived_snapshots": {"closest": {"url": "http://web.archive.org/web/1/example.com", "available": true}}}"#)
            .create_async()
            .await;

        let deps = deps(Arc::new(RecordingTransport::default()));
        let archive =
            ArchiveUrl::new(&deps, &format!("{}/wayback/available", server.url())).unwrap();

        assert_eq!(
            ask(&archive, "/archive example.com").await.unwrap(),
            Response::Text("http://web.archive.org/web/1/example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_archive_without_snapshot_links_archive_is() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/wayback/available")
            .match_query(Query::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"archived_snapshots": {}}"#)
            .create_async()
            .await;

        let deps = deps(Arc::new(RecordingTransport::default()));
        let archive =
            ArchiveUrl::new(&deps, &format!("{}/wayback/available", server.url())).unwrap();

        assert_eq!(
            ask(&archive, "/archive example.com").await.unwrap(),
            Response::Text(
                "Click here to archive - https://archive.is/?run=1&url=example.com".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_convert_multiplies_by_rate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/latest")
            .match_query(Query::AllOf(vec![
                Query::UrlEncoded("from".into(), "USD".into()),
                Query::UrlEncoded("to".into(), "BRL".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"base": "USD", "rates": {"BRL": 5.25}}"#)
            .create_async()
            .await;

        let deps = deps(Arc::new(RecordingTransport::default()));
        let convert = ConvertCurrency::new(&deps, &format!("{}/latest", server.url())).unwrap();

        assert_eq!(
            ask(&convert, "/convert 10 usd").await.unwrap(),
            Response::Text("R$52.50".to_string())
        );
    }

    #[tokio::test]
    async fn test_convert_reports_unknown_currency() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/latest")
            .match_query(Query::Any)
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "not found"}"#)
            .create_async()
            .await;

        let deps = deps(Arc::new(RecordingTransport::default()));
        let convert = ConvertCurrency::new(&deps, &format!("{}/latest", server.url())).unwrap();

        assert_eq!(
            ask(&convert, "/convert 10 XYZ").await.unwrap(),
            Response::Text("Could not get value for currency XYZ".to_string())
        );
        assert_eq!(
            ask(&convert, "/convert ten USD").await.unwrap(),
            Response::Text("value must be a number".to_string())
        );
    }

    #[tokio::test]
    async fn test_convert_arity_is_enforced() {
        let deps = deps(Arc::new(RecordingTransport::default()));
        let convert = ConvertCurrency::new(&deps, RATES_URL).unwrap();

        let err = ask(&convert, "/convert 10").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wrong number of arguments /convert [value] [symbol]"
        );
    }

    #[tokio::test]
    async fn test_excuse_falls_back_when_api_is_down() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let deps = deps(Arc::new(RecordingTransport::default()));
        let excuse = ProgrammerExcuse::new(&deps, &format!("{}/", server.url())).unwrap();

        assert_eq!(
            ask(&excuse, "/excuse").await.unwrap(),
            Response::Text("The internet tubes are clogged.".to_string())
        );
    }

    #[tokio::test]
    async fn test_mtg_sends_photo_and_returns_caption() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cards/random")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name": "Llanowar Elves", "scryfall_uri": "https://scryfall.com/card/x",
                    "image_uris": {"small": "https://img/s.jpg", "large": "https://img/l.jpg"},
                    "prices": {"usd": "0.25"}}"#,
            )
            .create_async()
            .await;

        let transport = Arc::new(RecordingTransport::default());
        let deps = deps(transport.clone());
        let mtg = MtgCard::new(&deps, &format!("{}/cards/random", server.url())).unwrap();

        assert_eq!(
            ask(&mtg, "/mtg").await.unwrap(),
            Response::Text(
                "Llanowar Elves\nhttps://scryfall.com/card/x\nUSD 0.25".to_string()
            )
        );
        let photos = transport.photos.lock().unwrap().clone();
        assert_eq!(photos, vec![(-100, "https://img/l.jpg".to_string(), None)]);
    }

    #[test]
    fn test_ticker_renders_local_time_and_countdown() {
        let data: TickerData = serde_json::from_str(
            r#"{"schedule": {"link": "https://horaro.org/sgdq"},
                "ticker": {
                  "current": {"scheduled_t": 1700000000, "data": ["Super Metroid", "runner", "0:45:00", null, null]},
                  "next": {"scheduled_t": 1700003600, "data": ["Zelda", "other", "1:30:00", null, null]}
                }}"#,
        )
        .unwrap();
        let now = DateTime::from_timestamp(1700000000, 0).unwrap();

        assert_eq!(
            render_ticker(&data, now),
            "```\nNow: 19:13 - Super Metroid - 0:45:00\nIn 1:00:00 - Zelda\n```\nFull schedule here: https://horaro.org/sgdq"
        );
    }

    #[test]
    fn test_ticker_without_current_run() {
        let data: TickerData = serde_json::from_str(
            r#"{"schedule": {"link": "l"}, "ticker": {"current": null, "next": null}}"#,
        )
        .unwrap();

        assert_eq!(
            render_ticker(&data, Utc::now()),
            "```\nNothing right now\n```\nFull schedule here: l"
        );
    }
}
