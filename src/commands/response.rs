/// What a command hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Send nothing
    Nothing,
    Text(String),
    Bytes(Vec<u8>),
    Envelope(Envelope),
}

/// Canonical response shape sent to the chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub answer: String,
    pub needs_reply: bool,
    pub needs_preview: bool,
    pub markdown: bool,
}

impl Envelope {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Default::default()
        }
    }
}

/// Response transforms. Each one only ever sets its own flag, so any order
/// of application yields the same envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decorator {
    /// Thread the answer as a reply to the triggering message
    Reply,
    /// Let Telegram render link previews
    Preview,
    /// Parse the answer as Markdown
    Markdown,
}

impl Decorator {
    pub fn apply(self, response: Response) -> Response {
        if !response.is_truthy() {
            return response;
        }

        let mut envelope = match response {
            Response::Envelope(envelope) => envelope,
            Response::Text(text) => Envelope::new(text),
            Response::Bytes(bytes) => Envelope::new(String::from_utf8_lossy(&bytes)),
            Response::Nothing => return Response::Nothing,
        };

        match self {
            Decorator::Reply => envelope.needs_reply = true,
            Decorator::Preview => envelope.needs_preview = true,
            Decorator::Markdown => envelope.markdown = true,
        }

        Response::Envelope(envelope)
    }
}

pub fn reply(response: Response) -> Response {
    Decorator::Reply.apply(response)
}

pub fn preview(response: Response) -> Response {
    Decorator::Preview.apply(response)
}

pub fn markdown(response: Response) -> Response {
    Decorator::Markdown.apply(response)
}

impl Response {
    /// Empty text or bytes count as "no answer", like `Nothing`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Response::Nothing => false,
            Response::Text(text) => !text.is_empty(),
            Response::Bytes(bytes) => !bytes.is_empty(),
            Response::Envelope(_) => true,
        }
    }

    pub fn decorate(self, decorators: &[Decorator]) -> Response {
        decorators
            .iter()
            .fold(self, |response, decorator| decorator.apply(response))
    }

    /// Normalize into an envelope with default flags; `None` for `Nothing`.
    pub fn into_envelope(self) -> Option<Envelope> {
        match self {
            Response::Nothing => None,
            Response::Text(text) => Some(Envelope::new(text)),
            Response::Bytes(bytes) => Some(Envelope::new(String::from_utf8_lossy(&bytes))),
            Response::Envelope(envelope) => Some(envelope),
        }
    }
}

impl From<String> for Response {
    fn from(text: String) -> Self {
        Response::Text(text)
    }
}

impl From<&str> for Response {
    fn from(text: &str) -> Self {
        Response::Text(text.to_string())
    }
}

impl From<Envelope> for Response {
    fn from(envelope: Envelope) -> Self {
        Response::Envelope(envelope)
    }
}

impl From<Option<String>> for Response {
    fn from(text: Option<String>) -> Self {
        text.map_or(Response::Nothing, Response::Text)
    }
}
