use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, Response};
use crate::error::{CommandError, TransportError};
use crate::platform::{into_message, update_id, Message, SendMessage, Transport, Update};
use crate::store::ProcessedIds;

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Already processed; nothing ran
    Duplicate,
    /// Marked processed but carried no message
    NoMessage,
    Dispatched {
        /// Commands whose matcher accepted the text (including arity failures)
        matched: usize,
        /// Messages sent to the chat
        sent: usize,
    },
}

/// Routes each update through every registered command, at most once per update id.
pub struct Dispatcher {
    commands: Vec<Arc<dyn Command>>,
    transport: Arc<dyn Transport>,
    processed: Mutex<ProcessedIds>,
}

/// Text as commands see it: no-break spaces become plain spaces.
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
}

impl Dispatcher {
    pub fn new(
        commands: Vec<Arc<dyn Command>>,
        transport: Arc<dyn Transport>,
        processed: ProcessedIds,
    ) -> Self {
        Self {
            commands,
            transport,
            processed: Mutex::new(processed),
        }
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    /// Offset for the next poll: one past the highest processed id.
    pub async fn next_offset(&self) -> Option<i64> {
        self.processed.lock().await.next_offset()
    }

    /// Process one inbound update.
    ///
    /// The id is recorded before any command runs, so a failing command never
    /// causes the update to be handled again. Errors only come from recording
    /// the id; command and send failures are logged and skipped.
    pub async fn process_update(&self, update: Update) -> Result<DispatchOutcome> {
        let update_id = update_id(&update);

        {
            let mut processed = self.processed.lock().await;
            if processed.contains(update_id) {
                debug!("Skipping already processed update {}", update_id);
                return Ok(DispatchOutcome::Duplicate);
            }
            processed.insert(update_id).await?;
        }

        let Some(message) = into_message(update) else {
            debug!("Update {} carries no message", update_id);
            return Ok(DispatchOutcome::NoMessage);
        };

        let text = normalize_text(message.text().unwrap_or(""));

        let mut matched = 0;
        let mut sent = 0;

        for command in &self.commands {
            let response = match command.can_respond(&text, &message) {
                Ok(Some(context)) => {
                    matched += 1;
                    debug!("Command {} matched update {}", command.name(), update_id);
                    command
                        .respond(&text, &message, &context)
                        .await
                        .map(|response| response.decorate(command.decorators()))
                }
                Ok(None) => continue,
                Err(e) => {
                    matched += 1;
                    Err(e)
                }
            };

            let response = match response {
                Ok(response) => response,
                Err(CommandError::Validation(reason)) => {
                    info!(
                        "Command {} rejected update {}: {}",
                        command.name(),
                        update_id,
                        reason
                    );
                    Response::Text(reason)
                }
                Err(CommandError::Failed(e)) => {
                    error!(
                        "Command {} failed on update {}: {:#}",
                        command.name(),
                        update_id,
                        e
                    );
                    continue;
                }
            };

            match self.send_response(response, &message).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    "Failed to send {} response for update {}: {}",
                    command.name(),
                    update_id,
                    e
                ),
            }
        }

        Ok(DispatchOutcome::Dispatched { matched, sent })
    }

    /// Normalize a response and send it. Returns whether anything was sent.
    async fn send_response(
        &self,
        response: Response,
        message: &Message,
    ) -> Result<bool, TransportError> {
        let Some(envelope) = response.into_envelope() else {
            return Ok(false);
        };

        if envelope.answer.is_empty() {
            return Ok(false);
        }

        let reply_to = envelope.needs_reply.then_some(message.id);

        let request = SendMessage::new(message.chat.id, envelope.answer)
            .reply_to(reply_to)
            .preview(envelope.needs_preview)
            .markdown(envelope.markdown);

        self.transport.send_message(request).await?;
        Ok(true)
    }
}
