pub mod telegram;

use async_trait::async_trait;

pub use teloxide::types::{
    ChatId, File, FileId, Me, Message, MessageId, PhotoSize, Update, UpdateKind, WebhookInfo,
};

use crate::error::TransportError;

/// Ledger key of an update.
pub fn update_id(update: &Update) -> i64 {
    i64::from(update.id.0)
}

/// The chat message an update carries, if it is a new message.
pub fn into_message(update: Update) -> Option<Message> {
    match update.kind {
        UpdateKind::Message(message) => Some(message),
        _ => None,
    }
}

/// First name of the sender, empty for anonymous posts.
pub fn sender_name(message: &Message) -> &str {
    message
        .from
        .as_ref()
        .map(|user| user.first_name.as_str())
        .unwrap_or("")
}

/// Outbound text message with the delivery flags decorators produce.
#[derive(Debug, Clone, PartialEq)]
pub struct SendMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub disable_web_page_preview: bool,
    pub markdown: bool,
}

impl SendMessage {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            disable_web_page_preview: true,
            markdown: false,
        }
    }

    pub fn reply_to(mut self, message_id: Option<MessageId>) -> Self {
        self.reply_to = message_id;
        self
    }

    pub fn preview(mut self, enabled: bool) -> Self {
        self.disable_web_page_preview = !enabled;
        self
    }

    pub fn markdown(mut self, enabled: bool) -> Self {
        self.markdown = enabled;
        self
    }
}

/// Outbound side of the messaging platform.
///
/// Commands and the dispatcher only talk to Telegram through this trait so
/// tests can substitute a recording fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, request: SendMessage) -> Result<Message, TransportError>;

    /// `photo` is a file id or an http(s) URL.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &str,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<Message, TransportError>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        document: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, TransportError>;

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError>;

    async fn get_file(&self, file_id: &FileId) -> Result<File, TransportError>;

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TransportError>;

    async fn get_me(&self) -> Result<Me, TransportError>;

    async fn get_webhook_info(&self) -> Result<WebhookInfo, TransportError>;

    async fn delete_webhook(&self) -> Result<bool, TransportError>;

    async fn set_webhook(&self, url: &str) -> Result<bool, TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use teloxide::types::UpdateId;
    use teloxide::{ApiError, RequestError};

    use super::*;

    /// Message as Telegram would deliver it.
    pub fn message(value: Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    /// Text message from "Ana" in a group chat.
    pub fn group_message(chat_id: i64, message_id: i32, text: Option<&str>) -> Message {
        let mut value = json!({
            "message_id": message_id,
            "date": 1700000000,
            "chat": {"id": chat_id, "type": "group", "title": "ofensivaria"},
            "from": {"id": 9, "is_bot": false, "first_name": "Ana"},
        });
        if let Some(text) = text {
            value["text"] = json!(text);
        }
        message(value)
    }

    pub fn update(id: u32, message: Option<Message>) -> Update {
        match message {
            Some(message) => Update {
                id: UpdateId(id),
                kind: UpdateKind::Message(message),
            },
            None => Update {
                id: UpdateId(id),
                kind: UpdateKind::Error(json!({})),
            },
        }
    }

    /// Transport fake that records outbound calls and serves queued update batches.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<SendMessage>>,
        pub photos: Mutex<Vec<(i64, String, Option<String>)>>,
        pub offsets: Mutex<Vec<Option<i64>>>,
        pub batches: Mutex<Vec<Vec<Update>>>,
        pub fail_sends: bool,
    }

    impl RecordingTransport {
        pub fn failing() -> Self {
            Self {
                fail_sends: true,
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<SendMessage> {
            self.sent.lock().unwrap().clone()
        }

        fn echo(chat_id: ChatId) -> Message {
            message(json!({
                "message_id": 1,
                "date": 1700000000,
                "chat": {"id": chat_id.0, "type": "group", "title": "ofensivaria"},
                "photo": [{"file_id": "sent-file-id", "file_unique_id": "u1", "file_size": 3, "width": 1, "height": 1}],
            }))
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_message(&self, request: SendMessage) -> Result<Message, TransportError> {
            if self.fail_sends {
                return Err(TransportError::Request {
                    method: "sendMessage",
                    source: RequestError::Api(ApiError::ChatNotFound),
                });
            }
            let chat_id = request.chat_id;
            self.sent.lock().unwrap().push(request);
            Ok(Self::echo(chat_id))
        }

        async fn send_photo(
            &self,
            chat_id: ChatId,
            photo: &str,
            caption: Option<&str>,
            _reply_to: Option<MessageId>,
        ) -> Result<Message, TransportError> {
            self.photos.lock().unwrap().push((
                chat_id.0,
                photo.to_string(),
                caption.map(str::to_string),
            ));
            Ok(Self::echo(chat_id))
        }

        async fn send_document(
            &self,
            chat_id: ChatId,
            _document: &str,
            _reply_to: Option<MessageId>,
        ) -> Result<Message, TransportError> {
            Ok(Self::echo(chat_id))
        }

        async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
            self.offsets.lock().unwrap().push(offset);
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }

        async fn get_file(&self, file_id: &FileId) -> Result<File, TransportError> {
            Ok(serde_json::from_value(json!({
                "file_id": file_id.0,
                "file_unique_id": "u",
                "file_size": 3,
                "file_path": format!("photos/{}.jpg", file_id.0),
            }))
            .unwrap())
        }

        async fn download_file(&self, _file_path: &str) -> Result<Vec<u8>, TransportError> {
            Ok(vec![0xff, 0xd8, 0xff])
        }

        async fn get_me(&self) -> Result<Me, TransportError> {
            Ok(serde_json::from_value(json!({
                "id": 42,
                "is_bot": true,
                "first_name": "Ofensivaria",
                "username": "ofensivaria_bot",
                "can_join_groups": true,
                "can_read_all_group_messages": true,
                "supports_inline_queries": false,
                "can_connect_to_business": false,
                "has_main_web_app": false,
            }))
            .unwrap())
        }

        async fn get_webhook_info(&self) -> Result<WebhookInfo, TransportError> {
            Ok(serde_json::from_value(json!({
                "url": "https://bot.example/telegram",
                "has_custom_certificate": false,
                "pending_update_count": 0,
            }))
            .unwrap())
        }

        async fn delete_webhook(&self) -> Result<bool, TransportError> {
            Ok(true)
        }

        async fn set_webhook(&self, _url: &str) -> Result<bool, TransportError> {
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{group_message, message, update};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_without_message_has_no_message() {
        let update = update(10, None);
        assert_eq!(update_id(&update), 10);
        assert!(into_message(update).is_none());
    }

    #[test]
    fn test_webhook_payload_deserializes() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 31,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": -100, "type": "group", "title": "ofensivaria"},
                "text": "/ping"
            }
        }))
        .unwrap();

        assert_eq!(update_id(&update), 31);
        let message = into_message(update).unwrap();
        assert_eq!(message.text(), Some("/ping"));
        assert_eq!(message.chat.id, ChatId(-100));
        assert_eq!(sender_name(&message), "");
    }

    #[test]
    fn test_photo_message_has_no_text() {
        let photo = message(json!({
            "message_id": 5,
            "date": 1700000000,
            "chat": {"id": 8, "type": "private", "first_name": "Ana"},
            "from": {"id": 8, "is_bot": false, "first_name": "Ana"},
            "photo": [
                {"file_id": "small", "file_unique_id": "s", "file_size": 1, "width": 90, "height": 90},
                {"file_id": "large", "file_unique_id": "l", "file_size": 9, "width": 800, "height": 800}
            ]
        }));

        assert!(photo.text().is_none());
        assert!(photo.chat.is_private());
        assert_eq!(sender_name(&photo), "Ana");
        assert_eq!(photo.photo().unwrap()[1].file.id.0, "large");
    }

    #[test]
    fn test_send_message_flags() {
        let request = SendMessage::new(ChatId(7), "hi")
            .reply_to(Some(MessageId(3)))
            .preview(true)
            .markdown(true);
        assert_eq!(request.reply_to, Some(MessageId(3)));
        assert!(!request.disable_web_page_preview);
        assert!(request.markdown);

        let plain = SendMessage::new(ChatId(7), "hi");
        assert!(plain.disable_web_page_preview);
        assert!(!plain.markdown);
        assert_eq!(plain.reply_to, None);

        assert_eq!(group_message(-1, 4, None).id, MessageId(4));
    }
}
