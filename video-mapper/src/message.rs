use std::collections::HashMap;

use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const MESSAGE_TIMESTAMP_HEADER: &str = "Message-Timestamp";
pub const MESSAGE_ID_HEADER: &str = "Message-Id";
pub const MESSAGE_TYPE_HEADER: &str = "Message-Type";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ORIGIN_SYSTEM_HEADER: &str = "Origin-System-Id";

pub const VIDEO_SYSTEM_ORIGIN: &str = "http://cmdb.ft.com/systems/next-video-editor";
pub const PUBLISHED_MESSAGE_TYPE: &str = "cms-content-published";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const VIDEO_CONTENT_TYPE: &str = "application/vnd.ft-upp-video+json";

/// An inbound message: string headers plus the raw body, whether it came
/// from the queue or from an HTTP request.
///
/// Header names are case-insensitive. When the same name is given more than
/// once, in any casing, the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(headers: impl IntoIterator<Item = (String, String)>, body: Vec<u8>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Message { headers, body }
    }

    /// Header value by name. Empty values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(&name.to_ascii_lowercase());
        self
    }
}

/// A message ready to be written to the output topic, keyed by content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OutboundMessage {
    pub fn published(content_id: &str, transaction_id: &str, timestamp: &str, body: Vec<u8>) -> Self {
        let headers = vec![
            (REQUEST_ID_HEADER, transaction_id.to_owned()),
            (MESSAGE_TIMESTAMP_HEADER, timestamp.to_owned()),
            (MESSAGE_ID_HEADER, Uuid::new_v4().to_string()),
            (MESSAGE_TYPE_HEADER, PUBLISHED_MESSAGE_TYPE.to_owned()),
            (CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE.to_owned()),
            (ORIGIN_SYSTEM_HEADER, VIDEO_SYSTEM_ORIGIN.to_owned()),
        ];
        OutboundMessage {
            key: content_id.to_owned(),
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case_and_empty_values() {
        let message = Message::default()
            .with_header("x-request-id", "tid_abc")
            .with_header(MESSAGE_TIMESTAMP_HEADER, "");

        assert_eq!(message.header(REQUEST_ID_HEADER), Some("tid_abc"));
        assert_eq!(message.header(MESSAGE_TIMESTAMP_HEADER), None);
        assert_eq!(message.header(CONTENT_TYPE_HEADER), None);
    }

    #[test]
    fn repeated_headers_keep_the_last_value() {
        let message = Message::new(
            vec![
                ("X-Request-Id".to_string(), "tid_first".to_string()),
                ("x-request-id".to_string(), "tid_second".to_string()),
                ("X-REQUEST-ID".to_string(), "tid_last".to_string()),
            ],
            Vec::new(),
        );
        assert_eq!(message.header(REQUEST_ID_HEADER), Some("tid_last"));

        let message = message
            .with_header("x-Request-id", "tid_override")
            .without_header(CONTENT_TYPE_HEADER);
        assert_eq!(message.header("X-Request-Id"), Some("tid_override"));

        let message = message.without_header("X-REQUEST-ID");
        assert_eq!(message.header(REQUEST_ID_HEADER), None);
    }

    #[test]
    fn published_message_headers() {
        let out = OutboundMessage::published(
            "a40808ac-1417-4c48-9781-1dd2d8c8c6dc",
            "tid_abc",
            "2017-04-13T10:27:32.353Z",
            b"{}".to_vec(),
        );

        assert_eq!(out.key, "a40808ac-1417-4c48-9781-1dd2d8c8c6dc");
        assert_eq!(out.header(REQUEST_ID_HEADER), Some("tid_abc"));
        assert_eq!(
            out.header(MESSAGE_TIMESTAMP_HEADER),
            Some("2017-04-13T10:27:32.353Z")
        );
        assert_eq!(out.header(MESSAGE_TYPE_HEADER), Some("cms-content-published"));
        assert_eq!(out.header(CONTENT_TYPE_HEADER), Some("application/json"));
        assert_eq!(out.header(ORIGIN_SYSTEM_HEADER), Some(VIDEO_SYSTEM_ORIGIN));

        let message_id = out.header(MESSAGE_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(message_id).is_ok());

        let other = OutboundMessage::published("a", "tid_abc", "t", vec![]);
        assert_ne!(other.header(MESSAGE_ID_HEADER), Some(message_id));
    }
}
