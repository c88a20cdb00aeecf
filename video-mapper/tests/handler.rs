use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use video_mapper::error::ProduceError;
use video_mapper::handler::{EventsHandler, Outcome};
use video_mapper::mapper::VideoMapper;
use video_mapper::message::{
    Message, OutboundMessage, CONTENT_TYPE_HEADER, MESSAGE_ID_HEADER, MESSAGE_TIMESTAMP_HEADER,
    MESSAGE_TYPE_HEADER, ORIGIN_SYSTEM_HEADER, REQUEST_ID_HEADER, VIDEO_SYSTEM_ORIGIN,
};
use video_mapper::model::PublicationEvent;
use video_mapper::sink::MessageSink;

const CONTENT_ID: &str = "a40808ac-1417-4c48-9781-1dd2d8c8c6dc";

#[derive(Clone, Default)]
struct MemorySink {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemorySink {
    fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&self, message: OutboundMessage) -> Result<(), ProduceError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl MessageSink for FailingSink {
    async fn send(&self, _: OutboundMessage) -> Result<(), ProduceError> {
        Err(ProduceError::Canceled)
    }
}

fn native_message() -> Message {
    Message::new(
        Vec::new(),
        json!({"id": CONTENT_ID, "title": "Markets now"})
            .to_string()
            .into_bytes(),
    )
    .with_header(REQUEST_ID_HEADER, "tid_handler")
    .with_header(MESSAGE_TIMESTAMP_HEADER, "2017-04-13T10:27:32.353Z")
    .with_header(ORIGIN_SYSTEM_HEADER, VIDEO_SYSTEM_ORIGIN)
    .with_header(CONTENT_TYPE_HEADER, "application/json")
}

#[tokio::test]
async fn publishes_mapped_video() {
    let sink = MemorySink::default();
    let handler = EventsHandler::new(VideoMapper::new(), sink.clone());

    let outcome = handler.on_message(&native_message()).await;
    assert_eq!(
        outcome,
        Outcome::Published {
            uuid: CONTENT_ID.to_string()
        }
    );

    let sent = sink.messages();
    assert_eq!(sent.len(), 1);
    let out = &sent[0];
    assert_eq!(out.key, CONTENT_ID);
    assert_eq!(out.header(REQUEST_ID_HEADER), Some("tid_handler"));
    assert_eq!(
        out.header(MESSAGE_TIMESTAMP_HEADER),
        Some("2017-04-13T10:27:32.353Z")
    );
    assert_eq!(out.header(MESSAGE_TYPE_HEADER), Some("cms-content-published"));
    assert_eq!(out.header(ORIGIN_SYSTEM_HEADER), Some(VIDEO_SYSTEM_ORIGIN));
    assert_eq!(out.header(CONTENT_TYPE_HEADER), Some("application/json"));
    assert!(out.header(MESSAGE_ID_HEADER).is_some());

    let event = PublicationEvent::from_json(&out.body).unwrap();
    assert_eq!(event.payload.title.as_deref(), Some("Markets now"));
    assert_eq!(event.payload.publish_reference.as_deref(), Some("tid_handler"));
}

#[tokio::test]
async fn accepts_video_content_type_and_missing_content_type() {
    let sink = MemorySink::default();
    let handler = EventsHandler::new(VideoMapper::new(), sink.clone());

    let video = native_message().with_header(
        CONTENT_TYPE_HEADER,
        "application/vnd.ft-upp-video+json",
    );
    assert!(matches!(
        handler.on_message(&video).await,
        Outcome::Published { .. }
    ));

    let untyped = native_message().without_header(CONTENT_TYPE_HEADER);
    assert!(matches!(
        handler.on_message(&untyped).await,
        Outcome::Published { .. }
    ));
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn skips_other_origins() {
    let sink = MemorySink::default();
    let handler = EventsHandler::new(VideoMapper::new(), sink.clone());

    let other = native_message().with_header(
        ORIGIN_SYSTEM_HEADER,
        "http://cmdb.ft.com/systems/methode-web-pub",
    );
    assert!(matches!(
        handler.on_message(&other).await,
        Outcome::Skipped(_)
    ));

    let no_origin = native_message().without_header(ORIGIN_SYSTEM_HEADER);
    assert!(matches!(
        handler.on_message(&no_origin).await,
        Outcome::Skipped(_)
    ));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn skips_other_content_types() {
    let sink = MemorySink::default();
    let handler = EventsHandler::new(VideoMapper::new(), sink.clone());

    let article = native_message().with_header(
        CONTENT_TYPE_HEADER,
        "application/vnd.ft-upp-article+json",
    );
    assert!(matches!(
        handler.on_message(&article).await,
        Outcome::Skipped(_)
    ));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn mapping_errors_are_not_published() {
    let sink = MemorySink::default();
    let handler = EventsHandler::new(VideoMapper::new(), sink.clone());

    let no_tid = native_message().without_header(REQUEST_ID_HEADER);
    assert_eq!(
        handler.on_message(&no_tid).await,
        Outcome::Failed(
            "X-Request-Id not found in kafka message headers. Skipping message".to_string()
        )
    );

    let mut invalid = native_message();
    invalid.body = b"{{ not json".to_vec();
    assert!(matches!(
        handler.on_message(&invalid).await,
        Outcome::Failed(_)
    ));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn sink_failures_are_reported() {
    let handler = EventsHandler::new(VideoMapper::new(), FailingSink);
    assert_eq!(
        handler.on_message(&native_message()).await,
        Outcome::Failed("failed to produce to kafka (timeout)".to_string())
    );
}
