use metrics::counter;
use tracing::{error, info};

use crate::mapper::VideoMapper;
use crate::message::{
    Message, OutboundMessage, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, ORIGIN_SYSTEM_HEADER,
    REQUEST_ID_HEADER, VIDEO_CONTENT_TYPE, VIDEO_SYSTEM_ORIGIN,
};
use crate::sink::MessageSink;

const MESSAGES_TOTAL: &str = "video_mapper_messages_total";
const SOFT_FAILURES_TOTAL: &str = "video_mapper_soft_failures_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a message for this mapper
    Skipped(String),
    Failed(String),
    Published { uuid: String },
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
            Outcome::Published { .. } => "published",
        }
    }
}

/// Filters native content messages, maps them and writes the publication
/// events to the sink.
pub struct EventsHandler<S> {
    mapper: VideoMapper,
    sink: S,
}

impl<S: MessageSink> EventsHandler<S> {
    pub fn new(mapper: VideoMapper, sink: S) -> Self {
        EventsHandler { mapper, sink }
    }

    pub async fn on_message(&self, message: &Message) -> Outcome {
        let outcome = self.handle(message).await;
        counter!(MESSAGES_TOTAL, "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn handle(&self, message: &Message) -> Outcome {
        let transaction_id = message.header(REQUEST_ID_HEADER).unwrap_or_default();

        let origin = message.header(ORIGIN_SYSTEM_HEADER).unwrap_or_default();
        if origin != VIDEO_SYSTEM_ORIGIN {
            info!(
                event = "consume_queue",
                transaction_id,
                "ignoring message with different Origin-System-Id {:?}", origin
            );
            return Outcome::Skipped(format!("origin system {origin:?}"));
        }

        if let Some(content_type) = message.header(CONTENT_TYPE_HEADER) {
            if !is_video_content_type(content_type) {
                info!(
                    event = "consume_queue",
                    transaction_id,
                    "ignoring message with Content-Type {:?}", content_type
                );
                return Outcome::Skipped(format!("content type {content_type:?}"));
            }
        }

        let mapped = match self.mapper.transform(message) {
            Ok(mapped) => mapped,
            Err(err) => {
                error!(
                    event = "consume_queue",
                    transaction_id,
                    "error consuming message: {}", err
                );
                return Outcome::Failed(err.to_string());
            }
        };

        for warning in &mapped.warnings {
            counter!(SOFT_FAILURES_TOTAL, "field" => warning.field).increment(1);
        }

        let uuid = mapped.content_id;
        let outbound = OutboundMessage::published(
            &uuid,
            &mapped.transaction_id,
            &mapped.last_modified,
            mapped.body,
        );
        if let Err(err) = self.sink.send(outbound).await {
            error!(
                event = "consume_queue",
                transaction_id,
                uuid = %uuid,
                "error sending transformed message to queue: {}", err
            );
            return Outcome::Failed(err.to_string());
        }

        info!(
            event = "consume_queue",
            transaction_id,
            uuid = %uuid,
            "mapped and sent for uuid: {}", uuid
        );
        Outcome::Published { uuid }
    }
}

/// JSON video media types, parameters such as `charset` ignored.
fn is_video_content_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE)
        || media_type.eq_ignore_ascii_case(VIDEO_CONTENT_TYPE)
}
