use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors that abort the mapping of a message. No output is produced and the
/// message must not be retried as-is.
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("X-Request-Id not found in kafka message headers. Skipping message")]
    MissingCorrelationId,
    #[error("video JSON couldn't be unmarshalled, skipping invalid JSON: {0}")]
    MalformedPayload(String),
    #[error("could not extract UUID from video message, skipping invalid JSON: {0}")]
    MissingContentId(#[source] FieldError),
    #[error("couldn't marshal publication event for {uuid}: {error}")]
    Serialization {
        uuid: String,
        #[source]
        error: serde_json::Error,
    },
}

impl IntoResponse for MapperError {
    fn into_response(self) -> Response {
        match self {
            MapperError::MissingCorrelationId
            | MapperError::MalformedPayload(_)
            | MapperError::MissingContentId(_) => (StatusCode::BAD_REQUEST, self.to_string()),

            MapperError::Serialization { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
        .into_response()
    }
}

/// Failure to read one field of the native video document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("[{0}] field of native video JSON is null")]
    MissingField(String),
    #[error("[{key}] field of native video JSON is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("no valid value could be found in any of {0:?}")]
    NoCandidate(Vec<String>),
}

#[derive(Error, Debug)]
pub enum IdentifierError {
    #[error("{value} is not a valid identifier: {error}")]
    InvalidIdentifier {
        value: String,
        #[source]
        error: uuid::Error,
    },
    #[error("couldn't extract uuid from uri {0}")]
    NotFoundInUri(String),
}

/// Recoverable failures: the field is left empty and mapping carries on.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error("transcription has invalid HTML body and will be skipped")]
    InvalidTranscript,
}

#[derive(Error, Debug)]
pub enum ProduceError {
    #[error("failed to produce to kafka: {error}")]
    Kafka { error: KafkaError },
    #[error("failed to produce to kafka (timeout)")]
    Canceled,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("error connecting to the queue: {0}")]
    Kafka(#[from] KafkaError),
    #[error("topic {0} was not found")]
    TopicNotFound(String),
    #[error("consumer is lagging behind by {lag} messages, tolerance is {tolerance}")]
    Lagging { lag: i64, tolerance: i64 },
    #[error("probe did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}
