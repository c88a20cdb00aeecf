use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::Message as _;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::handler::EventsHandler;
use crate::kafka::{to_message, KafkaContext};
use crate::sink::MessageSink;

const CONSUMER_ERRORS_TOTAL: &str = "video_mapper_kafka_consumer_errors_total";

/// Longest pause between two polls after consecutive errors.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Reads the native content topic one message at a time and hands every
/// message to the events handler. The offset is stored once the message is
/// handled, whatever the outcome.
pub struct KafkaConsumer<S> {
    consumer: Arc<StreamConsumer<KafkaContext>>,
    handler: EventsHandler<S>,
}

impl<S: MessageSink> KafkaConsumer<S> {
    pub fn new(consumer: Arc<StreamConsumer<KafkaContext>>, handler: EventsHandler<S>) -> Self {
        KafkaConsumer { consumer, handler }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!(event = "consume_queue", "starting to consume native video messages");
        let mut consecutive_errors = 0;

        loop {
            let record = match self.consumer.recv().await {
                Ok(record) => record,
                Err(err) => {
                    consecutive_errors += 1;
                    let (kind, recovery) = recovery(&err, consecutive_errors);
                    metrics::counter!(CONSUMER_ERRORS_TOTAL, "kind" => kind).increment(1);

                    match recovery {
                        Recovery::Retry(delay) => {
                            warn!(kind, "polling the queue failed, retrying in {delay:?}: {err}");
                            sleep(delay).await;
                            continue;
                        }
                        Recovery::Shutdown => {
                            info!("consumer closed, stopping");
                            return Ok(());
                        }
                        Recovery::Abort => {
                            error!(kind, "cannot keep consuming: {err}");
                            return Err(anyhow::anyhow!("consuming native videos failed: {err}"));
                        }
                    }
                }
            };
            consecutive_errors = 0;

            let message = to_message(&record);
            self.handler.on_message(&message).await;

            if let Err(err) =
                self.consumer
                    .store_offset(record.topic(), record.partition(), record.offset() + 1)
            {
                warn!("failed to store offset {}: {}", record.offset(), err);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Retry(Duration),
    /// The consumer was closed, the loop ends cleanly.
    Shutdown,
    Abort,
}

/// Classifies a failed poll, returning the metric label and what the loop
/// does next. `attempt` counts the consecutive failures, starting at 1.
fn recovery(err: &KafkaError, attempt: u32) -> (&'static str, Recovery) {
    let code = match err {
        KafkaError::Canceled => return ("canceled", Recovery::Shutdown),
        KafkaError::MessageConsumptionFatal(_) => return ("fatal", Recovery::Abort),
        KafkaError::MessageConsumption(code) | KafkaError::Global(code) => *code,
        _ => return ("unexpected", Recovery::Abort),
    };

    match code {
        RDKafkaErrorCode::Authentication | RDKafkaErrorCode::SaslAuthenticationFailed => {
            ("authentication", Recovery::Abort)
        }
        RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure => {
            ("broker", Recovery::Retry(backoff(attempt)))
        }
        // the input topic may be created after the mapper starts
        RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic => {
            ("unknown_topic", Recovery::Retry(backoff(attempt)))
        }
        _ => ("consumer", Recovery::Retry(backoff(attempt))),
    }
}

/// 100ms doubling per consecutive failure, capped at `MAX_BACKOFF`.
fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    Duration::from_millis(100 * 2_u64.pow(exponent)).min(MAX_BACKOFF)
}
