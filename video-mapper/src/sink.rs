use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::error;

use crate::error::ProduceError;
use crate::kafka::KafkaContext;
use crate::message::OutboundMessage;

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), ProduceError>;
}

#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaSink {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: &str) -> Self {
        KafkaSink {
            producer,
            topic: topic.to_owned(),
        }
    }

    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(timeout)
    }
}

#[async_trait]
impl MessageSink for KafkaSink {
    async fn send(&self, message: OutboundMessage) -> Result<(), ProduceError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let delivery = self
            .producer
            .send_result(FutureRecord {
                topic: self.topic.as_str(),
                payload: Some(&message.body),
                partition: None,
                key: Some(&message.key),
                timestamp: None,
                headers: Some(headers),
            })
            .map_err(|(error, _)| {
                counter!("video_mapper_kafka_produce_errors_total").increment(1);
                error!("failed to enqueue message for {}: {}", message.key, error);
                ProduceError::Kafka { error }
            })?;

        match delivery.await {
            // Cancelled due to timeout while retrying
            Err(_) => {
                counter!("video_mapper_kafka_produce_errors_total").increment(1);
                Err(ProduceError::Canceled)
            }
            Ok(Err((error, _))) => {
                counter!("video_mapper_kafka_produce_errors_total").increment(1);
                Err(ProduceError::Kafka { error })
            }
            Ok(Ok(_)) => Ok(()),
        }
    }
}
