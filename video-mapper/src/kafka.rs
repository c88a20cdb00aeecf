use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, gauge};
use rdkafka::consumer::{Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Headers;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use rdkafka::ClientConfig;
use tracing::{debug, info, warn};

use crate::config::KafkaConfig;
use crate::error::ProbeError;
use crate::healthcheck::{ConsumerProbe, ProducerProbe};
use crate::message::Message;

pub struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        gauge!("video_mapper_kafka_callback_queue_depth").set(stats.replyq as f64);
        gauge!("video_mapper_kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        gauge!("video_mapper_kafka_producer_queue_depth_limit").set(stats.msg_max as f64);
        gauge!("video_mapper_kafka_producer_queue_bytes_limit").set(stats.msg_size_max as f64);

        for (_, stats) in stats.brokers {
            let id_string = format!("{}", stats.nodeid);
            gauge!(
                "video_mapper_kafka_broker_requests_pending",
                "broker" => id_string.clone()
            )
            .set(stats.outbuf_cnt as f64);
            counter!(
                "video_mapper_kafka_broker_tx_errors_total",
                "broker" => id_string.clone()
            )
            .absolute(stats.txerrs);
            counter!(
                "video_mapper_kafka_broker_rx_errors_total",
                "broker" => id_string
            )
            .absolute(stats.rxerrs);
        }
    }
}

impl ConsumerContext for KafkaContext {}

fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.kafka_hosts.as_str())
        .set("statistics.interval.ms", "10000");

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };
    client_config
}

/// Creates the producer. Unreachable brokers are logged but don't fail
/// startup, the health checks report them.
pub fn create_kafka_producer(
    config: &KafkaConfig,
    timeout: Duration,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    let mut client_config = client_config(config);
    client_config
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        );

    debug!("rdkafka producer configuration: {:?}", client_config);
    let producer: FutureProducer<KafkaContext> = client_config.create_with_context(KafkaContext)?;

    // "Ping" the Kafka brokers by requesting metadata
    match producer.client().fetch_metadata(None, timeout) {
        Ok(metadata) => info!(
            "connected to Kafka brokers, found {} topics",
            metadata.topics().len()
        ),
        Err(error) => warn!("failed to fetch metadata from Kafka brokers: {}", error),
    }

    Ok(producer)
}

/// Creates the consumer and subscribes it to the input topic. Offsets are
/// stored by the consume loop once a message is handled, and committed
/// periodically.
pub fn create_kafka_consumer(
    config: &KafkaConfig,
) -> Result<StreamConsumer<KafkaContext>, KafkaError> {
    let mut client_config = client_config(config);
    client_config
        .set("group.id", config.kafka_consumer_group.as_str())
        .set("auto.offset.reset", &config.kafka_consumer_offset_reset)
        .set("enable.auto.offset.store", "false")
        .set("enable.auto.commit", "true")
        .set(
            "auto.commit.interval.ms",
            config.kafka_consumer_auto_commit_interval_ms.to_string(),
        );

    debug!("rdkafka consumer configuration: {:?}", client_config);
    let consumer: StreamConsumer<KafkaContext> = client_config.create_with_context(KafkaContext)?;
    consumer.subscribe(&[config.kafka_consumer_topic.as_str()])?;

    info!(
        "subscribed to {} as {}",
        config.kafka_consumer_topic.as_str(),
        config.kafka_consumer_group.as_str()
    );
    Ok(consumer)
}

/// Converts a Kafka record into a `Message`. Header values that are not
/// valid UTF-8 are converted lossily.
pub fn to_message<M: rdkafka::Message>(record: &M) -> Message {
    let headers = record.headers().into_iter().flat_map(|headers| {
        headers.iter().map(|header| {
            let value = header
                .value
                .map(|value| String::from_utf8_lossy(value).into_owned())
                .unwrap_or_default();
            (header.key.to_owned(), value)
        })
    });
    Message::new(headers, record.payload().unwrap_or_default().to_vec())
}

fn ensure_topic(metadata: &Metadata, topic: &str) -> Result<(), ProbeError> {
    metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic && t.error().is_none())
        .map(|_| ())
        .ok_or_else(|| ProbeError::TopicNotFound(topic.to_owned()))
}

/// Sums, over the partitions the group has committed an offset for, the
/// distance between the committed offset and the high watermark.
fn consumer_lag<C: ConsumerContext>(
    consumer: &StreamConsumer<C>,
    topic: &str,
    timeout: Duration,
) -> Result<i64, ProbeError> {
    let metadata = consumer.fetch_metadata(Some(topic), timeout)?;
    ensure_topic(&metadata, topic)?;

    let mut tpl = TopicPartitionList::new();
    for t in metadata.topics().iter().filter(|t| t.name() == topic) {
        for partition in t.partitions() {
            tpl.add_partition(topic, partition.id());
        }
    }

    let committed = consumer.committed_offsets(tpl, timeout)?;
    let mut lag = 0;
    for elem in committed.elements() {
        if let Offset::Offset(consumer_offset) = elem.offset() {
            let (_, high_watermark) = consumer.fetch_watermarks(topic, elem.partition(), timeout)?;
            debug!(
                "partition {} committed offset {} high watermark {}",
                elem.partition(),
                consumer_offset,
                high_watermark
            );
            lag += (high_watermark - consumer_offset).max(0);
        }
    }
    Ok(lag)
}

pub struct KafkaConsumerProbe {
    consumer: Arc<StreamConsumer<KafkaContext>>,
    topic: String,
    lag_tolerance: i64,
    timeout: Duration,
}

impl KafkaConsumerProbe {
    pub fn new(
        consumer: Arc<StreamConsumer<KafkaContext>>,
        topic: &str,
        lag_tolerance: i64,
        timeout: Duration,
    ) -> Self {
        KafkaConsumerProbe {
            consumer,
            topic: topic.to_owned(),
            lag_tolerance,
            timeout,
        }
    }
}

#[async_trait]
impl ConsumerProbe for KafkaConsumerProbe {
    async fn connectivity_check(&self) -> Result<(), ProbeError> {
        let consumer = self.consumer.clone();
        let topic = self.topic.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            let metadata = consumer.fetch_metadata(Some(topic.as_str()), timeout)?;
            ensure_topic(&metadata, &topic)
        })
        .await?
    }

    async fn lag_check(&self) -> Result<i64, ProbeError> {
        let consumer = self.consumer.clone();
        let topic = self.topic.clone();
        let timeout = self.timeout;
        let lag = tokio::task::spawn_blocking(move || consumer_lag(&consumer, &topic, timeout))
            .await??;

        gauge!("video_mapper_consumer_lag").set(lag as f64);
        if lag > self.lag_tolerance {
            return Err(ProbeError::Lagging {
                lag,
                tolerance: self.lag_tolerance,
            });
        }
        Ok(lag)
    }
}

pub struct KafkaProducerProbe {
    producer: FutureProducer<KafkaContext>,
    topic: String,
    timeout: Duration,
}

impl KafkaProducerProbe {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: &str, timeout: Duration) -> Self {
        KafkaProducerProbe {
            producer,
            topic: topic.to_owned(),
            timeout,
        }
    }
}

#[async_trait]
impl ProducerProbe for KafkaProducerProbe {
    async fn connectivity_check(&self) -> Result<(), ProbeError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            let metadata = producer.client().fetch_metadata(Some(topic.as_str()), timeout)?;
            ensure_topic(&metadata, &topic)
        })
        .await?
    }
}
