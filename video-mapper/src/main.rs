use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use envconfig::Envconfig;
use health::SystemInfo;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use video_mapper::config::Config;
use video_mapper::consumer::KafkaConsumer;
use video_mapper::handler::EventsHandler;
use video_mapper::healthcheck::HealthCheck;
use video_mapper::kafka::{
    create_kafka_consumer, create_kafka_producer, KafkaConsumerProbe, KafkaProducerProbe,
};
use video_mapper::mapper::VideoMapper;
use video_mapper::metrics::install_prometheus;
use video_mapper::router::router;
use video_mapper::sink::KafkaSink;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .boxed();
    tracing_subscriber::registry().with(log_layer).init();

    let config = Config::init_from_env()
        .context("Failed to load configuration from environment variables")?;
    let kafka = &config.kafka;
    let timeout = config.health_check_timeout_ms.0;

    let producer =
        create_kafka_producer(kafka, timeout).context("Failed to create Kafka producer")?;
    let consumer =
        Arc::new(create_kafka_consumer(kafka).context("Failed to create Kafka consumer")?);

    let health_check = HealthCheck::new(
        SystemInfo {
            system_code: config.app_system_code.clone(),
            name: config.app_name.clone(),
            description: "Maps native video content from the video editor into publication events"
                .to_owned(),
        },
        &config.panic_guide,
        Arc::new(KafkaConsumerProbe::new(
            consumer.clone(),
            kafka.kafka_consumer_topic.as_str(),
            config.consumer_lag_tolerance,
            timeout,
        )),
        Arc::new(KafkaProducerProbe::new(
            producer.clone(),
            kafka.kafka_producer_topic.as_str(),
            timeout,
        )),
    );

    let mapper = VideoMapper::new();
    let sink = KafkaSink::new(producer, kafka.kafka_producer_topic.as_str());
    let prometheus = config
        .export_prometheus
        .then(install_prometheus)
        .transpose()
        .context("Failed to install the Prometheus recorder")?;
    let app = router(mapper.clone(), health_check, prometheus);
    let kafka_consumer = KafkaConsumer::new(consumer, EventsHandler::new(mapper, sink.clone()));

    let bind = config.bind();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(event = "service_started", "listening on {}", bind);

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown())
            .await
    };

    let result = tokio::select! {
        res = server => res.context("HTTP server failed"),
        res = kafka_consumer.run() => res,
    };

    if let Err(err) = sink.flush(Duration::from_secs(30)) {
        warn!("Failed to flush producer on shutdown: {err:?}");
    }
    result
}
