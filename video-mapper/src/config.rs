use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "APP_SYSTEM_CODE", default = "upp-next-video-mapper")]
    pub app_system_code: String,

    #[envconfig(from = "APP_NAME", default = "Next Video Mapper")]
    pub app_name: String,

    #[envconfig(
        from = "PANIC_GUIDE",
        default = "https://runbooks.ftops.tech/upp-next-video-mapper"
    )]
    pub panic_guide: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    #[envconfig(default = "120")]
    pub consumer_lag_tolerance: i64,

    #[envconfig(default = "5000")]
    pub health_check_timeout_ms: EnvMsDuration,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: NonEmptyString,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "next-video-mapper")]
    pub kafka_consumer_group: NonEmptyString,

    #[envconfig(default = "NativeCmsPublicationEvents")]
    pub kafka_consumer_topic: NonEmptyString,

    #[envconfig(default = "CmsPublicationEvents")]
    pub kafka_producer_topic: NonEmptyString,

    #[envconfig(default = "latest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: u32,

    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// Rejects empty values, so that a blank queue address or topic fails at
/// startup.
#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
