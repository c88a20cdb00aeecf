use std::sync::Arc;

use async_trait::async_trait;
use health::{good_to_go, run_checks, Check, CheckerFuture, GtgStatus, HealthReport, SystemInfo};

use crate::error::ProbeError;

#[async_trait]
pub trait ConsumerProbe: Send + Sync {
    async fn connectivity_check(&self) -> Result<(), ProbeError>;

    /// Current lag of the consumer group, failing when above tolerance.
    async fn lag_check(&self) -> Result<i64, ProbeError>;
}

#[async_trait]
pub trait ProducerProbe: Send + Sync {
    async fn connectivity_check(&self) -> Result<(), ProbeError>;
}

const BUSINESS_IMPACT: &str =
    "Publishing or updating videos will not be possible, clients will not see the new content.";

/// Health of the queue the mapper reads from and writes to. Both the
/// detailed report and good-to-go are built from the same probes.
#[derive(Clone)]
pub struct HealthCheck {
    system: SystemInfo,
    panic_guide: String,
    consumer: Arc<dyn ConsumerProbe>,
    producer: Arc<dyn ProducerProbe>,
}

impl HealthCheck {
    pub fn new(
        system: SystemInfo,
        panic_guide: &str,
        consumer: Arc<dyn ConsumerProbe>,
        producer: Arc<dyn ProducerProbe>,
    ) -> Self {
        HealthCheck {
            system,
            panic_guide: panic_guide.to_owned(),
            consumer,
            producer,
        }
    }

    pub async fn health(&self) -> HealthReport {
        let checks = vec![
            self.check(
                "read-message-queue-reachable",
                "Read Message Queue Reachable",
                "Read message queue is not reachable/healthy",
                self.consumer_reachable(),
            ),
            self.check(
                "write-message-queue-reachable",
                "Write Message Queue Reachable",
                "Write message queue is not reachable/healthy",
                self.producer_reachable(),
            ),
            self.check(
                "read-message-queue-is-not-lagging",
                "Read Message Queue Is Not Lagging",
                "Messages awaiting handling exceed the configured lag tolerance. Check if the mapper is stuck.",
                self.consumer_not_lagging(),
            ),
        ];
        run_checks(&self.system, checks).await
    }

    /// Good to go when both sides of the queue are reachable.
    pub async fn gtg(&self) -> GtgStatus {
        good_to_go(vec![self.consumer_reachable(), self.producer_reachable()]).await
    }

    fn check(&self, id: &str, name: &str, summary: &str, checker: CheckerFuture) -> Check {
        Check {
            id: id.to_owned(),
            name: name.to_owned(),
            severity: 1,
            business_impact: BUSINESS_IMPACT.to_owned(),
            technical_summary: summary.to_owned(),
            panic_guide: self.panic_guide.clone(),
            checker,
        }
    }

    fn consumer_reachable(&self) -> CheckerFuture {
        let consumer = self.consumer.clone();
        Box::pin(async move {
            consumer
                .connectivity_check()
                .await
                .map(|_| "Successfully connected to the read message queue".to_owned())
                .map_err(|err| err.to_string())
        })
    }

    fn producer_reachable(&self) -> CheckerFuture {
        let producer = self.producer.clone();
        Box::pin(async move {
            producer
                .connectivity_check()
                .await
                .map(|_| "Successfully connected to the write message queue".to_owned())
                .map_err(|err| err.to_string())
        })
    }

    fn consumer_not_lagging(&self) -> CheckerFuture {
        let consumer = self.consumer.clone();
        Box::pin(async move {
            consumer
                .lag_check()
                .await
                .map(|lag| format!("Consumer lag is {lag} messages"))
                .map_err(|err| err.to_string())
        })
    }
}
