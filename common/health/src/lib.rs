//! Health reporting for the external dependencies of a service.
//!
//! A service describes each dependency with a `Check`: static metadata
//! (name, severity, impact, remediation link) plus a checker future that
//! probes the dependency. The same checker futures can be combined in two
//! ways:
//!   - `run_checks` runs every check concurrently and collects all the
//!     results in a `HealthReport`. A failing or panicking check never
//!     prevents the others from reporting. This is a diagnostic surface,
//!     served with a 200 whatever the outcome.
//!   - `good_to_go` runs the checkers concurrently and resolves as soon as
//!     one of them fails, aborting the ones still pending. This is the
//!     gate used by load balancers and orchestrators.
//!
//! Checkers resolve to `Ok(output)` when the dependency is healthy, and to
//! `Err(message)` otherwise.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub type CheckerFuture = BoxFuture<'static, Result<String, String>>;

pub struct Check {
    pub id: String,
    pub name: String,
    /// 1 is the most severe
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    pub panic_guide: String,
    pub checker: CheckerFuture,
}

/// Identifies the service in a `HealthReport`.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub system_code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    pub panic_guide: String,
    pub check_output: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub schema_version: u8,
    pub system_code: String,
    pub name: String,
    pub description: String,
    pub checks: Vec<CheckResult>,
    /// True when every check passed
    pub ok: bool,
}

impl IntoResponse for HealthReport {
    /// Always a 200: the per-check status is carried in the body.
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtgStatus {
    pub good_to_go: bool,
    pub message: String,
}

impl GtgStatus {
    pub fn ok() -> Self {
        GtgStatus {
            good_to_go: true,
            message: String::new(),
        }
    }

    pub fn not_ok(message: impl Into<String>) -> Self {
        GtgStatus {
            good_to_go: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for GtgStatus {
    fn into_response(self) -> Response {
        let headers = [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")];
        match self.good_to_go {
            true => (StatusCode::OK, headers, "OK".to_owned()),
            false => (StatusCode::SERVICE_UNAVAILABLE, headers, self.message),
        }
        .into_response()
    }
}

/// Runs all the checks concurrently and reports every one of them, in the
/// order they were given.
pub async fn run_checks(system: &SystemInfo, checks: Vec<Check>) -> HealthReport {
    let mut metadata = Vec::with_capacity(checks.len());
    let mut handles = Vec::with_capacity(checks.len());
    for check in checks {
        handles.push(tokio::spawn(check.checker));
        metadata.push(CheckMetadata {
            id: check.id,
            name: check.name,
            severity: check.severity,
            business_impact: check.business_impact,
            technical_summary: check.technical_summary,
            panic_guide: check.panic_guide,
        });
    }

    let outcomes = join_all(handles).await;
    let checks: Vec<CheckResult> = metadata
        .into_iter()
        .zip(outcomes)
        .map(|(check, outcome)| {
            let (ok, check_output) = match outcome {
                Ok(Ok(output)) => (true, output),
                Ok(Err(message)) => (false, message),
                Err(err) => (false, format!("check did not complete: {err}")),
            };
            check.into_result(ok, check_output)
        })
        .collect();

    let ok = checks.iter().all(|check| check.ok);
    match ok {
        true => info!("{} health check ok", system.name),
        false => {
            let failing: Vec<&str> = checks
                .iter()
                .filter(|check| !check.ok)
                .map(|check| check.name.as_str())
                .collect();
            warn!("{} health check failed: {:?}", system.name, failing)
        }
    }

    HealthReport {
        schema_version: 1,
        system_code: system.system_code.clone(),
        name: system.name.clone(),
        description: system.description.clone(),
        checks,
        ok,
    }
}

/// Runs the checkers concurrently and returns on the first failure without
/// waiting for the others, which are aborted. Good to go only if every
/// checker succeeds.
pub async fn good_to_go(checkers: Vec<CheckerFuture>) -> GtgStatus {
    let mut set = JoinSet::new();
    for checker in checkers {
        set.spawn(checker);
    }

    while let Some(res) = set.join_next().await {
        match res {
            Ok(Ok(_)) => {}
            Ok(Err(message)) => {
                set.abort_all();
                warn!("gtg check failed: {}", message);
                return GtgStatus::not_ok(message);
            }
            Err(err) => {
                set.abort_all();
                warn!("join error while waiting on gtg check: {:?}", err);
                return GtgStatus::not_ok(format!("check did not complete: {err}"));
            }
        }
    }
    GtgStatus::ok()
}

struct CheckMetadata {
    id: String,
    name: String,
    severity: u8,
    business_impact: String,
    technical_summary: String,
    panic_guide: String,
}

impl CheckMetadata {
    fn into_result(self, ok: bool, check_output: String) -> CheckResult {
        CheckResult {
            id: self.id,
            name: self.name,
            ok,
            severity: self.severity,
            business_impact: self.business_impact,
            technical_summary: self.technical_summary,
            panic_guide: self.panic_guide,
            check_output,
            last_updated: OffsetDateTime::now_utc(),
        }
    }
}
