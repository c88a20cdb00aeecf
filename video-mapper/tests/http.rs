use std::sync::Arc;

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use health::SystemInfo;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use video_mapper::error::ProbeError;
use video_mapper::healthcheck::{ConsumerProbe, HealthCheck, ProducerProbe};
use video_mapper::mapper::VideoMapper;
use video_mapper::router::router;
use video_mapper::time::FixedTime;

struct Consumer {
    reachable: bool,
    lag: i64,
}

#[async_trait]
impl ConsumerProbe for Consumer {
    async fn connectivity_check(&self) -> Result<(), ProbeError> {
        match self.reachable {
            true => Ok(()),
            false => Err(ProbeError::TopicNotFound(
                "NativeCmsPublicationEvents".to_string(),
            )),
        }
    }

    async fn lag_check(&self) -> Result<i64, ProbeError> {
        match self.lag > 120 {
            true => Err(ProbeError::Lagging {
                lag: self.lag,
                tolerance: 120,
            }),
            false => Ok(self.lag),
        }
    }
}

struct Producer {
    reachable: bool,
}

#[async_trait]
impl ProducerProbe for Producer {
    async fn connectivity_check(&self) -> Result<(), ProbeError> {
        match self.reachable {
            true => Ok(()),
            false => Err(ProbeError::TopicNotFound("CmsPublicationEvents".to_string())),
        }
    }
}

fn app(consumer: Consumer, producer: Producer) -> Router {
    let health = HealthCheck::new(
        SystemInfo {
            system_code: "upp-next-video-mapper".to_string(),
            name: "Next Video Mapper".to_string(),
            description: "Maps native videos".to_string(),
        },
        "https://runbooks.example.com/video-mapper",
        Arc::new(consumer),
        Arc::new(producer),
    );
    let mapper = VideoMapper::with_time_source(Arc::new(FixedTime {
        time: "2020-02-02T02:02:02.002Z".to_string(),
    }));
    router(mapper, health, None)
}

fn healthy_app() -> Router {
    app(
        Consumer {
            reachable: true,
            lag: 0,
        },
        Producer { reachable: true },
    )
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

#[tokio::test]
async fn map_returns_publication_event() {
    let request = Request::builder()
        .method("POST")
        .uri("/map")
        .header("X-Request-Id", "tid_http")
        .header("Message-Timestamp", "2017-04-13T10:27:32.353Z")
        .body(Body::from(
            json!({"id": "a40808ac-1417-4c48-9781-1dd2d8c8c6dc", "title": "<b>Markets</b>"})
                .to_string(),
        ))
        .unwrap();

    let response = healthy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["x-request-id"], "tid_http");

    let body = body_bytes(response).await;
    assert!(std::str::from_utf8(&body)
        .unwrap()
        .contains(r#""title":"<b>Markets</b>""#));
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_json_include!(
        actual: body,
        expected: json!({
            "contentUri": "http://next-video-mapper.svc.ft.com/video/model/a40808ac-1417-4c48-9781-1dd2d8c8c6dc",
            "lastModified": "2017-04-13T10:27:32.353Z",
            "payload": {
                "uuid": "a40808ac-1417-4c48-9781-1dd2d8c8c6dc",
                "publishReference": "tid_http",
                "type": "MediaResource"
            }
        })
    );
}

#[tokio::test]
async fn map_generates_transaction_id() {
    let request = Request::builder()
        .method("POST")
        .uri("/map")
        .body(Body::from(
            json!({"id": "a40808ac-1417-4c48-9781-1dd2d8c8c6dc"}).to_string(),
        ))
        .unwrap();

    let response = healthy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tid = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(tid.starts_with("tid_"));

    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["payload"]["publishReference"], tid);
    assert_eq!(body["lastModified"], "2020-02-02T02:02:02.002Z");
}

#[tokio::test]
async fn map_rejects_invalid_bodies() {
    for body in ["{{ not json", "{}"] {
        let request = Request::builder()
            .method("POST")
            .uri("/map")
            .header("X-Request-Id", "tid_http")
            .body(Body::from(body))
            .unwrap();

        let response = healthy_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-request-id"], "tid_http");
        assert!(!body_bytes(response).await.is_empty());
    }
}

#[tokio::test]
async fn health_reports_every_check() {
    let app = app(
        Consumer {
            reachable: true,
            lag: 500,
        },
        Producer { reachable: true },
    );
    let response = app
        .oneshot(Request::get("/__health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_json_include!(
        actual: body,
        expected: json!({
            "schemaVersion": 1,
            "systemCode": "upp-next-video-mapper",
            "name": "Next Video Mapper",
            "ok": false,
            "checks": [
                {"name": "Read Message Queue Reachable", "ok": true, "severity": 1},
                {"name": "Write Message Queue Reachable", "ok": true},
                {
                    "name": "Read Message Queue Is Not Lagging",
                    "ok": false,
                    "checkOutput": "consumer is lagging behind by 500 messages, tolerance is 120",
                    "panicGuide": "https://runbooks.example.com/video-mapper"
                }
            ]
        })
    );
}

#[tokio::test]
async fn gtg_status_codes() {
    let response = healthy_app()
        .oneshot(Request::get("/__gtg").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"OK");

    let app = app(
        Consumer {
            reachable: false,
            lag: 0,
        },
        Producer { reachable: true },
    );
    let response = app
        .oneshot(Request::get("/__gtg").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_bytes(response).await,
        b"topic NativeCmsPublicationEvents was not found"
    );
}

#[tokio::test]
async fn service_endpoints() {
    for (uri, expected) in [("/__ping", "pong"), ("/", "next-video-mapper")] {
        let response = healthy_app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, expected.as_bytes());
    }

    let response = healthy_app()
        .oneshot(Request::get("/__build-info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["name"], "video-mapper");
}

#[tokio::test]
async fn metrics_endpoint_needs_a_recorder() {
    let response = healthy_app()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
