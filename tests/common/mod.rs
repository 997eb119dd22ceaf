#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use heartwatch::db::{self, ReadingStore, Registry};
use heartwatch::router::{MonitorState, monitor_router};
use heartwatch::service::danger::DangerPolicy;
use heartwatch::service::notifier::NotificationDispatcher;
use heartwatch::types::alert::AlertMessage;
use heartwatch::types::vitals::FeatureVector;
use heartwatch::{ClassifierRegistry, IngestionPipeline, Mailer, MonitorError, RiskModel};

pub const OPERATOR_KEY: &str = "operator-test-key";

/// Model with a fixed verdict and no probability capability.
pub struct FixedModel(pub bool);

impl RiskModel for FixedModel {
    fn predict(&self, _features: &FeatureVector) -> bool {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<AlertMessage>>,
}

impl RecordingMailer {
    pub fn recipients(&self) -> Vec<String> {
        let mut to: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.recipient.clone())
            .collect();
        to.sort();
        to
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), MonitorError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub mailer: Arc<RecordingMailer>,
    pub readings: ReadingStore,
}

pub async fn spawn_app() -> TestApp {
    let pool = db::open("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    let readings = ReadingStore::new(pool.clone());
    let registry = Registry::new(pool);
    let negative = || -> Arc<dyn RiskModel> { Arc::new(FixedModel(false)) };
    let classifiers = ClassifierRegistry::new(negative(), negative(), negative());

    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = NotificationDispatcher::new(registry.clone(), mailer.clone(), 2);
    let pipeline = IngestionPipeline::new(
        classifiers,
        DangerPolicy::default(),
        readings.clone(),
        registry.clone(),
        dispatcher,
    );
    let state = MonitorState::new(pipeline, readings.clone(), registry, Arc::from(OPERATOR_KEY));
    TestApp {
        app: monitor_router(state),
        mailer,
        readings,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("response body was not json")
        };
        (status, json)
    }

    pub async fn operator(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {OPERATOR_KEY}"));
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");
        self.send(req).await
    }

    pub async fn device(&self, body: Value) -> (StatusCode, Value) {
        self.device_raw(body.to_string()).await
    }

    pub async fn device_raw(&self, body: String) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/iot/reading")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("failed to build request");
        self.send(req).await
    }

    /// Patient with one linked caregiver; returns the patient id.
    pub async fn seed_patient(&self, caregiver_email: &str) -> i64 {
        let (status, patient) = self
            .operator(
                "POST",
                "/api/patients",
                Some(serde_json::json!({"name": "Ada", "age": 64, "gender": "F"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let patient_id = patient["id"].as_i64().expect("patient id");

        let (status, caregiver) = self
            .operator(
                "POST",
                "/api/caregivers",
                Some(serde_json::json!({"name": "Sam", "email": caregiver_email})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .operator(
                "POST",
                &format!("/api/patients/{patient_id}/caregivers"),
                Some(serde_json::json!({"caregiver_id": caregiver["id"], "relationship": "spouse"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        patient_id
    }

    /// Registers a device and returns `(device_id, api_key)`.
    pub async fn seed_device(&self, patient_id: Option<i64>) -> (String, String) {
        let (status, device) = self
            .operator(
                "POST",
                "/api/devices",
                Some(serde_json::json!({
                    "device_name": "wrist band",
                    "device_type": "ppg",
                    "patient_id": patient_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            device["device_id"].as_str().expect("device id").to_string(),
            device["api_key"].as_str().expect("api key").to_string(),
        )
    }
}
