mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn resting_reading_is_accepted_and_attributed() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, api_key) = t.seed_device(Some(patient_id)).await;

    let (status, body) = t
        .device(json!({"deviceId": device_id, "credential": api_key, "heartRate": 75}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["dangerous"], false);
    assert_eq!(body["device_id"], device_id.as_str());
    assert_eq!(body["patient_id"], patient_id);
    assert_eq!(body["features"]["blood_pressure"], "117/73");
    assert_eq!(body["features"]["body_temperature"], 36.6);
    assert_eq!(body["alert"]["status"], "not_required");
    assert!(t.mailer.recipients().is_empty());

    let reading_id = body["reading_id"].as_i64().expect("reading id");
    let stored = t.readings.get(reading_id).await.unwrap().unwrap();
    assert_eq!(stored.device_id.as_deref(), Some(device_id.as_str()));
}

#[tokio::test]
async fn snake_case_fields_are_accepted() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, api_key) = t.seed_device(Some(patient_id)).await;

    let (status, _) = t
        .device(json!({"device_id": device_id, "api_key": api_key, "heart_rate": 66}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn dangerous_reading_alerts_once_and_retry_is_noop() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, api_key) = t.seed_device(Some(patient_id)).await;

    let (status, body) = t
        .device(json!({"deviceId": device_id, "credential": api_key, "heartRate": 150}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dangerous"], true);
    assert_eq!(body["triggers"], json!(["heart_rate"]));
    assert_eq!(body["alert"]["status"], "dispatched");
    assert_eq!(body["alert"]["flagged"], true);
    assert_eq!(body["alert"]["report"]["delivered"], 1);
    assert_eq!(t.mailer.recipients(), vec!["sam@example.com"]);

    let reading_id = body["reading_id"].as_i64().expect("reading id");
    let (status, reading) = t
        .operator("GET", &format!("/api/readings/{reading_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reading["notified"], true);
    assert_eq!(reading["dangerous"], true);

    let (status, retry) = t
        .operator("POST", &format!("/api/readings/{reading_id}/notify"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retry["alert"]["status"], "already_notified");
    assert_eq!(t.mailer.recipients().len(), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_with_400() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, api_key) = t.seed_device(Some(patient_id)).await;

    let cases = [
        json!({"credential": api_key, "heartRate": 80}),
        json!({"deviceId": device_id, "heartRate": 80}),
        json!({"deviceId": device_id, "credential": api_key}),
        json!({"deviceId": device_id, "credential": api_key, "heartRate": 0}),
        json!({"deviceId": device_id, "credential": api_key, "heartRate": -5}),
        json!({"deviceId": device_id, "credential": api_key, "heartRate": "fast"}),
    ];
    for case in cases {
        let (status, body) = t.device(case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case {case}");
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    let (status, _) = t.device_raw("{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.readings.recent(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_device_and_bad_key_are_indistinguishable() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, _) = t.seed_device(Some(patient_id)).await;

    let (unknown_status, unknown_body) = t
        .device(json!({"deviceId": "DEV-00000000", "credential": "whatever", "heartRate": 80}))
        .await;
    let (bad_status, bad_body) = t
        .device(json!({"deviceId": device_id, "credential": "whatever", "heartRate": 80}))
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, bad_body);
    assert!(t.readings.recent(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_device_gets_403() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, api_key) = t.seed_device(Some(patient_id)).await;

    let (status, device) = t
        .operator(
            "PATCH",
            &format!("/api/devices/{device_id}"),
            Some(json!({"status": "inactive"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(device["status"], "inactive");
    assert_eq!(device["patient_id"], patient_id);

    let (status, body) = t
        .device(json!({"deviceId": device_id, "credential": api_key, "heartRate": 80}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "DEVICE_INACTIVE");
}

#[tokio::test]
async fn unbound_device_gets_409() {
    let t = spawn_app().await;
    let (device_id, api_key) = t.seed_device(None).await;

    let (status, body) = t
        .device(json!({"deviceId": device_id, "credential": api_key, "heartRate": 80}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DEVICE_UNBOUND");
}

#[tokio::test]
async fn rotated_credential_replaces_old_one() {
    let t = spawn_app().await;
    let patient_id = t.seed_patient("sam@example.com").await;
    let (device_id, old_key) = t.seed_device(Some(patient_id)).await;

    let (status, rotated) = t
        .operator("POST", &format!("/api/devices/{device_id}/credential"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_key = rotated["api_key"].as_str().expect("new key").to_string();
    assert_ne!(new_key, old_key);

    let (status, _) = t
        .device(json!({"deviceId": device_id, "credential": old_key, "heartRate": 80}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t
        .device(json!({"deviceId": device_id, "credential": new_key, "heartRate": 80}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = t
        .operator("GET", &format!("/api/devices/{device_id}/readings"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 1);
}

#[tokio::test]
async fn oversized_body_returns_413() {
    let t = spawn_app().await;
    let padding = "a".repeat(80 * 1024);
    let (status, body) = t
        .device_raw(format!(
            r#"{{"deviceId":"DEV-00000000","credential":"{padding}","heartRate":80}}"#
        ))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}
