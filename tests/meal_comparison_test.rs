// tests/meal_comparison_test.rs - Before/after state machine

mod common;

use common::{create_user, setup};
use health_hub_ai::core::CoreError;
use health_hub_ai::models::ComparisonStatus;

const BEFORE_RESPONSE: &str = r#"{
    "dishes": [
        {"name": "红烧肉", "estimated_weight": 200, "estimated_calories": 500.0,
         "estimated_protein": 25.0, "estimated_fat": 35.0, "estimated_carbs": 10.0},
        {"name": "清炒时蔬", "estimated_weight": 150, "estimated_calories": 80.0,
         "estimated_protein": 3.0, "estimated_fat": 5.0, "estimated_carbs": 8.0}
    ],
    "total_estimated_calories": 580.0,
    "total_estimated_protein": 28.0,
    "total_estimated_fat": 40.0,
    "total_estimated_carbs": 18.0
}"#;

const AFTER_RESPONSE: &str = r#"{
    "dishes": [
        {"name": "红烧肉", "remaining_ratio": 0.25, "remaining_weight": 50},
        {"name": "清炒时蔬", "remaining_ratio": 0.0, "remaining_weight": 0}
    ],
    "overall_remaining_ratio": 0.2,
    "comparison_analysis": "您吃掉了约80%的食物。"
}"#;

// A tiny valid-enough PNG payload for upload handling
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

#[tokio::test]
async fn test_happy_path_before_then_after() {
    let app = setup().await;
    let user_id = create_user(&app, "meal_user").await;

    app.transport.push_ok(BEFORE_RESPONSE);
    let record = app
        .state
        .meal_service
        .upload_before(user_id, PNG_BYTES, "png")
        .await
        .expect("before upload");
    assert_eq!(record.status, ComparisonStatus::PendingAfter);
    assert_eq!(record.original_calories, Some(580.0));
    assert!(record.before_image_url.as_deref().unwrap().starts_with("/uploads/meal/"));
    // Features stored verbatim as JSON
    let stored: serde_json::Value =
        serde_json::from_str(record.before_features.as_deref().unwrap()).expect("features json");
    assert_eq!(stored["dishes"].as_array().unwrap().len(), 2);

    app.transport.push_ok(AFTER_RESPONSE);
    let completed = app
        .state
        .meal_service
        .upload_after(record.id, PNG_BYTES, "png")
        .await
        .expect("after upload");
    assert_eq!(completed.status, ComparisonStatus::Completed);

    let ratio = completed.consumption_ratio.expect("ratio set");
    assert!((0.0..=1.0).contains(&ratio));
    assert!((ratio - 0.8).abs() < 1e-6);

    // net = original x consumption ratio, for every macro
    assert!((completed.net_calories.unwrap() - 580.0 * ratio).abs() < 0.1);
    assert!((completed.net_protein.unwrap() - 28.0 * ratio).abs() < 0.1);
    assert!((completed.net_fat.unwrap() - 40.0 * ratio).abs() < 0.1);
    assert!((completed.net_carbs.unwrap() - 18.0 * ratio).abs() < 0.1);
}

#[tokio::test]
async fn test_second_after_upload_conflicts() {
    let app = setup().await;
    let user_id = create_user(&app, "conflict_user").await;

    app.transport.push_ok(BEFORE_RESPONSE);
    let record = app
        .state
        .meal_service
        .upload_before(user_id, PNG_BYTES, "png")
        .await
        .expect("before upload");

    app.transport.push_ok(AFTER_RESPONSE);
    app.state
        .meal_service
        .upload_after(record.id, PNG_BYTES, "png")
        .await
        .expect("first after upload");

    let err = app
        .state
        .meal_service
        .upload_after(record.id, PNG_BYTES, "png")
        .await
        .expect_err("second after upload must fail");
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_after_upload_unknown_id_not_found() {
    let app = setup().await;
    let err = app
        .state
        .meal_service
        .upload_after(9999, PNG_BYTES, "png")
        .await
        .expect_err("unknown id must fail");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_after_llm_failure_defaults_to_075() {
    let app = setup().await;
    let user_id = create_user(&app, "degraded_user").await;

    app.transport.push_ok(BEFORE_RESPONSE);
    let record = app
        .state
        .meal_service
        .upload_before(user_id, PNG_BYTES, "png")
        .await
        .expect("before upload");

    // The comparison call fails; the record still completes
    app.transport.push_err("model unavailable");
    let completed = app
        .state
        .meal_service
        .upload_after(record.id, PNG_BYTES, "png")
        .await
        .expect("degraded completion");
    assert_eq!(completed.status, ComparisonStatus::Completed);
    assert_eq!(completed.consumption_ratio, Some(0.75));
    assert!((completed.net_calories.unwrap() - 580.0 * 0.75).abs() < 0.1);
    assert!(completed
        .comparison_analysis
        .as_deref()
        .unwrap()
        .contains("75%"));
}

#[tokio::test]
async fn test_manual_adjust_recomputes_net() {
    let app = setup().await;
    let user_id = create_user(&app, "adjust_user").await;

    app.transport.push_ok(BEFORE_RESPONSE);
    let record = app
        .state
        .meal_service
        .upload_before(user_id, PNG_BYTES, "png")
        .await
        .expect("before upload");

    // Adjust before completion is a state-machine violation
    let err = app
        .state
        .meal_service
        .adjust(record.id, 0.5)
        .await
        .expect_err("adjust on pending record must fail");
    assert!(matches!(err, CoreError::Conflict(_)));

    app.transport.push_ok(AFTER_RESPONSE);
    app.state
        .meal_service
        .upload_after(record.id, PNG_BYTES, "png")
        .await
        .expect("after upload");

    let adjusted = app
        .state
        .meal_service
        .adjust(record.id, 0.5)
        .await
        .expect("adjust");
    assert_eq!(adjusted.consumption_ratio, Some(0.5));
    assert!((adjusted.net_calories.unwrap() - 290.0).abs() < 0.1);
    assert!((adjusted.net_protein.unwrap() - 14.0).abs() < 0.1);

    let err = app
        .state
        .meal_service
        .adjust(record.id, 1.5)
        .await
        .expect_err("out-of-range ratio rejected");
    assert!(matches!(err, CoreError::Validation(_)));
}
