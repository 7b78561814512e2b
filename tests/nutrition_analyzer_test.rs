// tests/nutrition_analyzer_test.rs - Nutrition analysis with RAG and
// degraded-mode behavior

mod common;

use common::{create_user, setup};

const TOMATO_EGG_RESPONSE: &str = r#"{
    "calories": 150.0,
    "protein": 10.5,
    "fat": 8.2,
    "carbs": 6.3,
    "recommendation": "营养均衡，蛋白质含量较高，适合减脂期食用。",
    "allergens": ["egg"],
    "allergen_reasoning": "番茄炒蛋的主要食材是鸡蛋，属于蛋类过敏原。",
    "cooking_method_comparisons": [
        {"method": "炒", "calories": 150.0, "fat": 8.2, "description": "标准做法"},
        {"method": "蒸蛋", "calories": 80.0, "fat": 5.0, "description": "无需额外油脂"}
    ]
}"#;

#[tokio::test]
async fn test_analyze_with_rag_hit() {
    let app = setup().await;
    app.transport.push_ok(TOMATO_EGG_RESPONSE);

    let result = app.state.nutrition_analyzer.analyze("番茄炒蛋").await;
    assert_eq!(result.name, "番茄炒蛋");
    assert!(result.calories > 0.0);
    assert!(result.protein > 0.0);
    assert!(result.fat > 0.0);
    assert!(result.carbs > 0.0);
    assert!(result.allergens.contains(&"egg".to_string()));
    assert!(!result.allergen_reasoning.is_empty());
    assert_eq!(result.cooking_method_comparisons.len(), 2);
}

#[tokio::test]
async fn test_analyze_llm_failure_returns_default_and_logs() {
    let app = setup().await;
    let user_id = create_user(&app, "log_user").await;
    app.transport.push_err("connection refused");

    let result = app
        .state
        .nutrition_analyzer
        .analyze_for_user("任意菜", Some(user_id))
        .await;
    assert_eq!(result.name, "任意菜");
    assert_eq!(result.calories, 0.0);
    assert_eq!(result.protein, 0.0);
    assert_eq!(result.fat, 0.0);
    assert_eq!(result.carbs, 0.0);
    assert!(result.recommendation.contains("暂时无法"));
    assert!(result.allergens.is_empty());
    assert!(result.cooking_method_comparisons.is_empty());

    // The failed call is recorded on the audit log
    let (total, logs) = app
        .state
        .ai_log
        .list_logs(user_id, Some("food_analysis"), 10, 0)
        .await
        .expect("list logs");
    assert_eq!(total, 1);
    assert!(!logs[0].success);
    assert!(logs[0].error_message.as_deref().unwrap_or("").contains("connection refused"));
}

#[tokio::test]
async fn test_analyze_prose_wrapped_json() {
    let app = setup().await;
    app.transport
        .push_ok("好的，分析结果如下：\n{\"calories\": 105.0, \"protein\": 19.5, \"fat\": 3.0, \"carbs\": 0.5, \"recommendation\": \"高蛋白低脂肪\", \"allergens\": [\"fish\", \"SOY\", \"nonsense\"], \"allergen_reasoning\": \"鲈鱼属于鱼类过敏原\"}\n希望对你有帮助！");

    let result = app.state.nutrition_analyzer.analyze("清蒸鲈鱼").await;
    assert_eq!(result.calories, 105.0);
    assert_eq!(result.allergens, vec!["fish", "soy"]);
}

#[tokio::test]
async fn test_successful_call_logged_with_latency() {
    let app = setup().await;
    let user_id = create_user(&app, "latency_user").await;
    app.transport.push_ok(TOMATO_EGG_RESPONSE);

    app.state
        .nutrition_analyzer
        .analyze_for_user("番茄炒蛋", Some(user_id))
        .await;

    let stats = app.state.ai_log.log_stats(user_id).await.expect("stats");
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.success_rate, 1.0);
    assert_eq!(
        stats.call_type_distribution.get("food_analysis"),
        Some(&1i64)
    );
    assert_eq!(stats.recent_7days_count, 1);
}
