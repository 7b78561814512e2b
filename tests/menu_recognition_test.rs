// tests/menu_recognition_test.rs - Menu photo recognition pipeline

mod common;

use common::{create_user, setup};
use health_hub_ai::models::HealthGoal;

const IMAGE: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 1, 2, 3, 4];

#[tokio::test]
async fn test_recognize_preserves_input_order() {
    let app = setup().await;

    // Name extraction, then one nutrition analysis per dish. Analyses
    // run concurrently, so responses are keyed on the per-dish closing
    // instruction of the analysis prompt (the dish name alone would also
    // match the few-shot examples every prompt carries).
    app.transport
        .push_ok(r#"["宫保鸡丁", "清蒸鲈鱼", "麻婆豆腐"]"#);
    app.transport.push_keyed_ok(
        "现在请分析\"宫保鸡丁\"",
        r#"{"calories": 180.0, "protein": 18.0, "fat": 10.0, "carbs": 8.0,
            "recommendation": "适量", "allergens": ["peanut"], "allergen_reasoning": "含花生"}"#,
    );
    app.transport.push_keyed_ok(
        "现在请分析\"清蒸鲈鱼\"",
        r#"{"calories": 105.0, "protein": 19.5, "fat": 3.0, "carbs": 0.5,
            "recommendation": "推荐", "allergens": ["fish"], "allergen_reasoning": "鱼类"}"#,
    );
    app.transport.push_keyed_ok(
        "现在请分析\"麻婆豆腐\"",
        r#"{"calories": 130.0, "protein": 8.5, "fat": 8.0, "carbs": 5.5,
            "recommendation": "适量", "allergens": ["soy"], "allergen_reasoning": "豆制品"}"#,
    );

    let dishes = app
        .state
        .menu_analyzer
        .recognize(IMAGE, Some(HealthGoal::ReduceFat), None)
        .await
        .expect("recognition");

    assert_eq!(dishes.len(), 3);
    // Input order preserved regardless of analysis completion order
    let names: Vec<&str> = dishes.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["宫保鸡丁", "清蒸鲈鱼", "麻婆豆腐"]);

    // Reduce-fat rules: the fish dish qualifies (kcal<250, protein>15, fat<12)
    let fish = &dishes[1];
    assert!(fish.is_recommended);
}

#[tokio::test]
async fn test_single_dish_failure_yields_placeholder() {
    let app = setup().await;

    app.transport.push_ok(r#"["番茄炒蛋", "未知菜"]"#);
    app.transport.push_keyed_ok(
        "现在请分析\"番茄炒蛋\"",
        r#"{"calories": 150.0, "protein": 10.5, "fat": 8.2, "carbs": 6.3,
            "recommendation": "均衡", "allergens": ["egg"], "allergen_reasoning": "含蛋"}"#,
    );
    app.transport.push_keyed_err("现在请分析\"未知菜\"", "timeout");

    let dishes = app
        .state
        .menu_analyzer
        .recognize(IMAGE, None, None)
        .await
        .expect("recognition survives per-dish failure");

    assert_eq!(dishes.len(), 2);
    assert_eq!(dishes[0].calories, 150.0);
    // The failed dish degrades to a zero-nutrition placeholder
    assert_eq!(dishes[1].calories, 0.0);
    assert!(!dishes[1].is_recommended);
}

#[tokio::test]
async fn test_non_menu_image_returns_empty() {
    let app = setup().await;
    app.transport.push_ok("[]");

    let dishes = app
        .state
        .menu_analyzer
        .recognize(IMAGE, None, None)
        .await
        .expect("empty recognition");
    assert!(dishes.is_empty());
}

#[tokio::test]
async fn test_extraction_failure_propagates_upstream() {
    let app = setup().await;
    app.transport.push_err("vision model down");

    let result = app.state.menu_analyzer.recognize(IMAGE, None, None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_recognition_persisted_for_user() {
    let app = setup().await;
    let user_id = create_user(&app, "menu_user").await;

    app.transport.push_ok(r#"["蛋炒饭"]"#);
    app.transport.push_ok(
        r#"{"calories": 185.0, "protein": 5.5, "fat": 7.0, "carbs": 25.0,
            "recommendation": "适量", "allergens": ["egg"], "allergen_reasoning": "含蛋"}"#,
    );

    let dishes = app
        .state
        .menu_analyzer
        .recognize(IMAGE, None, Some(user_id))
        .await
        .expect("recognition");
    let dishes_json = serde_json::to_string(&dishes).expect("serialize");
    app.state
        .db
        .save_menu_recognition(user_id, &dishes_json)
        .await
        .expect("persist");

    let stored = app
        .state
        .db
        .latest_menu_recognition(Some(user_id))
        .await
        .expect("query")
        .expect("row exists");
    assert!(stored.contains("蛋炒饭"));
}
