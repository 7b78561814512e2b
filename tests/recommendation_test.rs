// tests/recommendation_test.rs - Multi-factor dish recommendation

mod common;

use common::{create_user, setup, today, TestApp};
use health_hub_ai::core::CoreError;
use health_hub_ai::models::*;

async fn set_goal_and_allergens(app: &TestApp, user_id: i64, goal: &str, allergens: Vec<String>) {
    app.state
        .db
        .update_preferences(
            user_id,
            &UpdatePreferencesRequest {
                health_goal: Some(goal.to_string()),
                allergens: Some(allergens),
                weight: Some(70.0),
                height: Some(175.0),
                age: Some(30),
                gender: Some("male".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("preferences");
}

#[tokio::test]
async fn test_allergen_candidates_are_filtered() {
    let app = setup().await;
    let user_id = create_user(&app, "allergy_user").await;
    // Free-text Chinese tokens normalize onto the canonical codes
    set_goal_and_allergens(
        &app,
        user_id,
        "balanced",
        vec!["鸡蛋".to_string(), "海鲜".to_string()],
    )
    .await;

    let data = app
        .state
        .recommend
        .recommend(user_id, "lunch", 20)
        .await
        .expect("recommendations");

    for food in &data.recommendations {
        assert_ne!(food.food_name, "番茄炒蛋", "egg dish must be filtered");
        assert_ne!(food.food_name, "白灼虾", "shellfish dish must be filtered");
        assert_ne!(food.food_name, "蒸蛋羹");
    }
    assert!(!data.recommendations.is_empty());
}

#[tokio::test]
async fn test_tree_nut_allergy_filters_snack_platter() {
    let app = setup().await;
    let user_id = create_user(&app, "nut_user").await;
    set_goal_and_allergens(&app, user_id, "balanced", vec![]).await;

    let snacks = app
        .state
        .recommend
        .recommend(user_id, "snack", 20)
        .await
        .expect("snack recommendations");
    assert!(snacks
        .recommendations
        .iter()
        .any(|f| f.food_name == "坚果拼盘"));

    set_goal_and_allergens(&app, user_id, "balanced", vec!["坚果".to_string()]).await;
    let filtered = app
        .state
        .recommend
        .recommend(user_id, "snack", 20)
        .await
        .expect("filtered snack recommendations");
    assert!(filtered
        .recommendations
        .iter()
        .all(|f| f.food_name != "坚果拼盘"));
    assert!(!filtered.recommendations.is_empty());
}

#[tokio::test]
async fn test_scores_sorted_and_bounded() {
    let app = setup().await;
    let user_id = create_user(&app, "score_user").await;
    set_goal_and_allergens(&app, user_id, "reduce_fat", vec![]).await;

    let data = app
        .state
        .recommend
        .recommend(user_id, "lunch", 5)
        .await
        .expect("recommendations");

    assert!(data.recommendations.len() <= 5);
    for pair in data.recommendations.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for food in &data.recommendations {
        assert!((0.0..=100.0).contains(&food.score));
        assert!(!food.reason.is_empty());
    }
    assert_eq!(data.health_goal, "reduce_fat");
    assert!(data.daily_calorie_target > 0.0);
}

#[tokio::test]
async fn test_meal_slot_filtering() {
    let app = setup().await;
    let user_id = create_user(&app, "slot_user").await;
    set_goal_and_allergens(&app, user_id, "balanced", vec![]).await;

    let breakfast = app
        .state
        .recommend
        .recommend(user_id, "早餐", 20)
        .await
        .expect("breakfast recommendations");
    assert_eq!(breakfast.meal_type, "breakfast");
    for food in &breakfast.recommendations {
        // Lunch-only dishes never appear at breakfast
        assert_ne!(food.food_name, "清蒸鲈鱼");
    }
    assert!(breakfast
        .recommendations
        .iter()
        .any(|f| f.food_name == "小米粥" || f.food_name == "水煮蛋"));
}

#[tokio::test]
async fn test_today_eaten_dishes_lose_variety_points() {
    let app = setup().await;
    let user_id = create_user(&app, "variety_user").await;
    set_goal_and_allergens(&app, user_id, "balanced", vec![]).await;

    let before = app
        .state
        .recommend
        .recommend(user_id, "lunch", 20)
        .await
        .expect("before");
    let fish_before = before
        .recommendations
        .iter()
        .find(|f| f.food_name == "清蒸鲈鱼")
        .expect("fish recommended")
        .score;

    app.state
        .db
        .add_diet_record(&AddDietRecordRequest {
            user_id,
            food_name: "清蒸鲈鱼".to_string(),
            calories: 105.0,
            protein: Some(19.5),
            fat: Some(3.0),
            carbs: Some(0.5),
            meal_type: "lunch".to_string(),
            record_date: today(),
        })
        .await
        .expect("diet record");

    let after = app
        .state
        .recommend
        .recommend(user_id, "lunch", 20)
        .await
        .expect("after");
    let fish_after = after
        .recommendations
        .iter()
        .find(|f| f.food_name == "清蒸鲈鱼")
        .expect("fish still listed")
        .score;

    // Eating it today costs the 15 variety points, partially offset by
    // the new history-preference bonus.
    assert!(fish_after < fish_before, "{fish_after} vs {fish_before}");
}

#[tokio::test]
async fn test_unknown_user_not_found() {
    let app = setup().await;
    let err = app
        .state
        .recommend
        .recommend(424242, "lunch", 5)
        .await
        .expect_err("unknown user");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_remaining_quota_reflects_today_intake() {
    let app = setup().await;
    let user_id = create_user(&app, "quota_user").await;
    set_goal_and_allergens(&app, user_id, "balanced", vec![]).await;

    let before = app
        .state
        .recommend
        .recommend(user_id, "dinner", 5)
        .await
        .expect("before intake");

    app.state
        .db
        .add_diet_record(&AddDietRecordRequest {
            user_id,
            food_name: "牛肉面".to_string(),
            calories: 900.0,
            protein: Some(40.0),
            fat: Some(16.0),
            carbs: Some(100.0),
            meal_type: "lunch".to_string(),
            record_date: today(),
        })
        .await
        .expect("diet record");

    let after = app
        .state
        .recommend
        .recommend(user_id, "dinner", 5)
        .await
        .expect("after intake");

    assert!((before.remaining_calories - after.remaining_calories - 900.0).abs() < 0.01);
}
