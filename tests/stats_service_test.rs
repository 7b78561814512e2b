// tests/stats_service_test.rs - Energy balance, nutrients, goal progress
// and exercise frequency

mod common;

use common::{create_user, days_ago, setup, today, TestApp};
use health_hub_ai::models::*;

async fn add_diet(
    app: &TestApp,
    user_id: i64,
    food_name: &str,
    calories: f64,
    protein: f64,
    fat: f64,
    carbs: f64,
    meal_type: &str,
    date: &str,
) {
    app.state
        .db
        .add_diet_record(&AddDietRecordRequest {
            user_id,
            food_name: food_name.to_string(),
            calories,
            protein: Some(protein),
            fat: Some(fat),
            carbs: Some(carbs),
            meal_type: meal_type.to_string(),
            record_date: date.to_string(),
        })
        .await
        .expect("add diet record");
}

async fn add_exercise(app: &TestApp, user_id: i64, exercise_type: &str, calories: f64, duration: i64, date: &str) {
    app.state
        .db
        .create_exercise_record(&CreateExerciseRecordRequest {
            user_id,
            plan_id: None,
            exercise_type: exercise_type.to_string(),
            actual_calories: calories,
            actual_duration: duration,
            distance: None,
            route_data: None,
            planned_calories: None,
            planned_duration: None,
            exercise_date: date.to_string(),
            started_at: None,
            ended_at: None,
            notes: None,
        })
        .await
        .expect("add exercise record");
}

async fn add_plan_covering(app: &TestApp, user_id: i64, date: &str, cost: f64, duration: i64) {
    let plan = GeneratedPlan {
        title: "餐后散步计划".to_string(),
        destination: "社区公园".to_string(),
        start_date: date.to_string(),
        end_date: date.to_string(),
        travelers: vec!["本人".to_string()],
        items: vec![PlanItemData {
            day_index: 1,
            start_time: "19:30".to_string(),
            place_name: "社区公园".to_string(),
            place_type: "walking".to_string(),
            duration,
            cost,
            notes: String::new(),
            mets_value: None,
            calculation_basis: None,
        }],
    };
    app.state
        .db
        .create_trip_plan(user_id, &plan, None)
        .await
        .expect("create plan");
}

#[tokio::test]
async fn test_daily_stats_planned_burn_used_without_records() {
    let app = setup().await;
    let user_id = create_user(&app, "daily_user").await;
    let date = today();

    // Four meals totaling 1300 kcal
    add_diet(&app, user_id, "燕麦牛奶", 300.0, 10.0, 8.0, 40.0, "早餐", &date).await;
    add_diet(&app, user_id, "青椒肉丝", 400.0, 20.0, 15.0, 30.0, "lunch", &date).await;
    add_diet(&app, user_id, "清蒸鲈鱼", 400.0, 30.0, 10.0, 20.0, "dinner", &date).await;
    add_diet(&app, user_id, "酸奶", 200.0, 5.0, 5.0, 20.0, "snack", &date).await;

    // One plan covering the day, nothing actually done
    add_plan_covering(&app, user_id, &date, 300.0, 40).await;

    let stats = app
        .state
        .stats
        .daily_calories(user_id, &date)
        .await
        .expect("daily stats");

    assert_eq!(stats.intake_calories, 1300.0);
    assert_eq!(stats.meal_count, 4);
    assert_eq!(stats.planned_burn_calories, 300.0);
    assert_eq!(stats.actual_burn_calories, 0.0);
    // No exercise records: planned burn is the effective burn
    assert_eq!(stats.burn_calories, 300.0);
    assert_eq!(stats.net_calories, 1000.0);
    assert_eq!(stats.calorie_deficit, 1000.0);
    // A plan exists but nothing was done
    assert_eq!(stats.goal_achievement_rate, Some(0.0));
    // Chinese meal slot mapped onto the canonical key
    assert_eq!(stats.meal_breakdown.get("breakfast"), Some(&300.0));
}

#[tokio::test]
async fn test_daily_stats_actual_burn_wins() {
    let app = setup().await;
    let user_id = create_user(&app, "actual_user").await;
    let date = today();

    add_diet(&app, user_id, "牛肉面", 500.0, 20.0, 8.0, 50.0, "lunch", &date).await;
    add_plan_covering(&app, user_id, &date, 300.0, 40).await;
    add_exercise(&app, user_id, "running", 250.0, 30, &date).await;

    let stats = app
        .state
        .stats
        .daily_calories(user_id, &date)
        .await
        .expect("daily stats");
    assert_eq!(stats.burn_calories, 250.0);
    assert_eq!(stats.net_calories, 250.0);
    // actual/planned x 100
    assert_eq!(stats.goal_achievement_rate, Some(round1(250.0 / 300.0 * 100.0)));
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[tokio::test]
async fn test_daily_stats_no_plan_no_rate() {
    let app = setup().await;
    let user_id = create_user(&app, "norate_user").await;
    let date = today();
    add_diet(&app, user_id, "苹果", 52.0, 0.3, 0.2, 13.0, "snack", &date).await;

    let stats = app
        .state
        .stats
        .daily_calories(user_id, &date)
        .await
        .expect("daily stats");
    assert_eq!(stats.goal_achievement_rate, None);
}

#[tokio::test]
async fn test_weekly_stats_invariants() {
    let app = setup().await;
    let user_id = create_user(&app, "weekly_user").await;
    let start = days_ago(6);

    add_diet(&app, user_id, "番茄炒蛋", 300.0, 10.0, 8.0, 6.0, "lunch", &days_ago(6)).await;
    add_diet(&app, user_id, "清蒸鲈鱼", 200.0, 19.0, 3.0, 1.0, "dinner", &days_ago(4)).await;
    add_exercise(&app, user_id, "walking", 150.0, 40, &days_ago(4)).await;
    add_exercise(&app, user_id, "running", 280.0, 30, &today()).await;

    let stats = app
        .state
        .stats
        .weekly_calories(user_id, &start)
        .await
        .expect("weekly stats");

    // Exactly seven entries, each net = intake - burn
    assert_eq!(stats.daily_breakdown.len(), 7);
    for day in &stats.daily_breakdown {
        assert!((day.net_calories - (day.intake_calories - day.burn_calories)).abs() < 0.01);
    }
    // Two active days: day-6 and day-4 have diet records. Today has only
    // a logged exercise record and no plan coverage, which the weekly
    // divisor does not count as active (its burn still contributes).
    assert_eq!(stats.active_days, 2);
    assert_eq!(stats.total_intake, 500.0);
    assert_eq!(stats.total_burn, 430.0);
    assert!((stats.avg_intake - 500.0 / 2.0).abs() < 0.01);
}

#[tokio::test]
async fn test_daily_nutrients_ratios_sum_to_hundred() {
    let app = setup().await;
    let user_id = create_user(&app, "nutrient_user").await;
    let date = today();
    add_diet(&app, user_id, "鸡胸肉沙拉", 240.0, 44.0, 6.0, 8.0, "lunch", &date).await;
    add_diet(&app, user_id, "米饭", 232.0, 5.2, 0.6, 51.8, "lunch", &date).await;

    let stats = app
        .state
        .stats
        .daily_nutrients(user_id, &date)
        .await
        .expect("nutrient stats");

    assert!(stats.total_calories > 0.0);
    let ratio_sum = stats.protein_ratio + stats.fat_ratio + stats.carbs_ratio;
    assert!((ratio_sum - 100.0).abs() < 0.05, "ratio sum {ratio_sum}");

    // kcal-per-gram conversions
    assert!((stats.protein_calories - stats.total_protein * 4.0).abs() < 0.01);
    assert!((stats.fat_calories - stats.total_fat * 9.0).abs() < 0.01);
    assert!((stats.carbs_calories - stats.total_carbs * 4.0).abs() < 0.01);
}

#[tokio::test]
async fn test_daily_nutrients_empty_day_reports_low() {
    let app = setup().await;
    let user_id = create_user(&app, "empty_user").await;

    let stats = app
        .state
        .stats
        .daily_nutrients(user_id, &today())
        .await
        .expect("nutrient stats");
    assert_eq!(stats.guidelines_comparison.protein.status, "low");
    assert_eq!(stats.guidelines_comparison.fat.status, "low");
    assert_eq!(stats.guidelines_comparison.carbs.status, "low");
    assert_eq!(stats.guidelines_comparison.protein.message, "暂无数据");
}

#[tokio::test]
async fn test_goal_progress_overall_is_mean_of_dimensions() {
    let app = setup().await;
    let user_id = create_user(&app, "goal_user").await;
    app.state
        .db
        .update_preferences(
            user_id,
            &UpdatePreferencesRequest {
                health_goal: Some("reduce_fat".to_string()),
                weight: Some(80.0),
                height: Some(178.0),
                age: Some(28),
                gender: Some("male".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("set preferences");

    for i in 0..3 {
        add_diet(&app, user_id, "鸡胸肉沙拉", 1500.0, 90.0, 40.0, 150.0, "lunch", &days_ago(i)).await;
        add_exercise(&app, user_id, "running", 280.0, 30, &days_ago(i)).await;
    }

    let progress = app
        .state
        .stats
        .goal_progress(user_id, 7)
        .await
        .expect("goal progress");

    assert_eq!(progress.health_goal, "reduce_fat");
    assert_eq!(progress.dimensions.len(), 3);
    for dim in &progress.dimensions {
        assert!((0.0..=100.0).contains(&dim.score), "{dim:?}");
    }
    let mean =
        progress.dimensions.iter().map(|d| d.score).sum::<f64>() / progress.dimensions.len() as f64;
    assert!((progress.overall_score - round1(mean)).abs() < 0.11);
    // Three consecutive active days ending today
    assert_eq!(progress.streak_days, 3);
}

#[tokio::test]
async fn test_goal_progress_defaults_to_balanced() {
    let app = setup().await;
    let user_id = create_user(&app, "balanced_user").await;

    let progress = app
        .state
        .stats
        .goal_progress(user_id, 7)
        .await
        .expect("goal progress");
    assert_eq!(progress.health_goal, "balanced");
    let names: Vec<&str> = progress.dimensions.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"营养均衡"));
    assert!(names.contains(&"运动规律"));
    assert!(names.contains(&"饮食规律"));
}

#[tokio::test]
async fn test_exercise_frequency_week_invariants() {
    let app = setup().await;
    let user_id = create_user(&app, "freq_user").await;

    add_exercise(&app, user_id, "running", 280.0, 30, &today()).await;
    add_exercise(&app, user_id, "running", 250.0, 25, &days_ago(1)).await;
    add_exercise(&app, user_id, "walking", 120.0, 40, &days_ago(1)).await;
    add_exercise(&app, user_id, "swimming", 300.0, 45, &days_ago(3)).await;

    let data = app
        .state
        .stats
        .exercise_frequency(user_id, "week")
        .await
        .expect("frequency data");

    assert_eq!(data.total_days, 7);
    assert_eq!(data.daily_data.len(), 7);
    assert_eq!(data.active_days, 3);
    assert_eq!(data.total_exercise_count, 4);

    // Sum of the daily series equals the total count (zero-filled days)
    let daily_sum: i64 = data.daily_data.iter().map(|d| d.count).sum();
    assert_eq!(daily_sum, data.total_exercise_count);

    // Sum over the type distribution equals the total as well
    let type_sum: i64 = data.type_distribution.iter().map(|t| t.count).sum();
    assert_eq!(type_sum, data.total_exercise_count);

    // Percentages sum to ~100
    let pct_sum: f64 = data.type_distribution.iter().map(|t| t.percentage).sum();
    assert!((pct_sum - 100.0).abs() < 0.5, "percentage sum {pct_sum}");

    // Sorted descending by count, running first
    assert_eq!(data.type_distribution[0].exercise_type, "running");
    assert_eq!(data.type_distribution[0].count, 2);

    // 3 active days in a week rates as good
    assert_eq!(data.frequency_rating, "good");
}

#[tokio::test]
async fn test_exercise_frequency_empty_is_insufficient() {
    let app = setup().await;
    let user_id = create_user(&app, "idle_user").await;

    let data = app
        .state
        .stats
        .exercise_frequency(user_id, "month")
        .await
        .expect("frequency data");
    assert_eq!(data.total_days, 30);
    assert_eq!(data.daily_data.len(), 30);
    assert_eq!(data.active_days, 0);
    assert_eq!(data.frequency_rating, "insufficient");
}
