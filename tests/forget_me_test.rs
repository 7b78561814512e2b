// tests/forget_me_test.rs - Full data deletion

mod common;

use common::{create_user, setup, today, TestApp};
use health_hub_ai::core::CoreError;
use health_hub_ai::models::*;

async fn seed_user_data(app: &TestApp, user_id: i64) {
    for food in ["番茄炒蛋", "清蒸鲈鱼", "米饭"] {
        app.state
            .db
            .add_diet_record(&AddDietRecordRequest {
                user_id,
                food_name: food.to_string(),
                calories: 150.0,
                protein: Some(10.0),
                fat: Some(5.0),
                carbs: Some(12.0),
                meal_type: "lunch".to_string(),
                record_date: today(),
            })
            .await
            .expect("diet record");
    }

    for _ in 0..2 {
        app.state
            .db
            .create_exercise_record(&CreateExerciseRecordRequest {
                user_id,
                plan_id: None,
                exercise_type: "walking".to_string(),
                actual_calories: 120.0,
                actual_duration: 30,
                distance: None,
                route_data: None,
                planned_calories: None,
                planned_duration: None,
                exercise_date: today(),
                started_at: None,
                ended_at: None,
                notes: None,
            })
            .await
            .expect("exercise record");
    }

    let features = BeforeFeatures {
        dishes: vec![],
        total_estimated_calories: 400.0,
        total_estimated_protein: 20.0,
        total_estimated_fat: 15.0,
        total_estimated_carbs: 30.0,
    };
    app.state
        .db
        .create_meal_comparison(user_id, "/uploads/meal/x.png", "{}", &features)
        .await
        .expect("meal comparison");

    let plan = GeneratedPlan {
        title: "散步计划".to_string(),
        destination: "公园".to_string(),
        start_date: today(),
        end_date: today(),
        travelers: vec!["本人".to_string()],
        items: vec![PlanItemData {
            day_index: 1,
            start_time: "19:00".to_string(),
            place_name: "公园".to_string(),
            place_type: "walking".to_string(),
            duration: 30,
            cost: 120.0,
            notes: String::new(),
            mets_value: None,
            calculation_basis: None,
        }],
    };
    app.state
        .db
        .create_trip_plan(user_id, &plan, None)
        .await
        .expect("trip plan");

    app.state
        .db
        .save_menu_recognition(user_id, "[]")
        .await
        .expect("menu recognition");
}

#[tokio::test]
async fn test_forget_me_deletes_everything() {
    let app = setup().await;
    let user_id = create_user(&app, "forget_user").await;
    seed_user_data(&app, user_id).await;

    let (deleted, total) = app.state.db.forget_me(user_id).await.expect("forget me");

    assert_eq!(deleted.get("diet_records"), Some(&3));
    assert_eq!(deleted.get("exercise_records"), Some(&2));
    assert_eq!(deleted.get("meal_comparisons"), Some(&1));
    assert_eq!(deleted.get("trip_plans"), Some(&1));
    assert_eq!(deleted.get("trip_items"), Some(&1));
    assert_eq!(deleted.get("menu_recognitions"), Some(&1));
    assert_eq!(deleted.get("user"), Some(&1));
    assert!(total >= 7);

    // Every dependent table queried by the deleted user is empty
    assert!(app.state.db.get_user(user_id).await.unwrap().is_none());
    assert!(app
        .state
        .db
        .diet_records_on(user_id, &today())
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .db
        .exercise_records_on(user_id, &today())
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .db
        .list_trip_plans(user_id, 10)
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .db
        .latest_menu_recognition(Some(user_id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_forget_me_second_call_not_found() {
    let app = setup().await;
    let user_id = create_user(&app, "twice_user").await;

    app.state.db.forget_me(user_id).await.expect("first call");
    let err = app
        .state
        .db
        .forget_me(user_id)
        .await
        .expect_err("second call must fail");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_forget_me_leaves_other_users_alone() {
    let app = setup().await;
    let victim = create_user(&app, "victim").await;
    let bystander = create_user(&app, "bystander").await;
    seed_user_data(&app, victim).await;
    seed_user_data(&app, bystander).await;

    app.state.db.forget_me(victim).await.expect("forget victim");

    assert!(app.state.db.get_user(bystander).await.unwrap().is_some());
    assert_eq!(
        app.state
            .db
            .diet_records_on(bystander, &today())
            .await
            .unwrap()
            .len(),
        3
    );
}
