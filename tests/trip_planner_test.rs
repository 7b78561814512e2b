// tests/trip_planner_test.rs - Two-stage plan generation and persistence

mod common;

use common::{create_user, setup, today};
use health_hub_ai::core::CoreError;
use health_hub_ai::models::*;

fn intent_json(destination: &str, days: i64) -> String {
    let start = today();
    format!(
        r#"{{"destination": "{destination}", "startDate": "{start}", "days": {days},
            "calories_target": 300, "exercise_type": "慢跑"}}"#
    )
}

fn plan_json() -> String {
    let start = today();
    format!(
        r#"{{
        "title": "傍晚慢跑计划",
        "destination": "北京奥林匹克公园",
        "startDate": "{start}",
        "endDate": "{start}",
        "items": [
            {{"dayIndex": 1, "startTime": "19:00", "placeName": "北京奥林匹克公园",
              "placeType": "running", "duration": 30, "cost": 280, "notes": "慢跑"}},
            {{"dayIndex": 1, "startTime": "20:00", "placeName": "北京奥林匹克公园",
              "placeType": "walking", "duration": 20, "cost": 80, "notes": "放松散步"}}
        ]
    }}"#
    )
}

#[tokio::test]
async fn test_generate_applies_post_processing() {
    let app = setup().await;
    let user_id = create_user(&app, "trip_user").await;

    app.transport.push_ok(&intent_json("北京奥林匹克公园", 1));
    app.transport.push_ok(&plan_json());

    let plan = app
        .state
        .trip_planner
        .generate(user_id, "晚餐后在北京慢跑", None, 800.0, None, Some(70.0))
        .await;

    assert_eq!(plan.items.len(), 2);
    // Duplicate place names were diversified
    assert_ne!(plan.items[0].place_name, plan.items[1].place_name);
    // Dinner keyword drives the start time: 19:00 base + 41 min offset
    assert_eq!(plan.items[0].start_time, "19:41");
    // Costs recomputed through METs with the calculation basis attached
    assert_eq!(plan.items[0].cost, 280.0); // running 8.0 x 70 x 0.5h
    assert_eq!(plan.items[1].cost, 81.7); // walking 3.5 x 70 x 20/60
    assert!(plan.items[0].calculation_basis.is_some());
    assert_eq!(plan.items[0].mets_value, Some(8.0));
}

#[tokio::test]
async fn test_generate_full_failure_yields_default_plan() {
    let app = setup().await;
    let user_id = create_user(&app, "fallback_user").await;

    app.transport.push_err("intent model down");
    app.transport.push_err("plan model down");

    let plan = app
        .state
        .trip_planner
        .generate(user_id, "随便走走", None, 0.0, None, None)
        .await;

    // Default plan: walking/running items, with the 200 kcal default
    // target redistributed by the METs pass
    assert!(!plan.items.is_empty());
    assert!(plan
        .items
        .iter()
        .all(|i| i.place_type == "walking" || i.place_type == "running"));
    assert_eq!(plan.start_date, today());
    assert!(plan.title.contains("餐后运动计划"));
}

#[tokio::test]
async fn test_generated_plan_persists_in_one_transaction() {
    let app = setup().await;
    let user_id = create_user(&app, "persist_user").await;

    app.transport.push_ok(&intent_json("北京朝阳公园", 1));
    app.transport.push_ok(&plan_json());

    let generated = app
        .state
        .trip_planner
        .generate(user_id, "在北京朝阳公园慢跑", None, 0.0, None, Some(70.0))
        .await;

    let (plan, items) = app
        .state
        .db
        .create_trip_plan(user_id, &generated, None)
        .await
        .expect("persist plan");
    assert_eq!(plan.user_id, user_id);
    assert_eq!(items.len(), generated.items.len());
    assert_eq!(plan.status, "planning");

    let stored = app
        .state
        .db
        .trip_items_of(plan.id)
        .await
        .expect("load items");
    assert_eq!(stored.len(), items.len());
}

#[tokio::test]
async fn test_day_index_outside_span_rejected() {
    let app = setup().await;
    let user_id = create_user(&app, "span_user").await;

    let start = today();
    let plan = GeneratedPlan {
        title: "单日计划".to_string(),
        destination: "公园".to_string(),
        start_date: start.clone(),
        end_date: start,
        travelers: vec!["本人".to_string()],
        items: vec![PlanItemData {
            day_index: 2, // outside a one-day span
            start_time: "19:00".to_string(),
            place_name: "公园".to_string(),
            place_type: "walking".to_string(),
            duration: 30,
            cost: 100.0,
            notes: String::new(),
            mets_value: None,
            calculation_basis: None,
        }],
    };

    let err = app
        .state
        .db
        .create_trip_plan(user_id, &plan, None)
        .await
        .expect_err("invalid day index");
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_exercise_record_validation_rules() {
    let app = setup().await;
    let user_id = create_user(&app, "record_user").await;

    let base = CreateExerciseRecordRequest {
        user_id,
        plan_id: None,
        exercise_type: "running".to_string(),
        actual_calories: 200.0,
        actual_duration: 30,
        distance: None,
        route_data: None,
        planned_calories: None,
        planned_duration: None,
        exercise_date: today(),
        started_at: None,
        ended_at: None,
        notes: None,
    };

    // Unknown exercise type
    let mut bad_type = base.clone();
    bad_type.exercise_type = "parkour".to_string();
    assert!(matches!(
        app.state.db.create_exercise_record(&bad_type).await,
        Err(CoreError::Validation(_))
    ));

    // End before start
    let mut bad_times = base.clone();
    bad_times.started_at = Some("2026-08-01T19:00:00".to_string());
    bad_times.ended_at = Some("2026-08-01T18:00:00".to_string());
    assert!(matches!(
        app.state.db.create_exercise_record(&bad_times).await,
        Err(CoreError::Validation(_))
    ));

    // Valid record, achievement rates derived from planned values
    let mut with_plan = base.clone();
    with_plan.planned_calories = Some(400.0);
    with_plan.planned_duration = Some(60);
    let record = app
        .state
        .db
        .create_exercise_record(&with_plan)
        .await
        .expect("valid record");
    let data = ExerciseRecordData::from_record(record);
    assert_eq!(data.calories_achievement, Some(50.0));
    assert_eq!(data.duration_achievement, Some(50.0));
}

#[tokio::test]
async fn test_linked_plan_ownership_and_copied_totals() {
    let app = setup().await;
    let owner = create_user(&app, "owner").await;
    let intruder = create_user(&app, "intruder").await;

    let start = today();
    let plan = GeneratedPlan {
        title: "散步计划".to_string(),
        destination: "公园".to_string(),
        start_date: start.clone(),
        end_date: start,
        travelers: vec!["本人".to_string()],
        items: vec![PlanItemData {
            day_index: 1,
            start_time: "19:00".to_string(),
            place_name: "公园".to_string(),
            place_type: "walking".to_string(),
            duration: 40,
            cost: 150.0,
            notes: String::new(),
            mets_value: None,
            calculation_basis: None,
        }],
    };
    let (stored_plan, _) = app
        .state
        .db
        .create_trip_plan(owner, &plan, None)
        .await
        .expect("plan");

    let request = CreateExerciseRecordRequest {
        user_id: owner,
        plan_id: Some(stored_plan.id),
        exercise_type: "walking".to_string(),
        actual_calories: 120.0,
        actual_duration: 35,
        distance: None,
        route_data: None,
        planned_calories: None,
        planned_duration: None,
        exercise_date: today(),
        started_at: None,
        ended_at: None,
        notes: None,
    };

    // Planned totals copied from the linked plan's items
    let record = app
        .state
        .db
        .create_exercise_record(&request)
        .await
        .expect("linked record");
    assert_eq!(record.planned_calories, Some(150.0));
    assert_eq!(record.planned_duration, Some(40));

    // Linking someone else's plan is a permission error
    let mut foreign = request.clone();
    foreign.user_id = intruder;
    assert!(matches!(
        app.state.db.create_exercise_record(&foreign).await,
        Err(CoreError::Permission(_))
    ));
}
