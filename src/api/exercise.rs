// src/api/exercise.rs - Trip plan and exercise record handlers

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::core::CoreError;
use crate::models::*;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct TripPlanData {
    pub plan: TripPlan,
    pub items: Vec<TripItem>,
}

/// Generate and persist an exercise plan. The plan plus its items are
/// written in one transaction; any failure rolls both back.
pub async fn generate_trip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GeneratePlanRequest>,
) -> ApiResult<TripPlanData> {
    if request.query.trim().is_empty() {
        return Err(CoreError::validation("query must not be empty").into());
    }
    let user = state
        .db
        .get_user(request.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("user {} does not exist", request.user_id)))?;

    let calories_intake = state.db.today_intake(request.user_id).await?;
    let generated = state
        .trip_planner
        .generate(
            request.user_id,
            &request.query,
            request.preferences.as_ref(),
            calories_intake,
            request.location,
            user.weight,
        )
        .await;

    let (plan, items) = state
        .db
        .create_trip_plan(request.user_id, &generated, request.location)
        .await?;
    Ok(Json(ApiResponse::ok_with_message("生成成功", TripPlanData { plan, items })))
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
}

pub async fn list_trips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Vec<TripPlan>> {
    let plans = state.db.list_trip_plans(query.user_id, 100).await?;
    Ok(Json(ApiResponse::ok(plans)))
}

pub async fn recent_trips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Vec<TripPlan>> {
    let plans = state.db.list_trip_plans(query.user_id, 10).await?;
    Ok(Json(ApiResponse::ok(plans)))
}

/// Home view: the few most recent plans with their items attached
pub async fn home_trips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Vec<TripPlanData>> {
    let plans = state.db.list_trip_plans(query.user_id, 3).await?;
    let mut data = Vec::with_capacity(plans.len());
    for plan in plans {
        let items = state.db.trip_items_of(plan.id).await?;
        data.push(TripPlanData { plan, items });
    }
    Ok(Json(ApiResponse::ok(data)))
}

pub async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<i64>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<TripPlanData> {
    let plan = state
        .db
        .get_trip_plan(trip_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("trip plan {trip_id} does not exist")))?;
    if plan.user_id != query.user_id {
        return Err(CoreError::permission("only the owner may view this plan").into());
    }
    let items = state.db.trip_items_of(trip_id).await?;
    Ok(Json(ApiResponse::ok(TripPlanData { plan, items })))
}

pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateExerciseRecordRequest>,
) -> ApiResult<ExerciseRecordData> {
    let record = state.db.create_exercise_record(&request).await?;
    Ok(Json(ApiResponse::ok_with_message(
        "运动记录添加成功",
        ExerciseRecordData::from_record(record),
    )))
}

#[derive(Debug, Deserialize)]
pub struct ListRecordsQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub exercise_date: Option<String>,
    pub exercise_type: Option<String>,
    pub plan_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct RecordListData {
    pub records: Vec<ExerciseRecordData>,
    pub total: i64,
}

pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRecordsQuery>,
) -> ApiResult<RecordListData> {
    if let Some(exercise_type) = &query.exercise_type {
        if !is_valid_exercise_type(exercise_type) {
            return Err(
                CoreError::validation(format!("unsupported exercise type: {exercise_type}")).into(),
            );
        }
    }
    if let Some(date) = &query.exercise_date {
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| CoreError::validation("invalid exercise_date, expected YYYY-MM-DD"))?;
    }

    let (total, records) = state
        .db
        .list_exercise_records(
            query.user_id,
            query.exercise_date.as_deref(),
            query.exercise_type.as_deref(),
            query.plan_id,
            query.limit.clamp(1, 200),
            query.offset.max(0),
        )
        .await?;

    Ok(Json(ApiResponse::ok(RecordListData {
        records: records.into_iter().map(ExerciseRecordData::from_record).collect(),
        total,
    })))
}

pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i64>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<ExerciseRecordData> {
    let record = state
        .db
        .get_exercise_record(record_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("exercise record {record_id} does not exist")))?;
    if record.user_id != query.user_id {
        return Err(CoreError::permission("only the owner may view this record").into());
    }
    Ok(Json(ApiResponse::ok(ExerciseRecordData::from_record(record))))
}

pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i64>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<()> {
    state.db.delete_exercise_record(record_id, query.user_id).await?;
    Ok(Json(ApiResponse::ok_with_message("删除成功", ())))
}
