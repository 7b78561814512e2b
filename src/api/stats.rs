// src/api/stats.rs - Statistics endpoints

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::models::*;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub date: String,
}

pub async fn daily_calories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> ApiResult<DailyCalorieStats> {
    let stats = state.stats.daily_calories(query.user_id, &query.date).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub week_start: String,
}

pub async fn weekly_calories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeeklyQuery>,
) -> ApiResult<WeeklyCalorieStats> {
    let stats = state
        .stats
        .weekly_calories(query.user_id, &query.week_start)
        .await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub async fn daily_nutrients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> ApiResult<DailyNutrientStats> {
    let stats = state.stats.daily_nutrients(query.user_id, &query.date).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[derive(Debug, Deserialize)]
pub struct GoalProgressQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    7
}

pub async fn goal_progress(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GoalProgressQuery>,
) -> ApiResult<GoalProgressData> {
    let data = state
        .stats
        .goal_progress(query.user_id, query.days.clamp(1, 90))
        .await?;
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "week".to_string()
}

pub async fn exercise_frequency(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FrequencyQuery>,
) -> ApiResult<ExerciseFrequencyData> {
    let data = state
        .stats
        .exercise_frequency(query.user_id, &query.period)
        .await?;
    Ok(Json(ApiResponse::ok(data)))
}
