// src/models/exercise.rs - Exercise plan, trip item and exercise record types

use serde::{Deserialize, Serialize};

/// Closed set of exercise-type tags accepted on exercise records
pub const VALID_EXERCISE_TYPES: [&str; 9] = [
    "walking", "running", "cycling", "jogging", "hiking", "swimming", "gym", "indoor", "outdoor",
];

pub fn is_valid_exercise_type(exercise_type: &str) -> bool {
    VALID_EXERCISE_TYPES.contains(&exercise_type)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPlan {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub destination: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    pub travelers: Vec<String>,
    /// planning / ongoing / done
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripItem {
    pub id: i64,
    pub trip_id: i64,
    pub day_index: i64,
    pub start_time: String,
    pub place_name: String,
    /// walking/running/cycling/park/gym/indoor/outdoor
    pub place_type: String,
    pub duration: i64,
    /// Estimated calorie cost (kcal)
    pub cost: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: String,
    pub sort_order: i64,
}

/// Normalized stage-1 output of the plan generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseIntent {
    pub destination: String,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    pub days: i64,
    pub calories_target: i64,
    pub exercise_type: Option<String>,
}

/// One generated plan item before persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemData {
    #[serde(rename = "dayIndex")]
    pub day_index: i64,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "placeName")]
    pub place_name: String,
    #[serde(rename = "placeType")]
    pub place_type: String,
    pub duration: i64,
    /// Estimated calorie cost (kcal)
    pub cost: f64,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mets_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_basis: Option<String>,
}

/// Full generated plan returned by the two-stage generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub title: String,
    pub destination: String,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    #[serde(default = "default_travelers")]
    pub travelers: Vec<String>,
    pub items: Vec<PlanItemData>,
}

fn default_travelers() -> Vec<String> {
    vec!["本人".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePlanRequest {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub query: String,
    #[serde(default)]
    pub preferences: Option<serde_json::Value>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub exercise_type: String,
    pub actual_calories: f64,
    pub actual_duration: i64,
    pub distance: Option<f64>,
    pub route_data: Option<String>,
    pub planned_calories: Option<f64>,
    pub planned_duration: Option<i64>,
    pub exercise_date: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Wire form of an exercise record, with the derived achievement rates
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseRecordData {
    #[serde(flatten)]
    pub record: ExerciseRecord,
    pub calories_achievement: Option<f64>,
    pub duration_achievement: Option<f64>,
}

impl ExerciseRecordData {
    /// Achievement rates are derived (actual/planned × 100), never stored.
    pub fn from_record(record: ExerciseRecord) -> Self {
        let calories_achievement = record
            .planned_calories
            .filter(|p| *p > 0.0)
            .map(|p| round1(record.actual_calories / p * 100.0));
        let duration_achievement = record
            .planned_duration
            .filter(|p| *p > 0)
            .map(|p| round1(record.actual_duration as f64 / p as f64 * 100.0));
        Self {
            record,
            calories_achievement,
            duration_achievement,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExerciseRecordRequest {
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub exercise_type: String,
    pub actual_calories: f64,
    pub actual_duration: i64,
    pub distance: Option<f64>,
    pub route_data: Option<String>,
    pub planned_calories: Option<f64>,
    pub planned_duration: Option<i64>,
    pub exercise_date: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub notes: Option<String>,
}
