// src/models/stats.rs - Statistics payload types and dietary constants

use serde::Serialize;
use std::collections::BTreeMap;

pub const PROTEIN_KCAL_PER_GRAM: f64 = 4.0;
pub const FAT_KCAL_PER_GRAM: f64 = 9.0;
pub const CARBS_KCAL_PER_GRAM: f64 = 4.0;

/// Recommended energy share per macronutrient (percent of nutrient kcal),
/// per the Chinese dietary guidelines.
#[derive(Debug, Clone, Copy)]
pub struct GuidelineBand {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

pub const PROTEIN_GUIDELINE: GuidelineBand = GuidelineBand {
    name: "蛋白质",
    min: 10.0,
    max: 15.0,
};
pub const FAT_GUIDELINE: GuidelineBand = GuidelineBand {
    name: "脂肪",
    min: 20.0,
    max: 30.0,
};
pub const CARBS_GUIDELINE: GuidelineBand = GuidelineBand {
    name: "碳水化合物",
    min: 50.0,
    max: 65.0,
};

#[derive(Debug, Clone, Serialize)]
pub struct DailyCalorieStats {
    pub date: String,
    pub user_id: i64,
    pub intake_calories: f64,
    pub meal_count: i64,
    pub burn_calories: f64,
    pub exercise_count: i64,
    pub exercise_duration: i64,
    pub planned_burn_calories: f64,
    pub actual_burn_calories: f64,
    pub actual_exercise_count: i64,
    pub actual_exercise_duration: i64,
    pub net_calories: f64,
    pub calorie_deficit: f64,
    pub goal_achievement_rate: Option<f64>,
    pub meal_breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBreakdown {
    pub date: String,
    pub intake_calories: f64,
    pub burn_calories: f64,
    pub net_calories: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyCalorieStats {
    pub week_start: String,
    pub week_end: String,
    pub user_id: i64,
    pub total_intake: f64,
    pub total_burn: f64,
    pub total_net: f64,
    pub avg_intake: f64,
    pub avg_burn: f64,
    pub avg_net: f64,
    pub total_meals: i64,
    pub total_exercises: i64,
    pub active_days: i64,
    pub daily_breakdown: Vec<DailyBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutrientComparison {
    pub actual_ratio: f64,
    pub recommended_min: f64,
    pub recommended_max: f64,
    /// low / normal / high
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidelinesComparison {
    pub protein: NutrientComparison,
    pub fat: NutrientComparison,
    pub carbs: NutrientComparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyNutrientStats {
    pub date: String,
    pub user_id: i64,
    pub total_protein: f64,
    pub total_fat: f64,
    pub total_carbs: f64,
    pub total_calories: f64,
    pub protein_calories: f64,
    pub fat_calories: f64,
    pub carbs_calories: f64,
    pub protein_ratio: f64,
    pub fat_ratio: f64,
    pub carbs_ratio: f64,
    pub meal_count: i64,
    pub guidelines_comparison: GuidelinesComparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalDimension {
    pub name: String,
    pub score: f64,
    /// excellent / good / fair / poor
    pub status: String,
    pub current_value: f64,
    pub target_value: f64,
    pub unit: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalProgressData {
    pub user_id: i64,
    pub health_goal: String,
    pub health_goal_label: String,
    pub period_days: i64,
    pub start_date: String,
    pub end_date: String,
    pub overall_score: f64,
    pub overall_status: String,
    pub dimensions: Vec<GoalDimension>,
    pub suggestions: Vec<String>,
    pub streak_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyExerciseFrequency {
    pub date: String,
    pub count: i64,
    pub total_duration: i64,
    pub total_calories: f64,
    pub exercise_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseTypeDistribution {
    pub exercise_type: String,
    pub label: String,
    pub count: i64,
    pub total_duration: i64,
    pub total_calories: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseFrequencyData {
    pub user_id: i64,
    pub period: String,
    pub period_label: String,
    pub start_date: String,
    pub end_date: String,
    pub total_days: i64,
    pub active_days: i64,
    pub total_exercise_count: i64,
    pub total_duration: i64,
    pub total_calories: f64,
    pub avg_frequency: f64,
    pub avg_duration_per_session: f64,
    pub avg_calories_per_session: f64,
    pub daily_data: Vec<DailyExerciseFrequency>,
    pub type_distribution: Vec<ExerciseTypeDistribution>,
    /// excellent / good / fair / insufficient
    pub frequency_rating: String,
    pub frequency_suggestion: String,
}

/// Display labels for the canonical exercise types
pub fn exercise_type_label(exercise_type: &str) -> &str {
    match exercise_type {
        "walking" => "步行",
        "running" => "跑步",
        "cycling" => "骑行",
        "jogging" => "慢跑",
        "hiking" => "徒步",
        "swimming" => "游泳",
        "gym" => "健身房",
        "indoor" => "室内运动",
        "outdoor" => "户外运动",
        other => other,
    }
}
