// src/models/food.rs - Food analysis, diet record and recommendation types

use serde::{Deserialize, Serialize};

/// Calorie/fat profile of a dish under an alternative cooking method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookingMethodComparison {
    pub method: String,
    pub calories: f64,
    pub fat: f64,
    pub description: String,
}

/// Result of a single-dish nutrition analysis (per 100 g)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionResult {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub recommendation: String,
    /// Canonical allergen codes inferred by the model (filtered to the
    /// eight-class set)
    pub allergens: Vec<String>,
    pub allergen_reasoning: String,
    pub cooking_method_comparisons: Vec<CookingMethodComparison>,
}

impl NutritionResult {
    /// Default payload returned when the model is unavailable or its
    /// output cannot be parsed. Analyzers never propagate those errors.
    pub fn fallback(food_name: &str) -> Self {
        Self {
            name: food_name.to_string(),
            calories: 0.0,
            protein: 0.0,
            fat: 0.0,
            carbs: 0.0,
            recommendation: format!("{food_name}的营养数据暂时无法获取，建议适量食用。"),
            allergens: Vec::new(),
            allergen_reasoning: String::new(),
            cooking_method_comparisons: Vec::new(),
        }
    }
}

/// One dish in a recognized menu, with the goal-driven recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedDish {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    #[serde(rename = "isRecommended")]
    pub is_recommended: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietRecord {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "foodName")]
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    #[serde(rename = "mealType")]
    pub meal_type: String,
    #[serde(rename = "recordDate")]
    pub record_date: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDietRecordRequest {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "foodName")]
    pub food_name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    #[serde(rename = "mealType")]
    pub meal_type: String,
    #[serde(rename = "recordDate")]
    pub record_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDietRecordRequest {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "foodName")]
    pub food_name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    #[serde(rename = "mealType")]
    pub meal_type: Option<String>,
    #[serde(rename = "recordDate")]
    pub record_date: Option<String>,
}

/// Normalize a meal slot name to the canonical English key.
/// The four Chinese slot names are accepted; anything else passes through.
pub fn normalize_meal_type(meal_type: &str) -> String {
    match meal_type {
        "早餐" => "breakfast".to_string(),
        "午餐" => "lunch".to_string(),
        "晚餐" => "dinner".to_string(),
        "加餐" => "snack".to_string(),
        other => other.to_lowercase(),
    }
}

/// One scored candidate from the recommendation engine
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedFood {
    pub food_name: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub score: f64,
    pub reason: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationData {
    pub user_id: i64,
    pub meal_type: String,
    pub remaining_calories: f64,
    pub daily_calorie_target: f64,
    pub health_goal: String,
    pub health_goal_label: String,
    pub recommendations: Vec<RecommendedFood>,
}
