// src/models/meal.rs - Meal before/after comparison types

use serde::{Deserialize, Serialize};

/// Lifecycle of a meal comparison record:
/// pending_before -> pending_after -> completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    PendingBefore,
    PendingAfter,
    Completed,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingBefore => "pending_before",
            Self::PendingAfter => "pending_after",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pending_after" => Self::PendingAfter,
            "completed" => Self::Completed,
            _ => Self::PendingBefore,
        }
    }
}

/// One dish recognized in the before image, with estimated portions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeforeDish {
    pub name: String,
    pub estimated_weight: i64,
    pub estimated_calories: f64,
    pub estimated_protein: f64,
    pub estimated_fat: f64,
    pub estimated_carbs: f64,
}

/// Structured features extracted from the before image. Persisted
/// verbatim as JSON so the after phase compares against the exact
/// per-dish estimates the model produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeforeFeatures {
    pub dishes: Vec<BeforeDish>,
    pub total_estimated_calories: f64,
    pub total_estimated_protein: f64,
    pub total_estimated_fat: f64,
    pub total_estimated_carbs: f64,
}

/// Per-dish leftover estimate from the after image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfterDish {
    pub name: String,
    /// 0 = fully eaten, 1 = untouched
    pub remaining_ratio: f64,
    #[serde(default)]
    pub remaining_weight: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AfterFeatures {
    pub dishes: Vec<AfterDish>,
    pub overall_remaining_ratio: f64,
    pub consumption_ratio: f64,
    pub comparison_analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealComparison {
    pub id: i64,
    pub user_id: i64,
    pub before_image_url: Option<String>,
    pub before_features: Option<String>,
    pub after_image_url: Option<String>,
    pub after_features: Option<String>,
    pub consumption_ratio: Option<f64>,
    pub original_calories: Option<f64>,
    pub original_protein: Option<f64>,
    pub original_fat: Option<f64>,
    pub original_carbs: Option<f64>,
    pub net_calories: Option<f64>,
    pub net_protein: Option<f64>,
    pub net_fat: Option<f64>,
    pub net_carbs: Option<f64>,
    pub status: ComparisonStatus,
    pub comparison_analysis: Option<String>,
    pub created_at: String,
}
