// src/models/user.rs - User account and preference types

use serde::{Deserialize, Serialize};

/// Health goal driving recommendation and goal-progress logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthGoal {
    ReduceFat,
    GainMuscle,
    ControlSugar,
    Balanced,
    Unset,
}

impl HealthGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReduceFat => "reduce_fat",
            Self::GainMuscle => "gain_muscle",
            Self::ControlSugar => "control_sugar",
            Self::Balanced => "balanced",
            Self::Unset => "unset",
        }
    }

    /// Parse a stored goal string; anything unrecognized maps to Balanced
    pub fn parse(value: &str) -> Self {
        match value {
            "reduce_fat" => Self::ReduceFat,
            "gain_muscle" => Self::GainMuscle,
            "control_sugar" => Self::ControlSugar,
            "unset" => Self::Unset,
            _ => Self::Balanced,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ReduceFat => "减脂",
            Self::GainMuscle => "增肌",
            Self::ControlSugar => "控糖",
            Self::Balanced | Self::Unset => "均衡",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub health_goal: HealthGoal,
    /// Free-text tokens or canonical allergen codes, as entered by the user
    pub allergens: Vec<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<i64>,
    /// "male" / "female"
    pub gender: Option<String>,
    pub travel_preference: Option<String>,
    pub daily_budget: Option<i64>,
    pub created_at: String,
}

impl User {
    /// Body params with the documented fallback for missing values
    /// (70 kg, 170 cm, 30 y, male).
    pub fn body_params(&self) -> (f64, f64, i64, bool) {
        let weight = self.weight.filter(|w| *w > 0.0).unwrap_or(70.0);
        let height = self.height.filter(|h| *h > 0.0).unwrap_or(170.0);
        let age = self.age.filter(|a| *a > 0).unwrap_or(30);
        let is_male = self.gender.as_deref().unwrap_or("male") != "female";
        (weight, height, age, is_male)
    }

    /// Basal metabolic rate via Mifflin-St Jeor
    pub fn bmr(&self) -> f64 {
        let (weight, height, age, is_male) = self.body_params();
        let s = if is_male { 5.0 } else { -161.0 };
        10.0 * weight + 6.25 * height - 5.0 * age as f64 + s
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub nickname: Option<String>,
    pub health_goal: Option<String>,
    pub allergens: Option<Vec<String>>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub travel_preference: Option<String>,
    pub daily_budget: Option<i64>,
}
