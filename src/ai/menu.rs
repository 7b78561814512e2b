// src/ai/menu.rs - Menu image recognition with per-dish nutrition analysis

use crate::ai::client::{extract_json_array, AiClient, CallType, ContentPart};
use crate::ai::nutrition::NutritionAnalyzer;
use crate::core::Result;
use crate::models::{HealthGoal, NutritionResult, RecognizedDish};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Upper bound on concurrent per-dish nutrition analyses
const MAX_PARALLEL_ANALYSES: usize = 5;

pub struct MenuAnalyzer {
    client: Arc<AiClient>,
    nutrition: Arc<NutritionAnalyzer>,
}

impl MenuAnalyzer {
    pub fn new(client: Arc<AiClient>, nutrition: Arc<NutritionAnalyzer>) -> Self {
        Self { client, nutrition }
    }

    /// Recognize a menu photo: extract dish names, analyze each dish with
    /// bounded parallelism, and attach the goal-driven recommendation.
    /// A single dish failure never fails the batch.
    pub async fn recognize(
        &self,
        image_bytes: &[u8],
        health_goal: Option<HealthGoal>,
        user_id: Option<i64>,
    ) -> Result<Vec<RecognizedDish>> {
        let dish_names = self.extract_dish_names(image_bytes, user_id).await?;
        if dish_names.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(dish_names.len().min(MAX_PARALLEL_ANALYSES)));
        let mut handles = Vec::with_capacity(dish_names.len());

        for name in dish_names.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let nutrition = Arc::clone(&self.nutrition);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                match nutrition.try_analyze(&name, user_id).await {
                    Ok(result) => {
                        let (is_recommended, reason) = recommend_for_goal(&result, health_goal);
                        RecognizedDish {
                            name,
                            calories: result.calories,
                            protein: result.protein,
                            fat: result.fat,
                            carbs: result.carbs,
                            is_recommended,
                            reason,
                        }
                    }
                    Err(e) => {
                        warn!("Dish analysis for {name} failed: {e}");
                        placeholder_dish(name)
                    }
                }
            }));
        }

        // Re-emit in the original name order; a panicked task yields the
        // zero-nutrition placeholder for its dish.
        let mut dishes = Vec::with_capacity(dish_names.len());
        for (handle, name) in handles.into_iter().zip(dish_names) {
            match handle.await {
                Ok(dish) => dishes.push(dish),
                Err(e) => {
                    warn!("Dish analysis task for {name} failed: {e}");
                    dishes.push(placeholder_dish(name));
                }
            }
        }
        Ok(dishes)
    }

    /// Extract a bare JSON array of dish names from the menu photo
    async fn extract_dish_names(
        &self,
        image_bytes: &[u8],
        user_id: Option<i64>,
    ) -> Result<Vec<String>> {
        let prompt = r#"请识别这张菜单图片中的所有菜品名称，并以JSON数组格式返回。

要求：
1. 只返回菜品名称，不要价格、描述等其他信息
2. 如果图片不是菜单，返回空数组 []
3. 只返回JSON数组，不要其他解释

返回格式：
["菜品1", "菜品2", "菜品3"]

示例：
["宫保鸡丁", "麻婆豆腐", "鱼香肉丝"]"#;

        let parts = vec![
            ContentPart::image_from_bytes(image_bytes),
            ContentPart::Text(prompt.to_string()),
        ];
        let content = self
            .client
            .chat(CallType::MenuRecognition, user_id, "菜单图片识别", parts)
            .await?;
        Ok(parse_dish_names(&content))
    }
}

/// Zero-nutrition stand-in for a dish whose analysis failed
fn placeholder_dish(name: String) -> RecognizedDish {
    RecognizedDish {
        name,
        calories: 0.0,
        protein: 0.0,
        fat: 0.0,
        carbs: 0.0,
        is_recommended: false,
        reason: "分析失败，营养数据暂不可用".to_string(),
    }
}

pub fn parse_dish_names(content: &str) -> Vec<String> {
    let Some(json_str) = extract_json_array(content) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(json_str) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            warn!("Failed to parse dish name array: {e}");
            Vec::new()
        }
    }
}

/// Goal-driven recommendation rules. Middle cases produce a neutral
/// non-recommendation with a moderation message.
pub fn recommend_for_goal(
    nutrition: &NutritionResult,
    health_goal: Option<HealthGoal>,
) -> (bool, String) {
    let calories = nutrition.calories;
    let protein = nutrition.protein;
    let fat = nutrition.fat;
    let carbs = nutrition.carbs;

    match health_goal {
        Some(HealthGoal::ReduceFat) => {
            if calories < 250.0 && protein > 15.0 && fat < 12.0 {
                (true, "蛋白质丰富、热量较低，适合您的减脂目标".to_string())
            } else if calories > 400.0 || fat > 20.0 {
                (false, "热量或脂肪含量较高，建议减少摄入".to_string())
            } else {
                (false, "热量适中，建议控制摄入量".to_string())
            }
        }
        Some(HealthGoal::GainMuscle) => {
            if protein > 20.0 {
                (true, "蛋白质含量高，适合增肌期食用".to_string())
            } else if protein < 10.0 {
                (false, "蛋白质含量较低，建议选择高蛋白食物".to_string())
            } else {
                (true, "蛋白质含量适中，可以适量食用".to_string())
            }
        }
        Some(HealthGoal::ControlSugar) => {
            if carbs < 20.0 {
                (true, "碳水化合物含量低，适合控糖饮食".to_string())
            } else if carbs > 40.0 {
                (false, "碳水化合物含量较高，建议减少摄入".to_string())
            } else {
                (false, "碳水化合物含量适中，建议适量食用".to_string())
            }
        }
        Some(HealthGoal::Balanced) | Some(HealthGoal::Unset) | None => {
            if calories < 300.0 && fat < 15.0 {
                (true, "营养均衡，适合日常食用".to_string())
            } else {
                (false, "热量或脂肪含量较高，建议适量食用".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nutrition(calories: f64, protein: f64, fat: f64, carbs: f64) -> NutritionResult {
        NutritionResult {
            name: "测试".to_string(),
            calories,
            protein,
            fat,
            carbs,
            recommendation: String::new(),
            allergens: vec![],
            allergen_reasoning: String::new(),
            cooking_method_comparisons: vec![],
        }
    }

    #[test]
    fn test_parse_dish_names_with_fences() {
        let names = parse_dish_names("```json\n[\"小炒黄牛肉\", \"韭菜炒鸡蛋\", \"\"]\n```");
        assert_eq!(names, vec!["小炒黄牛肉", "韭菜炒鸡蛋"]);
    }

    #[test]
    fn test_parse_dish_names_no_array() {
        assert!(parse_dish_names("这不是菜单").is_empty());
    }

    #[test]
    fn test_reduce_fat_rules() {
        let (rec, _) = recommend_for_goal(&nutrition(200.0, 18.0, 8.0, 5.0), Some(HealthGoal::ReduceFat));
        assert!(rec);
        let (rec, _) = recommend_for_goal(&nutrition(450.0, 18.0, 8.0, 5.0), Some(HealthGoal::ReduceFat));
        assert!(!rec);
        // Middle case: not recommended, moderation message
        let (rec, reason) =
            recommend_for_goal(&nutrition(300.0, 18.0, 8.0, 5.0), Some(HealthGoal::ReduceFat));
        assert!(!rec);
        assert!(reason.contains("控制"));
    }

    #[test]
    fn test_gain_muscle_rules() {
        let (rec, _) = recommend_for_goal(&nutrition(300.0, 25.0, 10.0, 20.0), Some(HealthGoal::GainMuscle));
        assert!(rec);
        let (rec, _) = recommend_for_goal(&nutrition(300.0, 5.0, 10.0, 20.0), Some(HealthGoal::GainMuscle));
        assert!(!rec);
        let (rec, _) = recommend_for_goal(&nutrition(300.0, 15.0, 10.0, 20.0), Some(HealthGoal::GainMuscle));
        assert!(rec);
    }

    #[test]
    fn test_control_sugar_rules() {
        let (rec, _) = recommend_for_goal(&nutrition(200.0, 10.0, 5.0, 10.0), Some(HealthGoal::ControlSugar));
        assert!(rec);
        let (rec, _) = recommend_for_goal(&nutrition(200.0, 10.0, 5.0, 50.0), Some(HealthGoal::ControlSugar));
        assert!(!rec);
    }

    #[test]
    fn test_balanced_and_missing_goal() {
        let (rec, _) = recommend_for_goal(&nutrition(250.0, 10.0, 10.0, 20.0), None);
        assert!(rec);
        let (rec, _) = recommend_for_goal(&nutrition(350.0, 10.0, 10.0, 20.0), Some(HealthGoal::Balanced));
        assert!(!rec);
    }
}
