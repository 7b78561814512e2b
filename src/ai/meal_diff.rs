// src/ai/meal_diff.rs - Meal before/after comparison engine

use crate::ai::client::{extract_json_object, AiClient, CallType, ContentPart};
use crate::core::{CoreError, Result};
use crate::database::Database;
use crate::models::{AfterDish, AfterFeatures, BeforeDish, BeforeFeatures, ComparisonStatus, MealComparison};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Consumption ratio assumed when the comparison cannot be computed.
/// The user has already supplied both images, so the record is always
/// completed rather than refused.
const DEGRADED_CONSUMPTION_RATIO: f64 = 0.75;

/// Two-phase engine: a comparison record is created from the before
/// image (status pending_after) and completed by the after image. The
/// persisted status field enforces the ordering.
pub struct MealComparisonService {
    client: Arc<AiClient>,
    db: Arc<Database>,
    upload_root: PathBuf,
}

impl MealComparisonService {
    pub fn new(client: Arc<AiClient>, db: Arc<Database>, upload_root: PathBuf) -> Self {
        Self {
            client,
            db,
            upload_root,
        }
    }

    fn save_image(&self, image_bytes: &[u8], ext: &str) -> Result<String> {
        let dir = self.upload_root.join("meal");
        std::fs::create_dir_all(&dir)
            .map_err(|e| CoreError::internal(format!("Failed to create upload dir: {e}")))?;
        let file_name = format!("{}.{ext}", Uuid::new_v4());
        std::fs::write(dir.join(&file_name), image_bytes)
            .map_err(|e| CoreError::internal(format!("Failed to store image: {e}")))?;
        Ok(format!("/uploads/meal/{file_name}"))
    }

    fn image_path(&self, image_url: &str) -> PathBuf {
        // Stored URLs are /uploads/<...> under the configured root
        let relative = image_url.trim_start_matches("/uploads/");
        self.upload_root.join(relative)
    }

    /// Before phase: extract per-dish estimates from the before image and
    /// persist the record with status pending_after. The features payload
    /// is stored verbatim so the after phase compares against the exact
    /// estimates the model produced.
    pub async fn upload_before(
        &self,
        user_id: i64,
        image_bytes: &[u8],
        ext: &str,
    ) -> Result<MealComparison> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;

        let image_url = self.save_image(image_bytes, ext)?;
        let features = self.extract_before_features(image_bytes, user_id).await;
        let features_json = serde_json::to_string(&features)?;

        self.db
            .create_meal_comparison(user_id, &image_url, &features_json, &features)
            .await
    }

    async fn extract_before_features(&self, image_bytes: &[u8], user_id: i64) -> BeforeFeatures {
        let prompt = r#"请分析这张餐前食物图片，识别图片中的所有菜品，并估算每个菜品的份量和营养成分。

要求：
1. 识别图片中所有可见的菜品
2. 根据视觉判断估算每个菜品的重量（克）
3. 根据菜品类型和重量估算热量、蛋白质、脂肪、碳水化合物
4. 计算所有菜品的总营养成分
5. 只返回JSON，不要其他解释

返回格式：
{
    "dishes": [
        {
            "name": "菜品名称",
            "estimated_weight": 重量数值（克，整数）,
            "estimated_calories": 热量数值（千卡，浮点数）,
            "estimated_protein": 蛋白质数值（克，浮点数）,
            "estimated_fat": 脂肪数值（克，浮点数）,
            "estimated_carbs": 碳水化合物数值（克，浮点数）
        }
    ],
    "total_estimated_calories": 总热量（千卡，浮点数）,
    "total_estimated_protein": 总蛋白质（克，浮点数）,
    "total_estimated_fat": 总脂肪（克，浮点数）,
    "total_estimated_carbs": 总碳水化合物（克，浮点数）
}

如果图片不是食物图片，返回空dishes数组。

请分析图片："#;

        let parts = vec![
            ContentPart::image_from_bytes(image_bytes),
            ContentPart::Text(prompt.to_string()),
        ];
        match self
            .client
            .chat(CallType::MealComparison, Some(user_id), "餐前图片特征提取", parts)
            .await
        {
            Ok(content) => parse_before_features(&content),
            Err(e) => {
                warn!("Before-meal feature extraction failed: {e}");
                BeforeFeatures::default()
            }
        }
    }

    /// After phase: compare against the retained before features and
    /// complete the record. Fails with NotFound for an unknown id and
    /// Conflict unless the record is pending_after.
    pub async fn upload_after(
        &self,
        comparison_id: i64,
        image_bytes: &[u8],
        ext: &str,
    ) -> Result<MealComparison> {
        let record = self
            .db
            .get_meal_comparison(comparison_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(format!("meal comparison {comparison_id} does not exist"))
            })?;
        if record.status != ComparisonStatus::PendingAfter {
            return Err(CoreError::conflict(format!(
                "meal comparison {comparison_id} is {}, expected pending_after",
                record.status.as_str()
            )));
        }

        let after_image_url = self.save_image(image_bytes, ext)?;
        let before_features: BeforeFeatures = record
            .before_features
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        // The before image is re-read from disk for the two-image
        // comparison; losing it is a degraded condition, not a failure.
        let before_bytes = record
            .before_image_url
            .as_deref()
            .map(|url| self.image_path(url))
            .and_then(|path: PathBuf| std::fs::read(path.as_path()).ok());

        let after = match before_bytes {
            Some(before_bytes) => {
                self.compare_images(&before_bytes, image_bytes, &before_features, record.user_id)
                    .await
            }
            None => {
                warn!(
                    "Before image for comparison {comparison_id} unreadable, using degraded default"
                );
                degraded_after_features()
            }
        };

        let after_json = serde_json::to_string(&after)?;
        self.db
            .complete_meal_comparison(comparison_id, &after_image_url, &after_json, &after)
            .await
    }

    async fn compare_images(
        &self,
        before_bytes: &[u8],
        after_bytes: &[u8],
        before_features: &BeforeFeatures,
        user_id: i64,
    ) -> AfterFeatures {
        let mut before_dishes_text = String::new();
        for dish in &before_features.dishes {
            before_dishes_text.push_str(&format!(
                "- {}（估算重量：{}g，热量：{}kcal）\n",
                dish.name, dish.estimated_weight, dish.estimated_calories
            ));
        }
        if before_dishes_text.is_empty() {
            before_dishes_text = "未识别到具体菜品".to_string();
        }

        let prompt = format!(
            r#"请对比这两张图片（餐前和餐后），分析用户吃掉了多少食物，剩余了多少。

餐前识别到的菜品信息：
{before_dishes_text}

要求：
1. 对比餐前图片（第一张）和餐后图片（第二张）
2. 估算每个菜品的剩余比例（0表示吃完，1表示没动）
3. 计算整体剩余比例
4. 给出简短的对比分析说明
5. 只返回JSON，不要其他解释

返回格式：
{{
    "dishes": [
        {{
            "name": "菜品名称",
            "remaining_ratio": 剩余比例（0-1的浮点数）,
            "remaining_weight": 估算剩余重量（克，整数）
        }}
    ],
    "overall_remaining_ratio": 整体剩余比例（0-1的浮点数）,
    "comparison_analysis": "对比分析说明（50字以内，描述用户大约吃掉了多少）"
}}"#
        );

        let parts = vec![
            ContentPart::Text("这是餐前的食物图片：".to_string()),
            ContentPart::image_from_bytes(before_bytes),
            ContentPart::Text("这是餐后的食物图片：".to_string()),
            ContentPart::image_from_bytes(after_bytes),
            ContentPart::Text(prompt),
        ];

        match self
            .client
            .chat(CallType::MealComparison, Some(user_id), "餐前餐后对比", parts)
            .await
        {
            Ok(content) => parse_comparison_result(&content),
            Err(e) => {
                warn!("Before/after comparison failed: {e}");
                degraded_after_features()
            }
        }
    }

    /// Manual override: recompute net intake from a user-supplied ratio
    /// without re-calling the model.
    pub async fn adjust(&self, comparison_id: i64, new_ratio: f64) -> Result<MealComparison> {
        if !(0.0..=1.0).contains(&new_ratio) {
            return Err(CoreError::validation(format!(
                "consumption ratio must be within [0, 1], got {new_ratio}"
            )));
        }
        let record = self
            .db
            .get_meal_comparison(comparison_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(format!("meal comparison {comparison_id} does not exist"))
            })?;
        if record.status != ComparisonStatus::Completed {
            return Err(CoreError::conflict(format!(
                "meal comparison {comparison_id} is {}, only completed records can be adjusted",
                record.status.as_str()
            )));
        }
        self.db.adjust_meal_ratio(comparison_id, new_ratio).await
    }
}

fn clamp_ratio(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}

fn coerce_f64(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn degraded_after_features() -> AfterFeatures {
    AfterFeatures {
        dishes: Vec::new(),
        overall_remaining_ratio: round4(1.0 - DEGRADED_CONSUMPTION_RATIO),
        consumption_ratio: DEGRADED_CONSUMPTION_RATIO,
        comparison_analysis: "无法准确对比餐前餐后图片，默认估算您吃掉了约75%的食物。".to_string(),
    }
}

/// Parse the before-image extraction. Totals are recomputed from the
/// per-dish estimates when the model leaves them at zero.
pub fn parse_before_features(content: &str) -> BeforeFeatures {
    let Some(json_str) = extract_json_object(content) else {
        warn!("No JSON object in before-meal response");
        return BeforeFeatures::default();
    };
    let data: Value = match serde_json::from_str(json_str) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to parse before-meal features: {e}");
            return BeforeFeatures::default();
        }
    };

    let dishes: Vec<BeforeDish> = data
        .get("dishes")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .map(|dish| BeforeDish {
                    name: dish
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("未知菜品")
                        .to_string(),
                    estimated_weight: coerce_f64(dish.get("estimated_weight"), 100.0) as i64,
                    estimated_calories: coerce_f64(dish.get("estimated_calories"), 0.0),
                    estimated_protein: coerce_f64(dish.get("estimated_protein"), 0.0),
                    estimated_fat: coerce_f64(dish.get("estimated_fat"), 0.0),
                    estimated_carbs: coerce_f64(dish.get("estimated_carbs"), 0.0),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut features = BeforeFeatures {
        total_estimated_calories: coerce_f64(data.get("total_estimated_calories"), 0.0),
        total_estimated_protein: coerce_f64(data.get("total_estimated_protein"), 0.0),
        total_estimated_fat: coerce_f64(data.get("total_estimated_fat"), 0.0),
        total_estimated_carbs: coerce_f64(data.get("total_estimated_carbs"), 0.0),
        dishes,
    };

    if features.total_estimated_calories == 0.0 && !features.dishes.is_empty() {
        features.total_estimated_calories =
            features.dishes.iter().map(|d| d.estimated_calories).sum();
        features.total_estimated_protein =
            features.dishes.iter().map(|d| d.estimated_protein).sum();
        features.total_estimated_fat = features.dishes.iter().map(|d| d.estimated_fat).sum();
        features.total_estimated_carbs = features.dishes.iter().map(|d| d.estimated_carbs).sum();
    }
    features
}

/// Parse the before/after comparison. All ratios are clamped to [0, 1]
/// and the consumption ratio is derived as 1 - overall remaining.
pub fn parse_comparison_result(content: &str) -> AfterFeatures {
    let Some(json_str) = extract_json_object(content) else {
        warn!("No JSON object in comparison response");
        return degraded_after_features();
    };
    let data: Value = match serde_json::from_str(json_str) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to parse comparison result: {e}");
            return degraded_after_features();
        }
    };

    let dishes: Vec<AfterDish> = data
        .get("dishes")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .map(|dish| AfterDish {
                    name: dish
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("未知菜品")
                        .to_string(),
                    remaining_ratio: clamp_ratio(coerce_f64(dish.get("remaining_ratio"), 0.0)),
                    remaining_weight: coerce_f64(dish.get("remaining_weight"), 0.0) as i64,
                })
                .collect()
        })
        .unwrap_or_default();

    let overall_remaining = clamp_ratio(coerce_f64(data.get("overall_remaining_ratio"), 0.0));
    AfterFeatures {
        dishes,
        overall_remaining_ratio: round4(overall_remaining),
        consumption_ratio: round4(1.0 - overall_remaining),
        comparison_analysis: data
            .get("comparison_analysis")
            .and_then(|v| v.as_str())
            .unwrap_or("对比分析完成")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_before_features_recomputes_totals() {
        let content = r#"{"dishes": [
            {"name": "红烧肉", "estimated_weight": 200, "estimated_calories": 500.0,
             "estimated_protein": 25.0, "estimated_fat": 35.0, "estimated_carbs": 10.0},
            {"name": "清炒时蔬", "estimated_weight": 150, "estimated_calories": 80.0,
             "estimated_protein": 3.0, "estimated_fat": 5.0, "estimated_carbs": 8.0}
        ], "total_estimated_calories": 0}"#;
        let features = parse_before_features(content);
        assert_eq!(features.dishes.len(), 2);
        assert_eq!(features.total_estimated_calories, 580.0);
        assert_eq!(features.total_estimated_protein, 28.0);
    }

    #[test]
    fn test_parse_comparison_clamps_ratios() {
        let content = r#"{"dishes": [
            {"name": "红烧肉", "remaining_ratio": 1.4, "remaining_weight": 50},
            {"name": "时蔬", "remaining_ratio": -0.2, "remaining_weight": 0}
        ], "overall_remaining_ratio": 0.25, "comparison_analysis": "吃掉大部分"}"#;
        let after = parse_comparison_result(content);
        assert_eq!(after.dishes[0].remaining_ratio, 1.0);
        assert_eq!(after.dishes[1].remaining_ratio, 0.0);
        assert_eq!(after.overall_remaining_ratio, 0.25);
        assert_eq!(after.consumption_ratio, 0.75);
    }

    #[test]
    fn test_parse_comparison_garbage_uses_degraded_default() {
        let after = parse_comparison_result("对比失败");
        assert_eq!(after.consumption_ratio, 0.75);
        assert!(!after.comparison_analysis.is_empty());
    }
}
