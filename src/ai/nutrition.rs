// src/ai/nutrition.rs - Dish nutrition analyzer with RAG context

use crate::ai::client::{extract_json_object, AiClient, CallType};
use crate::models::{CookingMethodComparison, NutritionResult};
use crate::rag::NutritionKb;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// The eight canonical allergen codes the model may return
pub const CANONICAL_ALLERGEN_CODES: [&str; 8] = [
    "milk", "egg", "fish", "shellfish", "peanut", "tree_nut", "wheat", "soy",
];

/// Nutrition analyzer: retrieves food-composition context, prompts the
/// multimodal model and parses its output leniently. Upstream failures
/// never escape; the caller always receives a NutritionResult.
pub struct NutritionAnalyzer {
    client: Arc<AiClient>,
    nutrition_kb: Arc<NutritionKb>,
}

impl NutritionAnalyzer {
    pub fn new(client: Arc<AiClient>, nutrition_kb: Arc<NutritionKb>) -> Self {
        Self {
            client,
            nutrition_kb,
        }
    }

    pub async fn analyze(&self, food_name: &str) -> NutritionResult {
        self.analyze_for_user(food_name, None).await
    }

    pub async fn analyze_for_user(&self, food_name: &str, user_id: Option<i64>) -> NutritionResult {
        match self.try_analyze(food_name, user_id).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Nutrition analysis for {food_name} failed: {e}");
                NutritionResult::fallback(food_name)
            }
        }
    }

    /// Fallible variant for callers that need to distinguish an upstream
    /// outage from a (leniently parsed) result, e.g. to substitute their
    /// own placeholder. Parse problems still degrade to defaults here;
    /// only the LLM call itself can fail.
    pub async fn try_analyze(
        &self,
        food_name: &str,
        user_id: Option<i64>,
    ) -> crate::core::Result<NutritionResult> {
        let rag_context = self.nutrition_kb.get_nutrition_context(food_name);
        let prompt = build_nutrition_prompt(food_name, &rag_context);

        let content = self
            .client
            .generate_text(CallType::FoodAnalysis, user_id, food_name, prompt)
            .await?;
        Ok(parse_nutrition_response(&content, food_name))
    }
}

/// Prompt with RAG context, the allergen code catalogue and few-shot
/// examples pinning the output shape.
pub fn build_nutrition_prompt(food_name: &str, rag_context: &str) -> String {
    let rag_section = if rag_context.is_empty() {
        String::new()
    } else {
        format!("\n\n{rag_context}\n\n重要：请优先参考以上《中国食物成分表》数据给出营养分析，确保数据尽量准确。\n")
    };

    format!(
        r#"请分析菜品"{food_name}"的营养成分和可能的过敏原，并以JSON格式返回。
{rag_section}
要求：
1. 估算每100克的营养数据
2. 给出减脂人群的饮食建议
3. 分析该菜品可能包含的八大类过敏原（乳制品、鸡蛋、鱼类、甲壳类、花生、树坚果、小麦、大豆）
4. 特别注意推理隐性过敏原（如：宫保鸡丁通常含花生；蛋炒饭含鸡蛋；炸酱面含小麦和大豆等）
5. 只返回JSON，不要其他解释
6. 如果有参考数据，营养数值应与参考数据接近
7. 列出该食材/菜品在2-4种不同烹饪方式下的热量和脂肪对比（如清蒸、红烧、油炸、水煮等），帮助用户选择更健康的烹饪方式

八大类过敏原代码对照：
- milk: 乳制品（牛奶、奶酪、黄油、奶油等）
- egg: 鸡蛋（各种蛋类及其制品）
- fish: 鱼类（各种鱼类及鱼制品）
- shellfish: 甲壳类（虾、蟹、贝类等海鲜）
- peanut: 花生（花生及花生制品）
- tree_nut: 树坚果（杏仁、核桃、腰果等）
- wheat: 小麦（面粉、面条、面包等含麸质食品）
- soy: 大豆（豆腐、豆浆、酱油等豆制品）

返回格式：
{{
    "calories": 热量数值（千卡，浮点数）,
    "protein": 蛋白质数值（克，浮点数）,
    "fat": 脂肪数值（克，浮点数）,
    "carbs": 碳水化合物数值（克，浮点数）,
    "recommendation": "给减脂人群的建议（50字以内）",
    "allergens": ["过敏原代码列表，如peanut, egg等"],
    "allergen_reasoning": "过敏原推理说明（说明为什么这道菜可能含有这些过敏原，100字以内）",
    "cooking_method_comparisons": [
        {{"method": "烹饪方式名称", "calories": 热量浮点数, "fat": 脂肪浮点数, "description": "简要说明（20字以内）"}}
    ]
}}

示例1（宫保鸡丁）：
{{
    "calories": 180.0,
    "protein": 18.0,
    "fat": 10.0,
    "carbs": 8.0,
    "recommendation": "蛋白质丰富，但花生热量较高，建议适量食用。",
    "allergens": ["peanut", "soy"],
    "allergen_reasoning": "宫保鸡丁是经典川菜，主要配料包括花生米（花生过敏原），调味通常使用酱油（大豆过敏原）。",
    "cooking_method_comparisons": [
        {{"method": "炒", "calories": 180.0, "fat": 10.0, "description": "标准做法，油量适中"}},
        {{"method": "水煮", "calories": 130.0, "fat": 5.0, "description": "水煮减少油脂"}},
        {{"method": "油炸", "calories": 260.0, "fat": 18.0, "description": "油炸热量大幅增加"}}
    ]
}}

示例2（番茄炒蛋）：
{{
    "calories": 150.0,
    "protein": 10.5,
    "fat": 8.2,
    "carbs": 6.3,
    "recommendation": "营养均衡，蛋白质含量较高，适合减脂期食用。",
    "allergens": ["egg"],
    "allergen_reasoning": "番茄炒蛋的主要食材是鸡蛋，属于蛋类过敏原。",
    "cooking_method_comparisons": [
        {{"method": "炒", "calories": 150.0, "fat": 8.2, "description": "标准做法"}},
        {{"method": "蒸蛋", "calories": 80.0, "fat": 5.0, "description": "无需额外油脂"}},
        {{"method": "煎", "calories": 200.0, "fat": 14.0, "description": "煎制需更多油"}}
    ]
}}

示例3（清蒸鲈鱼）：
{{
    "calories": 105.0,
    "protein": 19.5,
    "fat": 3.0,
    "carbs": 0.5,
    "recommendation": "高蛋白低脂肪，非常适合减脂期食用。",
    "allergens": ["fish", "soy"],
    "allergen_reasoning": "鲈鱼属于鱼类过敏原，清蒸时通常使用酱油调味（大豆过敏原）。",
    "cooking_method_comparisons": [
        {{"method": "清蒸", "calories": 105.0, "fat": 3.0, "description": "最健康，保留营养"}},
        {{"method": "红烧", "calories": 180.0, "fat": 10.0, "description": "酱汁增加热量"}},
        {{"method": "油炸", "calories": 250.0, "fat": 18.0, "description": "油炸热量最高"}}
    ]
}}

现在请分析"{food_name}"："#
    )
}

fn coerce_f64(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Parse the model output. Extracts the first `{...}` span, coerces
/// numeric fields with per-food defaults, filters allergen codes to the
/// canonical set, and never propagates a parse error.
pub fn parse_nutrition_response(content: &str, food_name: &str) -> NutritionResult {
    let Some(json_str) = extract_json_object(content) else {
        warn!("No JSON object found in nutrition response for {food_name}");
        return NutritionResult::fallback(food_name);
    };

    let data: Value = match serde_json::from_str(json_str) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to parse nutrition response for {food_name}: {e}");
            return NutritionResult::fallback(food_name);
        }
    };

    let allergens: Vec<String> = data
        .get("allergens")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|item| item.as_str())
                .map(|code| code.to_lowercase())
                .filter(|code| CANONICAL_ALLERGEN_CODES.contains(&code.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let cooking_method_comparisons: Vec<CookingMethodComparison> = data
        .get("cooking_method_comparisons")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|item| {
                    let method = item.get("method").and_then(|v| v.as_str())?;
                    Some(CookingMethodComparison {
                        method: method.to_string(),
                        calories: coerce_f64(item.get("calories"), 0.0),
                        fat: coerce_f64(item.get("fat"), 0.0),
                        description: item
                            .get("description")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    NutritionResult {
        name: food_name.to_string(),
        calories: coerce_f64(data.get("calories"), 150.0),
        protein: coerce_f64(data.get("protein"), 10.0),
        fat: coerce_f64(data.get("fat"), 8.0),
        carbs: coerce_f64(data.get("carbs"), 15.0),
        recommendation: data
            .get("recommendation")
            .and_then(|v| v.as_str())
            .unwrap_or("营养数据仅供参考")
            .to_string(),
        allergens,
        allergen_reasoning: data
            .get("allergen_reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        cooking_method_comparisons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_surrounding_prose() {
        let content = r#"分析如下：
{"calories": 180.0, "protein": 18.0, "fat": 10.0, "carbs": 8.0,
 "recommendation": "适量食用", "allergens": ["PEANUT", "soy", "gluten"],
 "allergen_reasoning": "含花生和酱油"}
希望有帮助。"#;
        let result = parse_nutrition_response(content, "宫保鸡丁");
        assert_eq!(result.calories, 180.0);
        // Unknown codes dropped, casing normalized
        assert_eq!(result.allergens, vec!["peanut", "soy"]);
        assert!(result.cooking_method_comparisons.is_empty());
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        let result = parse_nutrition_response("抱歉，我无法分析。", "任意菜");
        assert_eq!(result.calories, 0.0);
        assert_eq!(result.protein, 0.0);
        assert!(result.allergens.is_empty());
        assert!(result.recommendation.contains("暂时无法"));
    }

    #[test]
    fn test_parse_numeric_strings() {
        let content = r#"{"calories": "150", "protein": "10.5", "fat": 8.2, "carbs": 6.3,
            "recommendation": "均衡", "allergens": ["egg"], "allergen_reasoning": "含鸡蛋",
            "cooking_method_comparisons": [
                {"method": "蒸蛋", "calories": 80.0, "fat": 5.0, "description": "无需油脂"},
                {"calories": 1.0}
            ]}"#;
        let result = parse_nutrition_response(content, "番茄炒蛋");
        assert_eq!(result.calories, 150.0);
        assert_eq!(result.protein, 10.5);
        // Entries without a method are dropped
        assert_eq!(result.cooking_method_comparisons.len(), 1);
        assert_eq!(result.cooking_method_comparisons[0].method, "蒸蛋");
    }

    #[test]
    fn test_prompt_embeds_context_and_codes() {
        let prompt = build_nutrition_prompt("番茄炒蛋", "以下是参考数据：热量150千卡");
        assert!(prompt.contains("番茄炒蛋"));
        assert!(prompt.contains("以下是参考数据"));
        for code in CANONICAL_ALLERGEN_CODES {
            assert!(prompt.contains(code));
        }
    }
}
