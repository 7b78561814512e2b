// src/recommend.rs - Personalized dish recommendation scorer
//
// Multi-factor scoring over a fixed in-memory catalog: health-goal match
// (0-40) + calorie-quota fit (0-30) + history preference (0-15) +
// variety (0-15), with allergen filtering up front.

use crate::core::{CoreError, Result};
use crate::database::Database;
use crate::models::{normalize_meal_type, HealthGoal, RecommendationData, RecommendedFood, User};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct CatalogFood {
    pub food_name: &'static str,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub category: &'static str,
    pub allergens: &'static [&'static str],
    pub meal_types: &'static [&'static str],
}

/// Built-in candidate catalog (per-100g nutrition)
pub const FOOD_CATALOG: [CatalogFood; 31] = [
    // 高蛋白低脂肪
    CatalogFood { food_name: "清蒸鲈鱼", calories: 105.0, protein: 19.5, fat: 3.0, carbs: 0.5, category: "鱼类", allergens: &["fish"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "白灼虾", calories: 90.0, protein: 18.0, fat: 1.5, carbs: 0.0, category: "海鲜", allergens: &["shellfish"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "鸡胸肉沙拉", calories: 120.0, protein: 22.0, fat: 3.0, carbs: 4.0, category: "沙拉", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "清炒西兰花", calories: 35.0, protein: 3.5, fat: 0.5, carbs: 5.0, category: "蔬菜", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "蒸蛋羹", calories: 65.0, protein: 6.5, fat: 4.0, carbs: 1.0, category: "蛋类", allergens: &["egg"], meal_types: &["breakfast", "lunch", "dinner"] },
    CatalogFood { food_name: "凉拌黄瓜", calories: 20.0, protein: 0.8, fat: 0.2, carbs: 3.5, category: "蔬菜", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "番茄蛋汤", calories: 35.0, protein: 2.5, fat: 1.5, carbs: 3.5, category: "汤类", allergens: &["egg"], meal_types: &["lunch", "dinner"] },
    // 均衡营养
    CatalogFood { food_name: "番茄炒蛋", calories: 150.0, protein: 10.5, fat: 8.2, carbs: 6.3, category: "家常菜", allergens: &["egg"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "青椒肉丝", calories: 180.0, protein: 15.0, fat: 10.0, carbs: 5.0, category: "家常菜", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "西红柿牛腩", calories: 160.0, protein: 14.0, fat: 8.0, carbs: 6.0, category: "炖菜", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "蒜蓉菠菜", calories: 40.0, protein: 3.0, fat: 1.0, carbs: 4.5, category: "蔬菜", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "木须肉", calories: 170.0, protein: 12.0, fat: 10.0, carbs: 8.0, category: "家常菜", allergens: &["egg"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "家常豆腐", calories: 130.0, protein: 9.0, fat: 7.0, carbs: 6.0, category: "豆制品", allergens: &["soy"], meal_types: &["lunch", "dinner"] },
    // 高蛋白高热量（增肌）
    CatalogFood { food_name: "红烧牛肉", calories: 250.0, protein: 26.0, fat: 15.0, carbs: 3.0, category: "肉类", allergens: &["soy"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "糖醋排骨", calories: 280.0, protein: 18.0, fat: 16.0, carbs: 15.0, category: "肉类", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "宫保鸡丁", calories: 180.0, protein: 18.0, fat: 10.0, carbs: 8.0, category: "鸡肉", allergens: &["peanut", "soy"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "牛肉面", calories: 350.0, protein: 20.0, fat: 8.0, carbs: 50.0, category: "面食", allergens: &["wheat", "soy"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "鸡蛋灌饼", calories: 260.0, protein: 10.0, fat: 12.0, carbs: 28.0, category: "面食", allergens: &["egg", "wheat"], meal_types: &["breakfast"] },
    // 低碳水（控糖）
    CatalogFood { food_name: "烤鸡翅", calories: 200.0, protein: 20.0, fat: 13.0, carbs: 0.5, category: "鸡肉", allergens: &[], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "香煎三文鱼", calories: 200.0, protein: 22.0, fat: 12.0, carbs: 0.0, category: "鱼类", allergens: &["fish"], meal_types: &["lunch", "dinner"] },
    CatalogFood { food_name: "蒜香西兰花配鸡胸", calories: 110.0, protein: 18.0, fat: 3.0, carbs: 4.0, category: "沙拉", allergens: &[], meal_types: &["lunch", "dinner"] },
    // 早餐类
    CatalogFood { food_name: "小米粥", calories: 45.0, protein: 1.5, fat: 0.3, carbs: 9.5, category: "粥类", allergens: &[], meal_types: &["breakfast"] },
    CatalogFood { food_name: "燕麦牛奶", calories: 150.0, protein: 6.0, fat: 5.0, carbs: 20.0, category: "早餐", allergens: &["milk", "wheat"], meal_types: &["breakfast"] },
    CatalogFood { food_name: "全麦面包配牛油果", calories: 180.0, protein: 5.0, fat: 10.0, carbs: 18.0, category: "面食", allergens: &["wheat"], meal_types: &["breakfast"] },
    CatalogFood { food_name: "水煮蛋", calories: 75.0, protein: 6.5, fat: 5.0, carbs: 0.5, category: "蛋类", allergens: &["egg"], meal_types: &["breakfast", "snack"] },
    CatalogFood { food_name: "豆浆", calories: 35.0, protein: 3.0, fat: 1.5, carbs: 2.5, category: "豆制品", allergens: &["soy"], meal_types: &["breakfast"] },
    // 加餐类
    CatalogFood { food_name: "酸奶", calories: 70.0, protein: 3.5, fat: 3.0, carbs: 7.0, category: "乳制品", allergens: &["milk"], meal_types: &["snack", "breakfast"] },
    CatalogFood { food_name: "苹果", calories: 52.0, protein: 0.3, fat: 0.2, carbs: 13.0, category: "水果", allergens: &[], meal_types: &["snack"] },
    CatalogFood { food_name: "香蕉", calories: 90.0, protein: 1.2, fat: 0.3, carbs: 22.0, category: "水果", allergens: &[], meal_types: &["snack", "breakfast"] },
    CatalogFood { food_name: "坚果拼盘", calories: 580.0, protein: 18.0, fat: 50.0, carbs: 15.0, category: "坚果", allergens: &["tree_nut", "peanut"], meal_types: &["snack"] },
    CatalogFood { food_name: "圣女果", calories: 25.0, protein: 1.0, fat: 0.2, carbs: 5.0, category: "水果", allergens: &[], meal_types: &["snack"] },
];

const ALLERGEN_CODES: [&str; 8] = [
    "milk", "egg", "fish", "shellfish", "peanut", "tree_nut", "wheat", "soy",
];

const ALLERGEN_CN_TO_CODE: [(&str, &str); 27] = [
    ("乳制品", "milk"), ("牛奶", "milk"), ("奶", "milk"),
    ("鸡蛋", "egg"), ("蛋", "egg"), ("蛋类", "egg"),
    ("鱼类", "fish"), ("鱼", "fish"),
    ("甲壳类", "shellfish"), ("虾", "shellfish"), ("蟹", "shellfish"),
    ("海鲜", "shellfish"), ("贝类", "shellfish"),
    ("花生", "peanut"),
    ("树坚果", "tree_nut"), ("坚果", "tree_nut"), ("杏仁", "tree_nut"),
    ("核桃", "tree_nut"), ("腰果", "tree_nut"),
    ("小麦", "wheat"), ("麸质", "wheat"), ("面粉", "wheat"),
    ("大豆", "soy"), ("豆制品", "soy"), ("豆腐", "soy"), ("酱油", "soy"),
    ("乳糖", "milk"),
];

/// Keywords used for cross-dish preference matching
const PREFERENCE_KEYWORDS: [&str; 8] = ["鱼", "虾", "鸡", "牛", "豆", "蛋", "菜", "粥"];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalize user allergen tokens (free text or codes) to the canonical
/// eight-code set, with fuzzy Chinese matching.
pub fn normalize_allergens(user_allergens: &[String]) -> BTreeSet<String> {
    let mut codes = BTreeSet::new();
    for allergen in user_allergens {
        let trimmed = allergen.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lowered = trimmed.to_lowercase();
        if ALLERGEN_CODES.contains(&lowered.as_str()) {
            codes.insert(lowered);
            continue;
        }
        if let Some((_, code)) = ALLERGEN_CN_TO_CODE.iter().find(|(cn, _)| *cn == trimmed) {
            codes.insert(code.to_string());
            continue;
        }
        if let Some((_, code)) = ALLERGEN_CN_TO_CODE
            .iter()
            .find(|(cn, _)| trimmed.contains(cn) || cn.contains(trimmed))
        {
            codes.insert(code.to_string());
        }
    }
    codes
}

/// Daily calorie target: Mifflin-St Jeor BMR x 1.375, adjusted by goal
pub fn daily_calorie_target(user: &User) -> f64 {
    let tdee = user.bmr() * 1.375;
    match user.health_goal {
        HealthGoal::ReduceFat => tdee - 500.0,
        HealthGoal::GainMuscle => tdee + 300.0,
        _ => tdee,
    }
}

/// Goal-match score in [0, 40]
fn score_health_goal(food: &CatalogFood, goal: HealthGoal) -> f64 {
    let cal = food.calories;
    let prot = food.protein;
    let fat = food.fat;
    let carbs = food.carbs;

    match goal {
        HealthGoal::ReduceFat => {
            let mut score = 0.0;
            score += (15.0 - cal / 200.0 * 15.0).max(0.0);
            score += (prot / 25.0 * 15.0).min(15.0);
            score += (10.0 - fat / 20.0 * 10.0).max(0.0);
            score.min(40.0)
        }
        HealthGoal::GainMuscle => {
            let mut score = (prot / 30.0 * 20.0).min(20.0);
            if (150.0..=350.0).contains(&cal) {
                score += 15.0;
            } else if cal < 150.0 {
                score += cal / 150.0 * 10.0;
            } else {
                score += (15.0 - (cal - 350.0) / 200.0 * 10.0).max(0.0);
            }
            if fat <= 15.0 {
                score += 5.0;
            }
            score.min(40.0)
        }
        HealthGoal::ControlSugar => {
            let mut score = (20.0 - carbs / 30.0 * 20.0).max(0.0);
            score += (prot / 25.0 * 15.0).min(15.0);
            if cal <= 250.0 {
                score += 5.0;
            }
            score.min(40.0)
        }
        HealthGoal::Balanced | HealthGoal::Unset => {
            let mut score: f64 = 0.0;
            let total_macro = prot + fat + carbs;
            if total_macro > 0.0 {
                let prot_ratio = prot / total_macro;
                let fat_ratio = fat / total_macro;
                let carbs_ratio = carbs / total_macro;
                if (0.15..=0.35).contains(&prot_ratio) {
                    score += 12.0;
                }
                if (0.15..=0.35).contains(&fat_ratio) {
                    score += 12.0;
                }
                if (0.30..=0.65).contains(&carbs_ratio) {
                    score += 12.0;
                }
            }
            if (100.0..=300.0).contains(&cal) {
                score += 4.0;
            }
            score.min(40.0)
        }
    }
}

/// Quota-fit score in [0, 30]: peak when the dish lands in 10-50% of the
/// remaining calorie quota.
fn score_calorie_fit(food: &CatalogFood, remaining_calories: f64) -> f64 {
    let cal = food.calories;

    if remaining_calories <= 0.0 {
        // Over quota: only near-zero-calorie items score meaningfully
        if cal <= 50.0 {
            return 15.0;
        }
        return (10.0 - cal / 100.0 * 10.0).max(0.0);
    }

    let ideal_min = remaining_calories * 0.1;
    let ideal_max = remaining_calories * 0.5;

    if cal >= ideal_min && cal <= ideal_max {
        30.0
    } else if cal < ideal_min {
        (30.0 - (ideal_min - cal) / ideal_min * 15.0).max(15.0)
    } else {
        let over_ratio = (cal - ideal_max) / ideal_max;
        (30.0 - over_ratio * 40.0).max(0.0)
    }
}

/// History-preference score in [0, 15]
fn score_preference(food: &CatalogFood, history_counts: &BTreeMap<String, i64>) -> f64 {
    let mut score = 0.0;

    if let Some(count) = history_counts.get(food.food_name) {
        score += (*count as f64 * 2.5).min(10.0);
    }

    for (name, count) in history_counts {
        if *count > 0 && !food.category.is_empty() {
            for keyword in PREFERENCE_KEYWORDS {
                if name.contains(keyword) && food.food_name.contains(keyword) {
                    score += (*count as f64 * 0.5).min(3.0);
                    break;
                }
            }
        }
    }

    score.min(15.0)
}

fn score_variety(food: &CatalogFood, today_eaten: &BTreeSet<String>) -> f64 {
    if today_eaten.contains(food.food_name) {
        0.0
    } else {
        15.0
    }
}

/// Nutrient-threshold tags for one catalog entry
pub fn generate_tags(food: &CatalogFood) -> Vec<String> {
    let mut tags = Vec::new();
    if food.calories <= 100.0 {
        tags.push("低热量".to_string());
    } else if food.calories >= 300.0 {
        tags.push("高热量".to_string());
    }
    if food.protein >= 15.0 {
        tags.push("高蛋白".to_string());
    }
    if food.fat <= 3.0 {
        tags.push("低脂肪".to_string());
    } else if food.fat >= 20.0 {
        tags.push("高脂肪".to_string());
    }
    if food.carbs <= 5.0 {
        tags.push("低碳水".to_string());
    } else if food.carbs >= 30.0 {
        tags.push("高碳水".to_string());
    }
    tags
}

fn generate_reason(
    food: &CatalogFood,
    goal: HealthGoal,
    remaining_calories: f64,
    tags: &[String],
    is_preferred: bool,
) -> String {
    let mut reasons: Vec<String> = Vec::new();
    let has = |tag: &str| tags.iter().any(|t| t == tag);

    match goal {
        HealthGoal::ReduceFat => {
            if has("低热量") || food.calories <= 120.0 {
                reasons.push(format!("热量仅{:.0}千卡，适合减脂", food.calories));
            }
            if has("高蛋白") {
                reasons.push(format!("蛋白质{:.1}g，有助于维持肌肉", food.protein));
            }
            if has("低脂肪") {
                reasons.push("低脂肪，减少脂肪摄入".to_string());
            }
        }
        HealthGoal::GainMuscle => {
            if has("高蛋白") {
                reasons.push(format!("蛋白质{:.1}g，促进肌肉合成", food.protein));
            }
            if food.calories >= 150.0 {
                reasons.push(format!("热量{:.0}千卡，提供充足能量", food.calories));
            }
        }
        HealthGoal::ControlSugar => {
            if has("低碳水") || food.carbs <= 10.0 {
                reasons.push(format!("碳水仅{:.1}g，有助于控糖", food.carbs));
            }
            if has("高蛋白") {
                reasons.push(format!("高蛋白{:.1}g，延缓血糖上升", food.protein));
            }
        }
        HealthGoal::Balanced | HealthGoal::Unset => {
            if !tags.is_empty() {
                reasons.push("营养成分均衡".to_string());
            }
        }
    }

    if remaining_calories > 0.0 && food.calories <= remaining_calories * 0.5 {
        reasons.push(format!(
            "在您的剩余热量配额（{remaining_calories:.0}kcal）内"
        ));
    }
    if is_preferred {
        reasons.push("符合您的饮食偏好".to_string());
    }
    if reasons.is_empty() {
        let goal_label = match goal {
            HealthGoal::Unset => HealthGoal::Balanced.label(),
            goal => goal.label(),
        };
        reasons.push(format!("适合{goal_label}饮食目标"));
    }

    format!("{}。", reasons.join("；"))
}

pub struct RecommendationService {
    db: Arc<Database>,
}

impl RecommendationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn recommend(
        &self,
        user_id: i64,
        meal_type: &str,
        limit: usize,
    ) -> Result<RecommendationData> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;

        let goal = match user.health_goal {
            HealthGoal::Unset => HealthGoal::Balanced,
            goal => goal,
        };
        let user_allergens = normalize_allergens(&user.allergens);

        let daily_target = daily_calorie_target(&user);
        let today_intake = self.db.today_intake(user_id).await?;
        let remaining_calories = (daily_target - today_intake).max(0.0);

        let history_counts = self.db.food_history_counts(user_id, 30).await?;
        let today_eaten = self.db.today_eaten_foods(user_id).await?;

        let meal_type_en = normalize_meal_type(meal_type);

        let mut scored: Vec<(f64, RecommendedFood)> = Vec::new();
        for food in &FOOD_CATALOG {
            if !food.meal_types.contains(&meal_type_en.as_str()) {
                continue;
            }
            if food
                .allergens
                .iter()
                .any(|code| user_allergens.contains(*code))
            {
                continue;
            }

            let goal_score = score_health_goal(food, goal);
            let cal_score = score_calorie_fit(food, remaining_calories);
            let pref_score = score_preference(food, &history_counts);
            let variety_score = score_variety(food, &today_eaten);
            let total = round1((goal_score + cal_score + pref_score + variety_score).clamp(0.0, 100.0));

            let tags = generate_tags(food);
            let is_preferred = history_counts.contains_key(food.food_name);
            let reason = generate_reason(food, goal, remaining_calories, &tags, is_preferred);

            scored.push((
                total,
                RecommendedFood {
                    food_name: food.food_name.to_string(),
                    calories: food.calories,
                    protein: food.protein,
                    fat: food.fat,
                    carbs: food.carbs,
                    score: total,
                    reason,
                    tags,
                },
            ));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let recommendations: Vec<RecommendedFood> =
            scored.into_iter().take(limit).map(|(_, food)| food).collect();

        Ok(RecommendationData {
            user_id,
            meal_type: meal_type_en,
            remaining_calories: round2(remaining_calories),
            daily_calorie_target: round2(daily_target),
            health_goal: goal.as_str().to_string(),
            health_goal_label: goal.label().to_string(),
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(name: &str) -> &'static CatalogFood {
        FOOD_CATALOG
            .iter()
            .find(|f| f.food_name == name)
            .expect("catalog entry")
    }

    #[test]
    fn test_normalize_allergens_mixed_input() {
        let input = vec![
            "egg".to_string(),
            "海鲜".to_string(),
            "对花生过敏".to_string(),
            "".to_string(),
        ];
        let codes = normalize_allergens(&input);
        assert!(codes.contains("egg"));
        assert!(codes.contains("shellfish"));
        assert!(codes.contains("peanut"));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_goal_score_bounds() {
        for food in &FOOD_CATALOG {
            for goal in [
                HealthGoal::ReduceFat,
                HealthGoal::GainMuscle,
                HealthGoal::ControlSugar,
                HealthGoal::Balanced,
            ] {
                let score = score_health_goal(food, goal);
                assert!((0.0..=40.0).contains(&score), "{} {goal:?} {score}", food.food_name);
            }
        }
    }

    #[test]
    fn test_calorie_fit_peak_and_decay() {
        let fish = catalog("清蒸鲈鱼"); // 105 kcal
        // remaining 600: ideal band is [60, 300] -> peak
        assert_eq!(score_calorie_fit(fish, 600.0), 30.0);
        // over quota: small items still score
        assert_eq!(score_calorie_fit(catalog("凉拌黄瓜"), 0.0), 15.0);
        let noodles = catalog("牛肉面"); // 350 kcal
        assert!(score_calorie_fit(noodles, 0.0) < 10.0);
    }

    #[test]
    fn test_variety_score() {
        let mut eaten = BTreeSet::new();
        eaten.insert("番茄炒蛋".to_string());
        assert_eq!(score_variety(catalog("番茄炒蛋"), &eaten), 0.0);
        assert_eq!(score_variety(catalog("清蒸鲈鱼"), &eaten), 15.0);
    }

    #[test]
    fn test_preference_scoring() {
        let mut history = BTreeMap::new();
        history.insert("清蒸鲈鱼".to_string(), 3i64);
        // Exact dish: 3 * 2.5 = 7.5, plus keyword 鱼 bonus 1.5
        let score = score_preference(catalog("清蒸鲈鱼"), &history);
        assert!(score > 7.0 && score <= 15.0);
        // Keyword-only overlap (鱼)
        let related = score_preference(catalog("香煎三文鱼"), &history);
        assert!(related > 0.0 && related < 7.5);
    }

    #[test]
    fn test_tags_thresholds() {
        let tags = generate_tags(catalog("清蒸鲈鱼"));
        assert!(tags.contains(&"高蛋白".to_string()));
        assert!(tags.contains(&"低脂肪".to_string()));
        assert!(tags.contains(&"低碳水".to_string()));

        let noodles = generate_tags(catalog("牛肉面"));
        assert!(noodles.contains(&"高热量".to_string()));
        assert!(noodles.contains(&"高碳水".to_string()));
    }
}
