// src/mets.rs - METs-based exercise calorie calculator
//
// calories(kcal) = METs x weight(kg) x duration(h). Values follow the
// Compendium of Physical Activities and the Chinese adult
// physical-activity energy expenditure reference.

use crate::models::PlanItemData;
use crate::rag::ExerciseKb;
use std::sync::Arc;

pub const DEFAULT_WEIGHT_KG: f64 = 70.0;
pub const DEFAULT_METS: f64 = 3.5;

struct MetsEntry {
    key: &'static str,
    mets: f64,
    name_cn: &'static str,
    intensity: &'static str,
}

const METS_TABLE: [MetsEntry; 29] = [
    MetsEntry { key: "walking", mets: 3.5, name_cn: "步行", intensity: "light" },
    MetsEntry { key: "brisk_walking", mets: 4.3, name_cn: "快走", intensity: "moderate" },
    MetsEntry { key: "hiking", mets: 5.3, name_cn: "徒步", intensity: "moderate" },
    MetsEntry { key: "running", mets: 8.0, name_cn: "跑步", intensity: "vigorous" },
    MetsEntry { key: "jogging", mets: 7.0, name_cn: "慢跑", intensity: "moderate" },
    MetsEntry { key: "sprint", mets: 12.0, name_cn: "冲刺跑", intensity: "vigorous" },
    MetsEntry { key: "cycling", mets: 6.0, name_cn: "骑行", intensity: "moderate" },
    MetsEntry { key: "cycling_leisure", mets: 4.0, name_cn: "休闲骑行", intensity: "light" },
    MetsEntry { key: "cycling_fast", mets: 10.0, name_cn: "快速骑行", intensity: "vigorous" },
    MetsEntry { key: "swimming", mets: 7.0, name_cn: "游泳", intensity: "moderate" },
    MetsEntry { key: "swimming_leisure", mets: 5.0, name_cn: "休闲游泳", intensity: "light" },
    MetsEntry { key: "swimming_fast", mets: 10.0, name_cn: "快速游泳", intensity: "vigorous" },
    MetsEntry { key: "gym", mets: 5.0, name_cn: "健身房训练", intensity: "moderate" },
    MetsEntry { key: "weight_training", mets: 5.0, name_cn: "力量训练", intensity: "moderate" },
    MetsEntry { key: "aerobics", mets: 6.5, name_cn: "有氧操", intensity: "moderate" },
    MetsEntry { key: "yoga", mets: 2.5, name_cn: "瑜伽", intensity: "light" },
    MetsEntry { key: "basketball", mets: 6.5, name_cn: "篮球", intensity: "moderate" },
    MetsEntry { key: "football", mets: 7.0, name_cn: "足球", intensity: "vigorous" },
    MetsEntry { key: "badminton", mets: 5.5, name_cn: "羽毛球", intensity: "moderate" },
    MetsEntry { key: "tennis", mets: 7.0, name_cn: "网球", intensity: "moderate" },
    MetsEntry { key: "table_tennis", mets: 4.0, name_cn: "乒乓球", intensity: "light" },
    MetsEntry { key: "park", mets: 3.5, name_cn: "公园活动", intensity: "light" },
    MetsEntry { key: "indoor", mets: 4.0, name_cn: "室内运动", intensity: "light" },
    MetsEntry { key: "outdoor", mets: 4.5, name_cn: "室外运动", intensity: "moderate" },
    MetsEntry { key: "dancing", mets: 5.0, name_cn: "跳舞", intensity: "moderate" },
    MetsEntry { key: "stair_climbing", mets: 8.0, name_cn: "爬楼梯", intensity: "vigorous" },
    MetsEntry { key: "jumping_rope", mets: 11.0, name_cn: "跳绳", intensity: "vigorous" },
    MetsEntry { key: "tai_chi", mets: 3.0, name_cn: "太极拳", intensity: "light" },
    MetsEntry { key: "stretching", mets: 2.3, name_cn: "拉伸", intensity: "light" },
];

const CHINESE_ALIASES: [(&str, &str); 34] = [
    ("步行", "walking"),
    ("散步", "walking"),
    ("走路", "walking"),
    ("快走", "brisk_walking"),
    ("徒步", "hiking"),
    ("登山", "hiking"),
    ("跑步", "running"),
    ("慢跑", "jogging"),
    ("冲刺", "sprint"),
    ("骑行", "cycling"),
    ("骑车", "cycling"),
    ("骑自行车", "cycling"),
    ("游泳", "swimming"),
    ("健身", "gym"),
    ("健身房", "gym"),
    ("力量训练", "weight_training"),
    ("举重", "weight_training"),
    ("有氧", "aerobics"),
    ("瑜伽", "yoga"),
    ("篮球", "basketball"),
    ("足球", "football"),
    ("羽毛球", "badminton"),
    ("网球", "tennis"),
    ("乒乓球", "table_tennis"),
    ("公园", "park"),
    ("室内", "indoor"),
    ("室外", "outdoor"),
    ("户外", "outdoor"),
    ("跳舞", "dancing"),
    ("舞蹈", "dancing"),
    ("爬楼梯", "stair_climbing"),
    ("跳绳", "jumping_rope"),
    ("太极", "tai_chi"),
    ("拉伸", "stretching"),
];

fn table_lookup(key: &str) -> Option<&'static MetsEntry> {
    METS_TABLE.iter().find(|entry| entry.key == key)
}

/// Normalize an exercise type: canonical English table first, then the
/// Chinese alias map, then substring matching against both, keeping the
/// input as-is when nothing matches.
fn normalize_exercise_type(exercise_type: &str) -> String {
    if exercise_type.trim().is_empty() {
        return "walking".to_string();
    }
    let normalized = exercise_type.trim().to_lowercase();

    if let Some((_, key)) = CHINESE_ALIASES.iter().find(|(cn, _)| *cn == normalized) {
        return key.to_string();
    }
    if table_lookup(&normalized).is_some() {
        return normalized;
    }
    for (cn, key) in CHINESE_ALIASES {
        if normalized.contains(cn) || cn.contains(normalized.as_str()) {
            return key.to_string();
        }
    }
    for entry in &METS_TABLE {
        if normalized.contains(entry.key) || entry.key.contains(normalized.as_str()) {
            return entry.key.to_string();
        }
    }
    normalized
}

/// METs calculator. Optionally consults the exercise knowledge base
/// before the built-in table, widening coverage beyond the ~30 types.
pub struct MetsService {
    exercise_kb: Option<Arc<ExerciseKb>>,
}

impl MetsService {
    pub fn new() -> Self {
        Self { exercise_kb: None }
    }

    pub fn with_exercise_kb(exercise_kb: Arc<ExerciseKb>) -> Self {
        Self {
            exercise_kb: Some(exercise_kb),
        }
    }

    /// Table-based METs value with the normalization cascade
    pub fn mets_value(&self, exercise_type: &str) -> f64 {
        let key = normalize_exercise_type(exercise_type);
        table_lookup(&key).map(|entry| entry.mets).unwrap_or(DEFAULT_METS)
    }

    /// RAG-enhanced METs value: knowledge base first, table fallback
    pub fn mets_value_rag(&self, exercise_type: &str) -> f64 {
        if let Some(kb) = &self.exercise_kb {
            let key = normalize_exercise_type(exercise_type);
            if table_lookup(&key).is_none() {
                if let Some(lookup) = kb.lookup_mets(exercise_type) {
                    return lookup.mets;
                }
            }
        }
        self.mets_value(exercise_type)
    }

    /// calories = METs x weight x duration/60. Default weight 70 kg;
    /// non-positive durations burn nothing.
    pub fn calculate_calories(
        &self,
        exercise_type: &str,
        weight_kg: Option<f64>,
        duration_minutes: i64,
    ) -> f64 {
        if duration_minutes <= 0 {
            return 0.0;
        }
        let weight = weight_kg.filter(|w| *w > 0.0).unwrap_or(DEFAULT_WEIGHT_KG);
        let mets = self.mets_value_rag(exercise_type);
        let calories = mets * weight * duration_minutes as f64 / 60.0;
        (calories * 10.0).round() / 10.0
    }

    /// Inverse: minutes needed to burn the target, at least one minute
    pub fn duration_for_target(
        &self,
        exercise_type: &str,
        weight_kg: Option<f64>,
        target_calories: f64,
    ) -> i64 {
        if target_calories <= 0.0 {
            return 0;
        }
        let weight = weight_kg.filter(|w| *w > 0.0).unwrap_or(DEFAULT_WEIGHT_KG);
        let mets = self.mets_value_rag(exercise_type);
        let minutes = (target_calories / (mets * weight) * 60.0).round() as i64;
        minutes.max(1)
    }

    pub fn exercise_info(&self, exercise_type: &str) -> (String, f64, String) {
        let key = normalize_exercise_type(exercise_type);
        match table_lookup(&key) {
            Some(entry) => (
                entry.name_cn.to_string(),
                entry.mets,
                entry.intensity.to_string(),
            ),
            None => (exercise_type.to_string(), DEFAULT_METS, "moderate".to_string()),
        }
    }

    /// Recompute each plan item's calorie cost from its type and
    /// duration, recording the METs value and the calculation basis.
    pub fn enrich_plan_items(&self, items: &mut [PlanItemData], weight_kg: Option<f64>) {
        let weight = weight_kg.filter(|w| *w > 0.0).unwrap_or(DEFAULT_WEIGHT_KG);
        for item in items.iter_mut() {
            let exercise_type = if item.place_type.is_empty() {
                "walking"
            } else {
                item.place_type.as_str()
            };
            let mets = self.mets_value_rag(exercise_type);
            item.cost = self.calculate_calories(exercise_type, Some(weight), item.duration);
            item.mets_value = Some(mets);
            item.calculation_basis = Some(format!(
                "METs={mets} × {weight}kg × {:.2}h",
                item.duration as f64 / 60.0
            ));
        }
    }
}

impl Default for MetsService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calorie_formula() {
        let mets = MetsService::new();
        // running: 8.0 METs x 70kg x 0.5h = 280
        assert_eq!(mets.calculate_calories("running", None, 30), 280.0);
        // explicit weight
        assert_eq!(mets.calculate_calories("walking", Some(60.0), 60), 210.0);
    }

    #[test]
    fn test_zero_and_negative_duration() {
        let mets = MetsService::new();
        assert_eq!(mets.calculate_calories("running", Some(70.0), 0), 0.0);
        assert_eq!(mets.calculate_calories("running", Some(70.0), -5), 0.0);
    }

    #[test]
    fn test_chinese_alias_and_substring_fallback() {
        let mets = MetsService::new();
        assert_eq!(mets.mets_value("慢跑"), 7.0);
        assert_eq!(mets.mets_value("骑自行车"), 6.0);
        // substring match: "夜间慢跑" contains 慢跑
        assert_eq!(mets.mets_value("夜间慢跑"), 7.0);
        // unknown falls back to the default
        assert_eq!(mets.mets_value("悬浮滑板"), DEFAULT_METS);
    }

    #[test]
    fn test_duration_inversion_round_trip() {
        let mets = MetsService::new();
        for target in [50.0, 200.0, 450.0] {
            for exercise in ["walking", "running", "swimming"] {
                let minutes = mets.duration_for_target(exercise, Some(70.0), target);
                let burned = mets.calculate_calories(exercise, Some(70.0), minutes);
                assert!(
                    (burned - target).abs() <= target * 0.05,
                    "{exercise} target {target} minutes {minutes} burned {burned}"
                );
            }
        }
    }

    #[test]
    fn test_duration_minimum_one_minute() {
        let mets = MetsService::new();
        assert_eq!(mets.duration_for_target("running", Some(70.0), 1.0), 1);
        assert_eq!(mets.duration_for_target("running", Some(70.0), 0.0), 0);
    }

    #[test]
    fn test_enrich_plan_items() {
        let mets = MetsService::new();
        let mut items = vec![crate::models::PlanItemData {
            day_index: 1,
            start_time: "19:00".into(),
            place_name: "健身步道".into(),
            place_type: "running".into(),
            duration: 30,
            cost: 999.0,
            notes: String::new(),
            mets_value: None,
            calculation_basis: None,
        }];
        mets.enrich_plan_items(&mut items, Some(70.0));
        assert_eq!(items[0].cost, 280.0);
        assert_eq!(items[0].mets_value, Some(8.0));
        assert!(items[0].calculation_basis.as_deref().unwrap().contains("METs=8"));
    }
}
