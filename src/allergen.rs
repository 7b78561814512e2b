// src/allergen.rs - Eight-class allergen detection and fusion
//
// The canonical taxonomy follows the Chinese prepackaged-food labeling
// rules and international practice: milk, egg, fish, shellfish, peanut,
// tree_nut, wheat, soy.

use crate::rag::HiddenAllergen;
use serde::Serialize;

pub struct AllergenCategory {
    pub code: &'static str,
    pub name: &'static str,
    pub name_en: &'static str,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

pub const ALLERGEN_CATEGORIES: [AllergenCategory; 8] = [
    AllergenCategory {
        code: "milk",
        name: "乳制品",
        name_en: "Milk",
        keywords: &[
            "牛奶", "鲜奶", "纯奶", "全脂奶", "脱脂奶", "低脂奶", "奶粉", "奶油", "黄油",
            "芝士", "奶酪", "起司", "干酪", "炼乳", "淡奶", "奶皮", "奶昔", "酸奶", "酸乳",
            "乳酪", "奶酥", "奶糖", "奶茶", "牛乳", "羊奶", "马奶", "乳清", "乳糖", "酪蛋白",
            "乳脂", "乳粉", "乳制品", "奶香", "奶味", "芝士焗", "奶油焗", "白汁", "忌廉",
        ],
        description: "包括牛奶及其制品，如奶酪、黄油、酸奶、奶油等",
    },
    AllergenCategory {
        code: "egg",
        name: "鸡蛋",
        name_en: "Egg",
        keywords: &[
            "鸡蛋", "蛋", "蛋黄", "蛋白", "蛋清", "鸡子", "鸭蛋", "鹅蛋", "鹌鹑蛋", "皮蛋",
            "松花蛋", "咸蛋", "卤蛋", "茶叶蛋", "蛋花", "蛋液", "蛋粉", "全蛋", "溏心蛋",
            "荷包蛋", "蛋炒", "炒蛋", "煎蛋", "蒸蛋", "蛋羹", "蛋饼", "蛋糕", "蛋挞", "蛋卷",
            "蛋包", "蛋皮", "卵磷脂", "蛋黄酱", "美乃滋", "沙拉酱",
        ],
        description: "包括鸡蛋、鸭蛋、鹅蛋等各种蛋类及其制品",
    },
    AllergenCategory {
        code: "fish",
        name: "鱼类",
        name_en: "Fish",
        keywords: &[
            "鱼", "鲈鱼", "鲫鱼", "鲤鱼", "草鱼", "鳙鱼", "鳊鱼", "鳜鱼", "桂鱼", "石斑鱼",
            "多宝鱼", "比目鱼", "鳕鱼", "三文鱼", "鲑鱼", "金枪鱼", "吞拿鱼", "鲷鱼", "带鱼",
            "黄花鱼", "鲳鱼", "鲅鱼", "秋刀鱼", "沙丁鱼", "鳗鱼", "鲶鱼", "黑鱼", "鲢鱼",
            "罗非鱼", "鱼片", "鱼丸", "鱼糕", "鱼籽", "鱼子酱", "鱼露", "鱼干", "鱼皮",
            "鱼肉", "鱼头", "鱼尾", "鱼柳", "鱼排",
        ],
        description: "包括各种鱼类及鱼制品",
    },
    AllergenCategory {
        code: "shellfish",
        name: "甲壳类",
        name_en: "Shellfish",
        keywords: &[
            "虾", "大虾", "明虾", "基围虾", "龙虾", "小龙虾", "虾仁", "虾米", "虾皮", "虾干",
            "虾酱", "虾膏", "虾球", "虾饺", "蟹", "螃蟹", "大闸蟹", "梭子蟹", "青蟹", "蟹黄",
            "蟹肉", "蟹膏", "蟹粉", "蟹柳", "濑尿虾", "皮皮虾", "贝", "扇贝", "蛤蜊", "蛤",
            "蚬", "蚌", "牡蛎", "生蚝", "鲍鱼", "海螺", "蛏子", "花甲", "蚝", "青口", "淡菜",
            "海鲜", "海味",
        ],
        description: "包括虾、蟹、贝类等甲壳类海鲜",
    },
    AllergenCategory {
        code: "peanut",
        name: "花生",
        name_en: "Peanut",
        keywords: &[
            "花生", "花生米", "花生仁", "花生酱", "花生油", "花生碎", "花生粉", "花生糖",
            "花生酥", "落花生", "长生果", "宫保", "怪味", "五香花生", "油炸花生", "酒鬼花生",
        ],
        description: "包括花生及花生制品",
    },
    AllergenCategory {
        code: "tree_nut",
        name: "树坚果",
        name_en: "Tree Nuts",
        keywords: &[
            "杏仁", "核桃", "腰果", "榛子", "开心果", "夏威夷果", "澳洲坚果", "松子", "栗子",
            "板栗", "碧根果", "山核桃", "巴旦木", "扁桃仁", "白果", "银杏", "坚果", "果仁",
            "杏仁露", "核桃露", "坚果酱", "杏仁粉", "核桃粉", "椰子", "椰浆", "椰奶", "椰蓉",
        ],
        description: "包括杏仁、核桃、腰果、榛子等树坚果及其制品",
    },
    AllergenCategory {
        code: "wheat",
        name: "小麦",
        name_en: "Wheat",
        keywords: &[
            "小麦", "麦", "面粉", "面", "馒头", "包子", "饺子", "馄饨", "面条", "面包", "蛋糕",
            "饼干", "曲奇", "披萨", "意面", "通心粉", "挂面", "拉面", "刀削面", "炸酱面",
            "担担面", "烧麦", "春卷", "煎饼", "葱油饼", "手抓饼", "油条", "麸质", "面筋",
            "烤麸", "麦芽", "麦片", "燕麦", "大麦", "黑麦", "酱油", "生抽", "老抽", "豉油",
            "蚝油",
        ],
        description: "包括小麦及其制品，含麸质食品",
    },
    AllergenCategory {
        code: "soy",
        name: "大豆",
        name_en: "Soy",
        keywords: &[
            "大豆", "黄豆", "豆腐", "豆干", "豆皮", "腐竹", "豆浆", "豆奶", "豆花", "豆脑",
            "豆芽", "毛豆", "青豆", "黑豆", "纳豆", "味噌", "豆瓣酱", "豆豉", "腐乳",
            "豆腐乳", "臭豆腐", "千张", "百叶", "素鸡", "素肉", "豆腐干", "香干", "豆腐丝",
            "豆腐泡", "油豆腐", "大豆油", "豆油", "大豆卵磷脂",
        ],
        description: "包括大豆及其制品，如豆腐、豆浆、酱油等",
    },
];

pub fn category_by_code(code: &str) -> Option<&'static AllergenCategory> {
    ALLERGEN_CATEGORIES.iter().find(|c| c.code == code)
}

#[derive(Debug, Clone, Serialize)]
pub struct AllergenCategoryInfo {
    pub code: String,
    pub name: String,
    pub name_en: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectedAllergen {
    pub code: String,
    pub name: String,
    pub name_en: String,
    pub matched_keywords: Vec<String>,
    /// high / medium
    pub confidence: String,
    /// keyword / ai / keyword+ai / graph (merge output only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllergenWarning {
    pub allergen: String,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllergenCheckResult {
    pub food_name: String,
    pub detected_allergens: Vec<DetectedAllergen>,
    pub allergen_count: usize,
    pub has_allergens: bool,
    pub warnings: Vec<AllergenWarning>,
    pub has_warnings: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionMethods {
    pub keyword_count: usize,
    pub ai_count: usize,
    pub merged_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergedAllergenResult {
    pub food_name: String,
    pub detected_allergens: Vec<DetectedAllergen>,
    pub allergen_count: usize,
    pub has_allergens: bool,
    pub warnings: Vec<AllergenWarning>,
    pub has_warnings: bool,
    pub ai_reasoning: String,
    pub detection_methods: DetectionMethods,
}

/// Keyword-based detector plus the fusion that merges keyword, AI and
/// recipe-graph findings with provenance.
pub struct AllergenService;

impl AllergenService {
    pub fn new() -> Self {
        Self
    }

    pub fn all_categories(&self) -> Vec<AllergenCategoryInfo> {
        ALLERGEN_CATEGORIES
            .iter()
            .map(|c| AllergenCategoryInfo {
                code: c.code.to_string(),
                name: c.name.to_string(),
                name_en: c.name_en.to_string(),
                description: c.description.to_string(),
            })
            .collect()
    }

    fn matching_keywords(text: &str, keywords: &[&str]) -> Vec<String> {
        let mut matched: Vec<String> = keywords
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .map(|keyword| keyword.to_string())
            .collect();
        matched.sort();
        matched
    }

    fn warning_applies(
        category: &AllergenCategory,
        matched_keywords: &[String],
        user_allergens: &[String],
    ) -> bool {
        let lowered: Vec<String> = user_allergens.iter().map(|a| a.to_lowercase()).collect();
        user_allergens.iter().any(|a| a == category.name)
            || lowered.contains(&category.name_en.to_lowercase())
            || lowered.contains(&category.code.to_string())
            || matched_keywords
                .iter()
                .any(|kw| user_allergens.iter().any(|a| a == kw))
    }

    /// Substring-match each allergen class against the food name plus
    /// optional ingredients. Two or more matched keywords give high
    /// confidence, exactly one gives medium.
    pub fn check(
        &self,
        food_name: &str,
        ingredients: Option<&[String]>,
        user_allergens: Option<&[String]>,
    ) -> AllergenCheckResult {
        let mut texts = vec![food_name.to_string()];
        if let Some(ingredients) = ingredients {
            texts.extend(ingredients.iter().cloned());
        }
        let combined = texts.join(" ");

        let mut detected = Vec::new();
        let mut warnings = Vec::new();

        for category in &ALLERGEN_CATEGORIES {
            let matched = Self::matching_keywords(&combined, category.keywords);
            if matched.is_empty() {
                continue;
            }
            let confidence = if matched.len() > 1 { "high" } else { "medium" };

            if let Some(user_allergens) = user_allergens {
                if Self::warning_applies(category, &matched, user_allergens) {
                    warnings.push(AllergenWarning {
                        allergen: category.name.to_string(),
                        level: "high".to_string(),
                        message: format!(
                            "警告：检测到您的过敏原【{}】，匹配关键词：{}",
                            category.name,
                            matched.join(", ")
                        ),
                    });
                }
            }

            detected.push(DetectedAllergen {
                code: category.code.to_string(),
                name: category.name.to_string(),
                name_en: category.name_en.to_string(),
                matched_keywords: matched,
                confidence: confidence.to_string(),
                source: None,
            });
        }

        AllergenCheckResult {
            food_name: food_name.to_string(),
            allergen_count: detected.len(),
            has_allergens: !detected.is_empty(),
            has_warnings: !warnings.is_empty(),
            detected_allergens: detected,
            warnings,
            ingredients: ingredients.map(|i| i.to_vec()),
        }
    }

    /// Merge keyword detection with AI-inferred allergens and optional
    /// recipe-graph hints. Every entry carries its provenance; user
    /// warnings are regenerated over the merged set.
    pub fn merge(
        &self,
        food_name: &str,
        keyword_result: &AllergenCheckResult,
        ai_allergens: &[String],
        ai_reasoning: &str,
        graph_hidden: &[HiddenAllergen],
        user_allergens: Option<&[String]>,
    ) -> MergedAllergenResult {
        let keyword_codes: Vec<&str> = keyword_result
            .detected_allergens
            .iter()
            .map(|a| a.code.as_str())
            .collect();
        let ai_codes: Vec<String> = ai_allergens.iter().map(|c| c.to_lowercase()).collect();

        let mut merged: Vec<DetectedAllergen> = Vec::new();
        // Iterate the fixed taxonomy so output order is stable
        for category in &ALLERGEN_CATEGORIES {
            let from_keyword = keyword_codes.contains(&category.code);
            let from_ai = ai_codes.iter().any(|c| c == category.code);
            let from_graph = graph_hidden.iter().any(|h| h.code == category.code);
            if !from_keyword && !from_ai && !from_graph {
                continue;
            }

            let matched_keywords = keyword_result
                .detected_allergens
                .iter()
                .find(|a| a.code == category.code)
                .map(|a| a.matched_keywords.clone())
                .unwrap_or_default();

            let (source, confidence) = if from_keyword && from_ai {
                ("keyword+ai", "high".to_string())
            } else if from_keyword {
                let confidence = if matched_keywords.len() > 1 { "high" } else { "medium" };
                ("keyword", confidence.to_string())
            } else if from_ai {
                ("ai", "medium".to_string())
            } else {
                ("graph", "medium".to_string())
            };

            merged.push(DetectedAllergen {
                code: category.code.to_string(),
                name: category.name.to_string(),
                name_en: category.name_en.to_string(),
                matched_keywords,
                confidence,
                source: Some(source.to_string()),
            });
        }

        let mut warnings = Vec::new();
        if let Some(user_allergens) = user_allergens {
            for allergen in &merged {
                let category = match category_by_code(&allergen.code) {
                    Some(category) => category,
                    None => continue,
                };
                if Self::warning_applies(category, &allergen.matched_keywords, user_allergens) {
                    let source_text = match allergen.source.as_deref() {
                        Some("keyword") => "关键词匹配",
                        Some("ai") => "AI推理",
                        Some("keyword+ai") => "关键词匹配和AI推理",
                        Some("graph") => "知识图谱推理",
                        _ => "检测",
                    };
                    warnings.push(AllergenWarning {
                        allergen: allergen.name.clone(),
                        level: "high".to_string(),
                        message: format!(
                            "警告：通过{}检测到您的过敏原【{}】",
                            source_text, allergen.name
                        ),
                    });
                }
            }
        }

        MergedAllergenResult {
            food_name: food_name.to_string(),
            allergen_count: merged.len(),
            has_allergens: !merged.is_empty(),
            has_warnings: !warnings.is_empty(),
            detection_methods: DetectionMethods {
                keyword_count: keyword_codes.len(),
                ai_count: ai_codes
                    .iter()
                    .filter(|c| category_by_code(c).is_some())
                    .collect::<std::collections::BTreeSet<_>>()
                    .len(),
                merged_count: merged.len(),
            },
            detected_allergens: merged,
            warnings,
            ai_reasoning: ai_reasoning.to_string(),
        }
    }
}

impl Default for AllergenService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection_confidence() {
        let service = AllergenService::new();
        // 蛋炒饭 matches 蛋 and 蛋炒 -> high confidence egg
        let result = service.check("蛋炒饭", None, None);
        let egg = result
            .detected_allergens
            .iter()
            .find(|a| a.code == "egg")
            .expect("egg detected");
        assert_eq!(egg.confidence, "high");
        assert!(egg.matched_keywords.len() >= 2);
    }

    #[test]
    fn test_single_keyword_is_medium() {
        let service = AllergenService::new();
        let result = service.check("腰果鸡丁", None, None);
        let nut = result
            .detected_allergens
            .iter()
            .find(|a| a.code == "tree_nut")
            .expect("tree nut detected");
        assert_eq!(nut.confidence, "medium");
        assert_eq!(nut.matched_keywords, vec!["腰果"]);
    }

    #[test]
    fn test_user_warning_via_code_and_keyword() {
        let service = AllergenService::new();
        let user = vec!["egg".to_string()];
        let result = service.check("番茄炒蛋", None, Some(&user));
        assert!(result.has_warnings);

        let user_kw = vec!["鸡蛋".to_string()];
        let result = service.check("鸡蛋灌饼", None, Some(&user_kw));
        assert!(result.has_warnings);
    }

    #[test]
    fn test_merge_provenance() {
        let service = AllergenService::new();
        let keyword_result = service.check("蛋炒饭", None, None);
        let merged = service.merge(
            "蛋炒饭",
            &keyword_result,
            &["egg".to_string(), "soy".to_string()],
            "蛋炒饭含鸡蛋，可能使用酱油",
            &[],
            None,
        );

        let egg = merged
            .detected_allergens
            .iter()
            .find(|a| a.code == "egg")
            .expect("egg merged");
        assert_eq!(egg.source.as_deref(), Some("keyword+ai"));
        assert_eq!(egg.confidence, "high");

        let soy = merged
            .detected_allergens
            .iter()
            .find(|a| a.code == "soy")
            .expect("soy merged");
        assert_eq!(soy.source.as_deref(), Some("ai"));
        assert_eq!(soy.confidence, "medium");

        assert_eq!(merged.detection_methods.keyword_count, 1);
        assert_eq!(merged.detection_methods.ai_count, 2);
        assert_eq!(merged.detection_methods.merged_count, 2);
    }

    #[test]
    fn test_merge_with_graph_source() {
        let service = AllergenService::new();
        let keyword_result = service.check("沙茶牛肉", None, None);
        let graph = vec![HiddenAllergen {
            code: "peanut".to_string(),
            source_dish: "沙茶牛肉".to_string(),
            confidence: "medium".to_string(),
        }];
        let merged = service.merge("沙茶牛肉", &keyword_result, &[], "", &graph, None);
        let peanut = merged
            .detected_allergens
            .iter()
            .find(|a| a.code == "peanut")
            .expect("peanut from graph");
        assert_eq!(peanut.source.as_deref(), Some("graph"));
        assert_eq!(peanut.confidence, "medium");
    }

    #[test]
    fn test_merge_warning_mentions_source() {
        let service = AllergenService::new();
        let keyword_result = service.check("清炒时蔬", None, None);
        let user = vec!["大豆".to_string()];
        let merged = service.merge(
            "清炒时蔬",
            &keyword_result,
            &["soy".to_string()],
            "可能使用大豆油",
            &[],
            Some(&user),
        );
        assert!(merged.has_warnings);
        assert!(merged.warnings[0].message.contains("AI推理"));
    }

    #[test]
    fn test_invalid_ai_codes_ignored() {
        let service = AllergenService::new();
        let keyword_result = service.check("白米饭", None, None);
        let merged = service.merge(
            "白米饭",
            &keyword_result,
            &["gluten".to_string(), "sesame".to_string()],
            "",
            &[],
            None,
        );
        assert_eq!(merged.detection_methods.merged_count, 0);
        assert!(!merged.has_allergens);
    }
}
