// src/rag/types.rs - Knowledge record and search result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar-only metadata map stored alongside each vector. Composite
/// values (alias lists, ingredient lists) are JSON-serialized to strings
/// by the knowledge-base loaders before insertion.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One search hit, ordered by ascending distance (smaller = more similar)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub exists: bool,
    pub row_count: usize,
}

/// Entry of the Chinese food composition knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodKnowledge {
    pub food_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub per_100g: NutritionPer100g,
    #[serde(default)]
    pub common_serving: String,
    #[serde(default)]
    pub cooking_notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutritionPer100g {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fiber: f64,
    #[serde(default)]
    pub sodium: f64,
}

/// Entry of the dish-ingredient-allergen knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeKnowledge {
    pub dish_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// allergen code -> provenance of that allergen in this dish
    #[serde(default)]
    pub allergens: BTreeMap<String, AllergenSource>,
    #[serde(default)]
    pub hidden_allergen_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllergenSource {
    #[serde(default)]
    pub ingredient: String,
    #[serde(default)]
    pub note: String,
    /// true when visible in the dish name/ingredients, false for hidden
    /// allergens introduced by seasoning or preparation
    #[serde(default)]
    pub direct: bool,
}

/// Entry of the exercise METs knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseKnowledge {
    pub exercise_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub mets: f64,
    /// light / moderate / vigorous
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub description: String,
}
