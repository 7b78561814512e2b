// src/rag/recipe_graph.rs - Dish-ingredient-allergen knowledge graph

use crate::core::Result;
use crate::rag::embeddings::TextEmbedder;
use crate::rag::types::{Metadata, RecipeKnowledge, SearchHit};
use crate::rag::vector_store::{Metric, VectorStore};
use crate::sample_data;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const RECIPE_GRAPH_COLLECTION: &str = "recipe_knowledge_graph";

/// Strict distance cutoff for hidden-allergen hints; only near-exact
/// dish matches may contribute allergen codes
const HIDDEN_ALLERGEN_MAX_DISTANCE: f32 = 0.8;
const CONTEXT_MAX_DISTANCE: f32 = 1.2;

/// Hidden-allergen hint produced by the graph for the fusion engine
#[derive(Debug, Clone, Serialize)]
pub struct HiddenAllergen {
    pub code: String,
    pub source_dish: String,
    pub confidence: String,
}

/// Aggregated allergen context across the top matched recipes
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllergenContext {
    pub matched_recipes: Vec<MatchedRecipe>,
    pub all_allergen_codes: Vec<String>,
    pub direct_allergens: BTreeMap<String, String>,
    pub hidden_allergens: BTreeMap<String, String>,
    pub reasoning_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedRecipe {
    pub dish_name: String,
    pub distance: f32,
    pub allergen_codes: Vec<String>,
    pub ingredients: Vec<String>,
}

pub struct RecipeGraphKb {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<VectorStore>,
    data_file: Option<PathBuf>,
    initialized: AtomicBool,
    build_lock: Mutex<()>,
}

impl RecipeGraphKb {
    pub fn new(embedder: Arc<dyn TextEmbedder>, store: Arc<VectorStore>) -> Self {
        Self {
            embedder,
            store,
            data_file: None,
            initialized: AtomicBool::new(false),
            build_lock: Mutex::new(()),
        }
    }

    pub fn with_data_file(mut self, path: PathBuf) -> Self {
        self.data_file = Some(path);
        self
    }

    fn load_records(&self) -> Vec<RecipeKnowledge> {
        if let Some(path) = &self.data_file {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<Vec<RecipeKnowledge>>(&raw).map_err(|e| e.to_string()))
            {
                Ok(records) => {
                    info!("Loaded {} recipe graph records from {:?}", records.len(), path);
                    return records;
                }
                Err(e) => warn!("Failed to load recipe graph data file {:?}: {}", path, e),
            }
        }
        sample_data::builtin_recipes()
    }

    fn recipe_to_text(recipe: &RecipeKnowledge) -> String {
        let mut parts = vec![format!("菜品名称：{}", recipe.dish_name)];
        if !recipe.aliases.is_empty() {
            parts.push(format!("别名：{}", recipe.aliases.join("、")));
        }
        if !recipe.ingredients.is_empty() {
            parts.push(format!("配料：{}", recipe.ingredients.join("、")));
        }
        if !recipe.allergens.is_empty() {
            let allergen_parts: Vec<String> = recipe
                .allergens
                .iter()
                .map(|(code, info)| {
                    let kind = if info.direct { "直接" } else { "隐性" };
                    format!("{code}({kind}，来源：{}，{})", info.ingredient, info.note)
                })
                .collect();
            parts.push(format!("过敏原：{}", allergen_parts.join("；")));
        }
        if !recipe.hidden_allergen_notes.is_empty() {
            parts.push(format!("隐性过敏原说明：{}", recipe.hidden_allergen_notes));
        }
        parts.join("。")
    }

    /// Flat metadata; composite fields are JSON-serialized per the
    /// scalar-only metadata contract of the vector store.
    fn recipe_to_metadata(recipe: &RecipeKnowledge) -> Metadata {
        let allergen_codes: Vec<&String> = recipe.allergens.keys().collect();
        let direct_codes: Vec<&String> = recipe
            .allergens
            .iter()
            .filter(|(_, info)| info.direct)
            .map(|(code, _)| code)
            .collect();
        let hidden_codes: Vec<&String> = recipe
            .allergens
            .iter()
            .filter(|(_, info)| !info.direct)
            .map(|(code, _)| code)
            .collect();

        let json_string = |value: &Vec<&String>| {
            serde_json::Value::String(serde_json::to_string(value).unwrap_or_else(|_| "[]".into()))
        };

        let mut meta = Metadata::new();
        meta.insert("dish_name".into(), recipe.dish_name.clone().into());
        meta.insert(
            "aliases".into(),
            serde_json::Value::String(
                serde_json::to_string(&recipe.aliases).unwrap_or_else(|_| "[]".into()),
            ),
        );
        meta.insert(
            "ingredients".into(),
            serde_json::Value::String(
                serde_json::to_string(&recipe.ingredients).unwrap_or_else(|_| "[]".into()),
            ),
        );
        meta.insert("allergen_codes".into(), json_string(&allergen_codes));
        meta.insert("direct_allergen_codes".into(), json_string(&direct_codes));
        meta.insert("hidden_allergen_codes".into(), json_string(&hidden_codes));
        meta.insert(
            "hidden_allergen_notes".into(),
            recipe.hidden_allergen_notes.clone().into(),
        );
        meta.insert(
            "allergen_count".into(),
            (recipe.allergens.len() as i64).into(),
        );
        meta
    }

    pub fn build(&self, force_rebuild: bool) -> Result<usize> {
        if self.store.has_collection(RECIPE_GRAPH_COLLECTION) {
            let stats = self.store.collection_stats(RECIPE_GRAPH_COLLECTION);
            if stats.row_count > 0 && !force_rebuild {
                info!(
                    "Recipe knowledge graph already has {} rows, skipping build",
                    stats.row_count
                );
                self.initialized.store(true, Ordering::SeqCst);
                return Ok(stats.row_count);
            }
            if force_rebuild {
                info!("Force rebuilding recipe knowledge graph");
                self.store.drop_collection(RECIPE_GRAPH_COLLECTION)?;
            }
        }

        let recipes = self.load_records();
        if recipes.is_empty() {
            warn!("No recipe graph data to load");
            return Ok(0);
        }

        self.store.create_collection(
            RECIPE_GRAPH_COLLECTION,
            self.embedder.dimension(),
            Metric::Cosine,
            "菜品-配料-过敏原知识图谱",
        )?;

        let texts: Vec<String> = recipes.iter().map(Self::recipe_to_text).collect();
        let metadatas: Vec<Metadata> = recipes.iter().map(Self::recipe_to_metadata).collect();

        info!("Embedding {} recipe graph entries", texts.len());
        let vectors = self.embedder.embed_texts(&texts, false, true)?;
        let ids = self
            .store
            .insert(RECIPE_GRAPH_COLLECTION, vectors, texts, Some(metadatas))?;

        self.initialized.store(true, Ordering::SeqCst);
        info!("Recipe knowledge graph built with {} rows", ids.len());
        Ok(ids.len())
    }

    pub fn ensure_initialized(&self) -> bool {
        if self.initialized.load(Ordering::SeqCst) {
            return true;
        }
        let _guard = match self.build_lock.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if self.initialized.load(Ordering::SeqCst) {
            return true;
        }
        match self.build(false) {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("Recipe knowledge graph initialization failed: {e}");
                false
            }
        }
    }

    pub fn search_recipe(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        if !self.ensure_initialized() {
            warn!("Recipe knowledge graph not initialized, returning empty result");
            return Vec::new();
        }

        let query_vector = match self.embedder.embed_text(query, true) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Recipe query embedding failed: {e}");
                return Vec::new();
            }
        };
        match self
            .store
            .search(RECIPE_GRAPH_COLLECTION, &query_vector, top_k, None)
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Recipe knowledge graph search failed: {e}");
                Vec::new()
            }
        }
    }

    fn json_list(meta: &Metadata, key: &str) -> Vec<String> {
        meta.get(key)
            .and_then(|v| v.as_str())
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
    }

    /// Full allergen context across the closest matching recipes
    pub fn get_allergen_context(&self, food_name: &str, top_k: usize) -> AllergenContext {
        let results = self.search_recipe(food_name, top_k);
        let relevant: Vec<&SearchHit> = results
            .iter()
            .filter(|r| r.distance <= CONTEXT_MAX_DISTANCE)
            .collect();
        if relevant.is_empty() {
            return AllergenContext::default();
        }

        let mut context = AllergenContext::default();
        let mut reasoning_parts = Vec::new();
        let mut seen_codes = Vec::new();

        for hit in relevant {
            let dish_name = hit
                .metadata
                .get("dish_name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let allergen_codes = Self::json_list(&hit.metadata, "allergen_codes");
            let direct_codes = Self::json_list(&hit.metadata, "direct_allergen_codes");
            let hidden_codes = Self::json_list(&hit.metadata, "hidden_allergen_codes");
            let ingredients = Self::json_list(&hit.metadata, "ingredients");
            let hidden_notes = hit
                .metadata
                .get("hidden_allergen_notes")
                .and_then(|v| v.as_str())
                .unwrap_or("");

            for code in &allergen_codes {
                if !seen_codes.contains(code) {
                    seen_codes.push(code.clone());
                }
            }
            for code in direct_codes {
                context
                    .direct_allergens
                    .entry(code)
                    .or_insert_with(|| dish_name.clone());
            }
            for code in hidden_codes {
                context
                    .hidden_allergens
                    .entry(code)
                    .or_insert_with(|| dish_name.clone());
            }
            if !hidden_notes.is_empty() {
                reasoning_parts.push(format!("参考菜品[{dish_name}]：{hidden_notes}"));
            }

            context.matched_recipes.push(MatchedRecipe {
                dish_name,
                distance: hit.distance,
                allergen_codes,
                ingredients,
            });
        }

        context.all_allergen_codes = seen_codes;
        if !reasoning_parts.is_empty() {
            context.reasoning_text =
                format!("知识图谱过敏原推理：\n{}", reasoning_parts.join("\n"));
        }
        context
    }

    /// Hidden-allergen hints for the fusion engine. Uses the strict
    /// distance cutoff so only near-exact matches contribute.
    pub fn get_hidden_allergens(&self, food_name: &str) -> Vec<HiddenAllergen> {
        let context = self.get_allergen_context_filtered(food_name, 2, HIDDEN_ALLERGEN_MAX_DISTANCE);
        context
            .hidden_allergens
            .into_iter()
            .map(|(code, source_dish)| HiddenAllergen {
                code,
                source_dish,
                confidence: "medium".to_string(),
            })
            .collect()
    }

    fn get_allergen_context_filtered(
        &self,
        food_name: &str,
        top_k: usize,
        max_distance: f32,
    ) -> AllergenContext {
        let results = self.search_recipe(food_name, top_k);
        if results.iter().all(|r| r.distance > max_distance) {
            return AllergenContext::default();
        }
        // Reuse the aggregation with the tighter cutoff applied first
        let mut context = AllergenContext::default();
        for hit in results.iter().filter(|r| r.distance <= max_distance) {
            let dish_name = hit
                .metadata
                .get("dish_name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            for code in Self::json_list(&hit.metadata, "hidden_allergen_codes") {
                context
                    .hidden_allergens
                    .entry(code)
                    .or_insert_with(|| dish_name.clone());
            }
            for code in Self::json_list(&hit.metadata, "direct_allergen_codes") {
                context
                    .direct_allergens
                    .entry(code)
                    .or_insert_with(|| dish_name.clone());
            }
        }
        context
    }

    pub fn add_recipe(&self, recipe: &RecipeKnowledge) -> Result<String> {
        let text = Self::recipe_to_text(recipe);
        let metadata = Self::recipe_to_metadata(recipe);
        let vector = self.embedder.embed_text(&text, false)?;
        self.store
            .insert_single(RECIPE_GRAPH_COLLECTION, vector, text, Some(metadata))
    }

    pub fn stats(&self) -> crate::rag::types::CollectionStats {
        self.store.collection_stats(RECIPE_GRAPH_COLLECTION)
    }
}
