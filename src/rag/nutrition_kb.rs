// src/rag/nutrition_kb.rs - Chinese food composition knowledge base

use crate::core::Result;
use crate::rag::embeddings::TextEmbedder;
use crate::rag::types::{FoodKnowledge, Metadata, SearchHit};
use crate::rag::vector_store::{Metric, VectorStore};
use crate::sample_data;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const NUTRITION_COLLECTION: &str = "nutrition_knowledge";

const DEFAULT_TOP_K: usize = 3;
/// Cosine-distance cutoff beyond which retrieved entries are considered
/// unrelated and excluded from the prompt context
const DEFAULT_MAX_DISTANCE: f32 = 1.5;

/// Nutrition knowledge base: loads the food composition table into the
/// vector store and serves distance-filtered context for prompts.
pub struct NutritionKb {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<VectorStore>,
    data_file: Option<PathBuf>,
    initialized: AtomicBool,
    build_lock: Mutex<()>,
}

impl NutritionKb {
    pub fn new(embedder: Arc<dyn TextEmbedder>, store: Arc<VectorStore>) -> Self {
        Self {
            embedder,
            store,
            data_file: None,
            initialized: AtomicBool::new(false),
            build_lock: Mutex::new(()),
        }
    }

    /// Replace the built-in dataset with a JSON file of FoodKnowledge rows
    pub fn with_data_file(mut self, path: PathBuf) -> Self {
        self.data_file = Some(path);
        self
    }

    fn load_records(&self) -> Vec<FoodKnowledge> {
        if let Some(path) = &self.data_file {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<Vec<FoodKnowledge>>(&raw).map_err(|e| e.to_string()))
            {
                Ok(records) => {
                    info!("Loaded {} nutrition records from {:?}", records.len(), path);
                    return records;
                }
                Err(e) => warn!("Failed to load nutrition data file {:?}: {}", path, e),
            }
        }
        sample_data::builtin_foods()
    }

    /// Retrieval-friendly structured text for one food entry
    fn food_to_text(food: &FoodKnowledge) -> String {
        let mut parts = vec![format!("食物名称：{}", food.food_name)];
        if !food.aliases.is_empty() {
            parts.push(format!("别名：{}", food.aliases.join("、")));
        }
        if !food.category.is_empty() {
            parts.push(format!("分类：{}", food.category));
        }
        let n = &food.per_100g;
        parts.push(format!(
            "每100g营养成分：热量{}千卡，蛋白质{}g，脂肪{}g，碳水化合物{}g，膳食纤维{}g，钠{}mg",
            n.calories, n.protein, n.fat, n.carbs, n.fiber, n.sodium
        ));
        if !food.common_serving.is_empty() {
            parts.push(format!("常见份量：{}", food.common_serving));
        }
        if !food.cooking_notes.is_empty() {
            parts.push(format!("备注：{}", food.cooking_notes));
        }
        parts.join("。")
    }

    fn food_to_metadata(food: &FoodKnowledge) -> Metadata {
        let n = &food.per_100g;
        let mut meta = Metadata::new();
        meta.insert("food_name".into(), food.food_name.clone().into());
        meta.insert("category".into(), food.category.clone().into());
        meta.insert("calories".into(), n.calories.into());
        meta.insert("protein".into(), n.protein.into());
        meta.insert("fat".into(), n.fat.into());
        meta.insert("carbs".into(), n.carbs.into());
        meta.insert("fiber".into(), n.fiber.into());
        meta.insert("sodium".into(), n.sodium.into());
        meta.insert("common_serving".into(), food.common_serving.clone().into());
        meta.insert("cooking_notes".into(), food.cooking_notes.clone().into());
        meta
    }

    /// Build the knowledge base. Idempotent: an already-populated
    /// collection is left alone unless `force_rebuild` is set.
    pub fn build(&self, force_rebuild: bool) -> Result<usize> {
        if self.store.has_collection(NUTRITION_COLLECTION) {
            let stats = self.store.collection_stats(NUTRITION_COLLECTION);
            if stats.row_count > 0 && !force_rebuild {
                info!(
                    "Nutrition knowledge base already has {} rows, skipping build",
                    stats.row_count
                );
                self.initialized.store(true, Ordering::SeqCst);
                return Ok(stats.row_count);
            }
            if force_rebuild {
                info!("Force rebuilding nutrition knowledge base");
                self.store.drop_collection(NUTRITION_COLLECTION)?;
            }
        }

        let foods = self.load_records();
        if foods.is_empty() {
            warn!("No nutrition knowledge data to load");
            return Ok(0);
        }

        self.store.create_collection(
            NUTRITION_COLLECTION,
            self.embedder.dimension(),
            Metric::Cosine,
            "中国食物成分表营养知识库",
        )?;

        let texts: Vec<String> = foods.iter().map(Self::food_to_text).collect();
        let metadatas: Vec<Metadata> = foods.iter().map(Self::food_to_metadata).collect();

        info!("Embedding {} nutrition knowledge entries", texts.len());
        let vectors = self.embedder.embed_texts(&texts, false, true)?;
        let ids = self
            .store
            .insert(NUTRITION_COLLECTION, vectors, texts, Some(metadatas))?;

        self.initialized.store(true, Ordering::SeqCst);
        info!("Nutrition knowledge base built with {} rows", ids.len());
        Ok(ids.len())
    }

    /// Build on first call; concurrent first-callers perform one build.
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
                warn!("Nutrition knowledge base initialization failed: {e}");
                false
            }
        }
    }

    /// Retrieve the top-k entries for a dish name. Returns an empty list
    /// on any failure so callers degrade gracefully.
    pub fn search_nutrition(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        if !self.ensure_initialized() {
            warn!("Nutrition knowledge base not initialized, returning empty result");
            return Vec::new();
        }

        let query_vector = match self.embedder.embed_text(query, true) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Nutrition query embedding failed: {e}");
                return Vec::new();
            }
        };
        match self.store.search(NUTRITION_COLLECTION, &query_vector, top_k, None) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Nutrition knowledge search failed: {e}");
                Vec::new()
            }
        }
    }

    /// Formatted prompt context for the given dish. Empty string when no
    /// sufficiently-close entries exist; callers must tolerate that.
    pub fn get_nutrition_context(&self, food_name: &str) -> String {
        self.get_nutrition_context_with(food_name, DEFAULT_TOP_K, DEFAULT_MAX_DISTANCE)
    }

    pub fn get_nutrition_context_with(
        &self,
        food_name: &str,
        top_k: usize,
        max_distance: f32,
    ) -> String {
        let results = self.search_nutrition(food_name, top_k);
        let relevant: Vec<&SearchHit> =
            results.iter().filter(|r| r.distance <= max_distance).collect();
        if relevant.is_empty() {
            return String::new();
        }

        let mut parts = vec!["以下是《中国食物成分表》中的相关参考数据：".to_string()];
        for (i, hit) in relevant.iter().enumerate() {
            let get_str = |key: &str| {
                hit.metadata
                    .get(key)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            let get_num = |key: &str| hit.metadata.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);

            let mut entry = format!(
                "\n参考{}：{}\n  每100g：热量{}千卡，蛋白质{}g，脂肪{}g，碳水{}g，膳食纤维{}g，钠{}mg",
                i + 1,
                get_str("food_name"),
                get_num("calories"),
                get_num("protein"),
                get_num("fat"),
                get_num("carbs"),
                get_num("fiber"),
                get_num("sodium"),
            );
            let serving = get_str("common_serving");
            if !serving.is_empty() {
                entry.push_str(&format!("\n  常见份量：{serving}"));
            }
            let notes = get_str("cooking_notes");
            if !notes.is_empty() {
                entry.push_str(&format!("\n  备注：{notes}"));
            }
            parts.push(entry);
        }
        parts.push(
            "\n请参考以上数据给出准确的营养分析。如果查询的菜品与参考数据不完全匹配，\
             请根据参考数据进行合理估算，但不要编造不存在的数据。"
                .to_string(),
        );
        parts.join("\n")
    }

    /// Incrementally add one food entry
    pub fn add_food(&self, food: &FoodKnowledge) -> Result<String> {
        let text = Self::food_to_text(food);
        let metadata = Self::food_to_metadata(food);
        let vector = self.embedder.embed_text(&text, false)?;
        self.store
            .insert_single(NUTRITION_COLLECTION, vector, text, Some(metadata))
    }

    pub fn stats(&self) -> crate::rag::types::CollectionStats {
        self.store.collection_stats(NUTRITION_COLLECTION)
    }
}
