// src/rag/exercise_kb.rs - Exercise METs knowledge base

use crate::core::Result;
use crate::rag::embeddings::TextEmbedder;
use crate::rag::types::{ExerciseKnowledge, Metadata, SearchHit};
use crate::rag::vector_store::{Metric, VectorStore};
use crate::sample_data;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const EXERCISE_COLLECTION: &str = "exercise_knowledge";

const LOOKUP_MAX_DISTANCE: f32 = 1.5;

/// Best METs match found through vector retrieval
#[derive(Debug, Clone, Serialize)]
pub struct MetsLookup {
    pub exercise_name: String,
    pub mets: f64,
    pub intensity: String,
    pub distance: f32,
}

pub struct ExerciseKb {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<VectorStore>,
    data_file: Option<PathBuf>,
    initialized: AtomicBool,
    build_lock: Mutex<()>,
}

impl ExerciseKb {
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

    fn load_records(&self) -> Vec<ExerciseKnowledge> {
        if let Some(path) = &self.data_file {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<Vec<ExerciseKnowledge>>(&raw).map_err(|e| e.to_string())
                }) {
                Ok(records) => {
                    info!("Loaded {} exercise records from {:?}", records.len(), path);
                    return records;
                }
                Err(e) => warn!("Failed to load exercise data file {:?}: {}", path, e),
            }
        }
        sample_data::builtin_exercises()
    }

    fn exercise_to_text(exercise: &ExerciseKnowledge) -> String {
        let intensity_cn = match exercise.intensity.as_str() {
            "light" => "低强度",
            "moderate" => "中等强度",
            "vigorous" => "高强度",
            other => other,
        };
        let mut parts = vec![format!("运动名称：{}", exercise.exercise_name)];
        if !exercise.aliases.is_empty() {
            parts.push(format!("别名：{}", exercise.aliases.join("、")));
        }
        if !exercise.category.is_empty() {
            parts.push(format!("分类：{}", exercise.category));
        }
        parts.push(format!("METs值：{}", exercise.mets));
        parts.push(format!("强度：{intensity_cn}"));
        if !exercise.description.is_empty() {
            parts.push(format!("描述：{}", exercise.description));
        }
        parts.join("。")
    }

    fn exercise_to_metadata(exercise: &ExerciseKnowledge) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert(
            "exercise_name".into(),
            exercise.exercise_name.clone().into(),
        );
        meta.insert(
            "aliases".into(),
            serde_json::Value::String(
                serde_json::to_string(&exercise.aliases).unwrap_or_else(|_| "[]".into()),
            ),
        );
        meta.insert("category".into(), exercise.category.clone().into());
        meta.insert("mets".into(), exercise.mets.into());
        meta.insert("intensity".into(), exercise.intensity.clone().into());
        meta.insert("description".into(), exercise.description.clone().into());
        meta
    }

    pub fn build(&self, force_rebuild: bool) -> Result<usize> {
        if self.store.has_collection(EXERCISE_COLLECTION) {
            let stats = self.store.collection_stats(EXERCISE_COLLECTION);
            if stats.row_count > 0 && !force_rebuild {
                info!(
                    "Exercise knowledge base already has {} rows, skipping build",
                    stats.row_count
                );
                self.initialized.store(true, Ordering::SeqCst);
                return Ok(stats.row_count);
            }
            if force_rebuild {
                info!("Force rebuilding exercise knowledge base");
                self.store.drop_collection(EXERCISE_COLLECTION)?;
            }
        }

        let exercises = self.load_records();
        if exercises.is_empty() {
            warn!("No exercise knowledge data to load");
            return Ok(0);
        }

        self.store.create_collection(
            EXERCISE_COLLECTION,
            self.embedder.dimension(),
            Metric::Cosine,
            "运动代谢当量知识库",
        )?;

        let texts: Vec<String> = exercises.iter().map(Self::exercise_to_text).collect();
        let metadatas: Vec<Metadata> = exercises.iter().map(Self::exercise_to_metadata).collect();

        info!("Embedding {} exercise knowledge entries", texts.len());
        let vectors = self.embedder.embed_texts(&texts, false, true)?;
        let ids = self
            .store
            .insert(EXERCISE_COLLECTION, vectors, texts, Some(metadatas))?;

        self.initialized.store(true, Ordering::SeqCst);
        info!("Exercise knowledge base built with {} rows", ids.len());
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
                warn!("Exercise knowledge base initialization failed: {e}");
                false
            }
        }
    }

    pub fn search_exercise(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        if !self.ensure_initialized() {
            return Vec::new();
        }
        let query_vector = match self.embedder.embed_text(query, true) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Exercise query embedding failed: {e}");
                return Vec::new();
            }
        };
        match self
            .store
            .search(EXERCISE_COLLECTION, &query_vector, top_k, None)
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Exercise knowledge search failed: {e}");
                Vec::new()
            }
        }
    }

    /// METs lookup through the knowledge base, widening coverage beyond
    /// the built-in calculator table. None when nothing is close enough.
    pub fn lookup_mets(&self, query: &str) -> Option<MetsLookup> {
        let hits = self.search_exercise(query, 1);
        let hit = hits.first()?;
        if hit.distance > LOOKUP_MAX_DISTANCE {
            return None;
        }
        let mets = hit.metadata.get("mets").and_then(|v| v.as_f64())?;
        Some(MetsLookup {
            exercise_name: hit
                .metadata
                .get("exercise_name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            mets,
            intensity: hit
                .metadata
                .get("intensity")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            distance: hit.distance,
        })
    }

    pub fn add_exercise(&self, exercise: &ExerciseKnowledge) -> Result<String> {
        let text = Self::exercise_to_text(exercise);
        let metadata = Self::exercise_to_metadata(exercise);
        let vector = self.embedder.embed_text(&text, false)?;
        self.store
            .insert_single(EXERCISE_COLLECTION, vector, text, Some(metadata))
    }

    pub fn stats(&self) -> crate::rag::types::CollectionStats {
        self.store.collection_stats(EXERCISE_COLLECTION)
    }
}
