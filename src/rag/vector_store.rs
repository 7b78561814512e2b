// src/rag/vector_store.rs - Embedded vector store with local-file persistence

use crate::core::{CoreError, Result};
use crate::rag::types::{CollectionStats, Metadata, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Similarity metric of a collection. Distances are always returned in
/// "smaller is more similar" form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    L2,
    Ip,
}

impl Metric {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "l2" => Self::L2,
            "ip" => Self::Ip,
            _ => Self::Cosine,
        }
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - super::embeddings::cosine_similarity(a, b),
            Self::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::Ip => 1.0 - a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    vector: Vec<f32>,
    text: String,
    metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection {
    name: String,
    dimension: usize,
    metric: Metric,
    description: String,
    records: Vec<StoredRecord>,
}

/// Embedded vector store. Collections persist as JSON files under a local
/// data directory and are loaded on first access; all writes rewrite the
/// collection file under the store-wide lock, so concurrent readers are
/// safe and writers are serialized.
pub struct VectorStore {
    data_dir: PathBuf,
    collections: RwLock<Option<HashMap<String, Collection>>>,
}

impl VectorStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            collections: RwLock::new(None),
        }
    }

    /// Load all persisted collections on first use (lazy open). Close is
    /// idempotent; any call after close transparently reopens.
    fn ensure_open(&self) -> Result<()> {
        {
            let guard = self
                .collections
                .read()
                .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
            if guard.is_some() {
                return Ok(());
            }
        }

        let mut loaded = HashMap::new();
        if self.data_dir.exists() {
            for entry in std::fs::read_dir(&self.data_dir)
                .map_err(|e| CoreError::internal(format!("Failed to read vector store dir: {e}")))?
            {
                let entry = entry.map_err(|e| CoreError::internal(e.to_string()))?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|raw| serde_json::from_str::<Collection>(&raw).map_err(|e| e.to_string()))
                {
                    Ok(collection) => {
                        loaded.insert(collection.name.clone(), collection);
                    }
                    Err(e) => warn!("Skipping unreadable collection file {:?}: {}", path, e),
                }
            }
        } else {
            std::fs::create_dir_all(&self.data_dir)
                .map_err(|e| CoreError::internal(format!("Failed to create vector store dir: {e}")))?;
        }

        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        if guard.is_none() {
            info!(
                "Vector store opened at {:?} with {} collections",
                self.data_dir,
                loaded.len()
            );
            *guard = Some(loaded);
        }
        Ok(())
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    fn persist(&self, collection: &Collection) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| CoreError::internal(format!("Failed to create vector store dir: {e}")))?;
        let raw = serde_json::to_string(collection)?;
        std::fs::write(self.collection_path(&collection.name), raw)
            .map_err(|e| CoreError::internal(format!("Failed to persist collection: {e}")))?;
        Ok(())
    }

    /// Create a collection; creating an existing one is a no-op.
    pub fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: Metric,
        description: &str,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_mut().expect("store opened above");

        if collections.contains_key(name) {
            return Ok(());
        }

        let collection = Collection {
            name: name.to_string(),
            dimension,
            metric,
            description: description.to_string(),
            records: Vec::new(),
        };
        self.persist(&collection)?;
        info!("Created collection {name} (dim {dimension}, {metric:?})");
        collections.insert(name.to_string(), collection);
        Ok(())
    }

    /// Drop a collection; tolerates non-existence.
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_mut().expect("store opened above");

        if collections.remove(name).is_none() {
            return Ok(());
        }
        let path = self.collection_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::internal(format!("Failed to remove collection file: {e}")))?;
        }
        info!("Dropped collection {name}");
        Ok(())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        if self.ensure_open().is_err() {
            return false;
        }
        self.collections
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.contains_key(name)))
            .unwrap_or(false)
    }

    pub fn list_collections(&self) -> Vec<String> {
        if self.ensure_open().is_err() {
            return Vec::new();
        }
        let guard = match self.collections.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = guard
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Batch insert. Lengths of vectors/texts/metadatas must agree; ids
    /// are freshly generated UUIDs. Non-scalar metadata values are
    /// JSON-serialized to strings.
    pub fn insert(
        &self,
        name: &str,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        if vectors.len() != texts.len() {
            return Err(CoreError::validation(format!(
                "vector count ({}) does not match text count ({})",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(metas) = &metadatas {
            if metas.len() != vectors.len() {
                return Err(CoreError::validation(format!(
                    "metadata count ({}) does not match vector count ({})",
                    metas.len(),
                    vectors.len()
                )));
            }
        }

        self.ensure_open()?;
        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_mut().expect("store opened above");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| CoreError::not_found(format!("collection {name} does not exist")))?;

        let count = vectors.len();
        let mut ids = Vec::with_capacity(count);
        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); count]);
        for ((vector, text), metadata) in vectors.into_iter().zip(texts).zip(metadatas) {
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            collection.records.push(StoredRecord {
                id,
                vector,
                text,
                metadata: flatten_metadata(metadata),
            });
        }
        self.persist(collection)?;
        info!("Inserted {count} records into {name}");
        Ok(ids)
    }

    pub fn insert_single(
        &self,
        name: &str,
        vector: Vec<f32>,
        text: String,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        let ids = self.insert(name, vec![vector], vec![text], metadata.map(|m| vec![m]))?;
        Ok(ids.into_iter().next().unwrap_or_default())
    }

    /// Top-k similarity search, ordered by ascending distance. `filter`
    /// restricts candidates by metadata equality.
    pub fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_open()?;
        let guard = self
            .collections
            .read()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_ref().expect("store opened above");
        let collection = collections
            .get(name)
            .ok_or_else(|| CoreError::not_found(format!("collection {name} does not exist")))?;

        let mut hits: Vec<SearchHit> = collection
            .records
            .iter()
            .filter(|record| match filter {
                Some(conditions) => conditions
                    .iter()
                    .all(|(key, value)| record.metadata.get(key) == Some(value)),
                None => true,
            })
            .map(|record| SearchHit {
                id: record.id.clone(),
                distance: collection.metric.distance(query_vector, &record.vector),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    pub fn delete_by_ids(&self, name: &str, ids: &[String]) -> Result<usize> {
        self.ensure_open()?;
        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_mut().expect("store opened above");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| CoreError::not_found(format!("collection {name} does not exist")))?;

        let before = collection.records.len();
        collection.records.retain(|record| !ids.contains(&record.id));
        let removed = before - collection.records.len();
        if removed > 0 {
            self.persist(collection)?;
        }
        Ok(removed)
    }

    pub fn delete_by_filter(&self, name: &str, filter: &Metadata) -> Result<usize> {
        self.ensure_open()?;
        let mut guard = self
            .collections
            .write()
            .map_err(|_| CoreError::internal("vector store lock poisoned"))?;
        let collections = guard.as_mut().expect("store opened above");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| CoreError::not_found(format!("collection {name} does not exist")))?;

        let before = collection.records.len();
        collection.records.retain(|record| {
            !filter
                .iter()
                .all(|(key, value)| record.metadata.get(key) == Some(value))
        });
        let removed = before - collection.records.len();
        if removed > 0 {
            self.persist(collection)?;
        }
        Ok(removed)
    }

    pub fn collection_stats(&self, name: &str) -> CollectionStats {
        if self.ensure_open().is_err() {
            return CollectionStats {
                exists: false,
                row_count: 0,
            };
        }
        let guard = match self.collections.read() {
            Ok(guard) => guard,
            Err(_) => {
                return CollectionStats {
                    exists: false,
                    row_count: 0,
                }
            }
        };
        match guard.as_ref().and_then(|c| c.get(name)) {
            Some(collection) => CollectionStats {
                exists: true,
                row_count: collection.records.len(),
            },
            None => CollectionStats {
                exists: false,
                row_count: 0,
            },
        }
    }

    /// Drop the in-memory state; the next call reopens from disk.
    pub fn close(&self) {
        if let Ok(mut guard) = self.collections.write() {
            *guard = None;
        }
    }
}

/// The store admits only scalar metadata values; composite values are
/// serialized to JSON strings, mirroring what callers are expected to do.
fn flatten_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(_)
            | serde_json::Value::Number(_)
            | serde_json::Value::Bool(_) => (key, value),
            other => (
                key,
                serde_json::Value::String(other.to_string()),
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 4, Metric::Cosine, "test")
            .unwrap();
        store
            .create_collection("foods", 4, Metric::Cosine, "test")
            .unwrap();
        assert!(store.has_collection("foods"));
        assert_eq!(store.list_collections(), vec!["foods".to_string()]);
    }

    #[test]
    fn test_drop_tolerates_missing() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store.drop_collection("nope").unwrap();
    }

    #[test]
    fn test_insert_length_mismatch_fails() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 2, Metric::Cosine, "")
            .unwrap();
        let err = store
            .insert("foods", vec![vec![1.0, 0.0]], vec![], None)
            .unwrap_err();
        assert!(matches!(err, crate::core::CoreError::Validation(_)));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 2, Metric::Cosine, "")
            .unwrap();
        store
            .insert(
                "foods",
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
                vec!["a".into(), "b".into(), "c".into()],
                None,
            )
            .unwrap();

        let hits = store.search("foods", &[1.0, 0.0], 3, None).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "a");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[test]
    fn test_duplicate_inserts_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 2, Metric::Cosine, "")
            .unwrap();
        let first = store
            .insert_single("foods", vec![1.0, 0.0], "a".into(), None)
            .unwrap();
        let second = store
            .insert_single("foods", vec![1.0, 0.0], "a".into(), None)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(store.collection_stats("foods").row_count, 2);
    }

    #[test]
    fn test_nested_metadata_is_serialized() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 2, Metric::Cosine, "")
            .unwrap();
        store
            .insert_single(
                "foods",
                vec![1.0, 0.0],
                "a".into(),
                Some(meta(&[("aliases", serde_json::json!(["x", "y"]))])),
            )
            .unwrap();
        let hits = store.search("foods", &[1.0, 0.0], 1, None).unwrap();
        let aliases = hits[0].metadata.get("aliases").unwrap();
        assert!(aliases.is_string());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = VectorStore::new(dir.path());
            store
                .create_collection("foods", 2, Metric::Cosine, "")
                .unwrap();
            store
                .insert_single("foods", vec![0.5, 0.5], "a".into(), None)
                .unwrap();
            store.close();
            store.close(); // close is idempotent
        }
        let store = VectorStore::new(dir.path());
        assert!(store.has_collection("foods"));
        assert_eq!(store.collection_stats("foods").row_count, 1);
    }

    #[test]
    fn test_delete_by_filter() {
        let dir = tempdir().unwrap();
        let store = VectorStore::new(dir.path());
        store
            .create_collection("foods", 2, Metric::Cosine, "")
            .unwrap();
        store
            .insert(
                "foods",
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec!["a".into(), "b".into()],
                Some(vec![
                    meta(&[("category", serde_json::json!("鱼类"))]),
                    meta(&[("category", serde_json::json!("蔬菜"))]),
                ]),
            )
            .unwrap();

        let removed = store
            .delete_by_filter("foods", &meta(&[("category", serde_json::json!("鱼类"))]))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.collection_stats("foods").row_count, 1);
    }
}
