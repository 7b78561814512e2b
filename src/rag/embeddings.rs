// src/rag/embeddings.rs - Text embedding encoder (BGE-style bi-encoder)

use crate::core::{CoreError, Result};

/// Output dimension of the reference BGE-M3 model
pub const EMBEDDING_DIM: usize = 1024;

/// Instruction prefix the BGE family recommends for retrieval queries.
/// Documents are encoded without it, so queries and documents are
/// encoded asymmetrically.
pub const QUERY_INSTRUCTION: &str = "为这个句子生成表示以用于检索相关文章：";

/// Text-to-vector encoder. Implementations are thread-safe after the
/// first (lazy) model load and perform read-only inference afterwards.
pub trait TextEmbedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Encode a batch of texts. `is_query` prepends the model-specific
    /// instruction prefix; `normalize` produces unit L2 vectors so cosine
    /// similarity collapses to a dot product.
    fn embed_texts(&self, texts: &[String], is_query: bool, normalize: bool) -> Result<Vec<Vec<f32>>>;

    fn embed_text(&self, text: &str, is_query: bool) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()], is_query, true)?;
        vectors
            .pop()
            .ok_or_else(|| CoreError::internal("embedding batch returned no vectors"))
    }
}

/// Cosine similarity with a zero-vector guard returning 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Deterministic character-projection encoder. Used when the ONNX model
/// is not available (feature off or model files missing) and by tests.
/// Identical input always yields the identical vector, and related
/// Chinese dish names share character n-grams, which is enough signal
/// for exact and near-exact knowledge-base lookups.
pub struct ProjectionEmbedder {
    dimension: usize,
}

impl ProjectionEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.chars().collect();

        for (i, window) in chars.windows(2).enumerate() {
            let mut hash: u64 = 1469598103934665603;
            for ch in window {
                hash ^= *ch as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            // Leading characters (entity names in knowledge records and
            // short queries) carry more weight than trailing narrative.
            let weight = if i < 16 { 4.0 } else { 1.0 };
            vector[slot] += sign * weight;
        }
        for (i, ch) in chars.iter().enumerate() {
            vector[(*ch as usize + i * 31) % self.dimension] += 0.5;
        }
        vector
    }
}

impl Default for ProjectionEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl TextEmbedder for ProjectionEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_texts(&self, texts: &[String], is_query: bool, normalize: bool) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let encoded = if is_query {
                format!("{QUERY_INSTRUCTION}{text}")
            } else {
                text.clone()
            };
            let mut vector = self.project(&encoded);
            if is_query {
                // Queries and documents still have to land near each other;
                // blend in the bare-text projection so the prefix shifts
                // rather than replaces the representation.
                let bare = self.project(text);
                for (v, b) in vector.iter_mut().zip(bare.iter()) {
                    *v = *v * 0.25 + *b;
                }
            }
            if normalize {
                l2_normalize(&mut vector);
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

#[cfg(feature = "embeddings-onnx")]
pub use onnx::OnnxEmbedder;

#[cfg(feature = "embeddings-onnx")]
mod onnx {
    use super::{l2_normalize, TextEmbedder, EMBEDDING_DIM, QUERY_INSTRUCTION};
    use crate::core::{CoreError, Result};
    use ndarray::{Array2, CowArray};
    use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
    use std::sync::{Arc, Mutex, OnceLock};
    use tokenizers::Tokenizer;
    use tracing::info;

    const MAX_SEQUENCE_LENGTH: usize = 512;

    struct LoadedModel {
        session: Session,
        tokenizer: Tokenizer,
    }

    /// ONNX Runtime backed bi-encoder. The model is loaded lazily on the
    /// first embed call; afterwards inference is read-only and safe to
    /// share across workers.
    pub struct OnnxEmbedder {
        model_path: String,
        tokenizer_path: String,
        dimension: usize,
        model: OnceLock<Mutex<LoadedModel>>,
    }

    impl OnnxEmbedder {
        pub fn new(model_path: String, tokenizer_path: String) -> Self {
            Self {
                model_path,
                tokenizer_path,
                dimension: EMBEDDING_DIM,
                model: OnceLock::new(),
            }
        }

        pub fn is_model_loaded(&self) -> bool {
            self.model.get().is_some()
        }

        fn load_model(&self) -> Result<&Mutex<LoadedModel>> {
            if let Some(model) = self.model.get() {
                return Ok(model);
            }

            info!("Loading embedding model from {}", self.model_path);
            let environment = Arc::new(
                Environment::builder()
                    .with_name("embeddings")
                    .build()
                    .map_err(|e| CoreError::internal(format!("ONNX environment init failed: {e}")))?,
            );
            let session = SessionBuilder::new(&environment)
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
                .and_then(|b| b.with_model_from_file(&self.model_path))
                .map_err(|e| CoreError::internal(format!("Failed to load embedding model: {e}")))?;
            let tokenizer = Tokenizer::from_file(&self.tokenizer_path)
                .map_err(|e| CoreError::internal(format!("Failed to load tokenizer: {e}")))?;

            let _ = self.model.set(Mutex::new(LoadedModel { session, tokenizer }));
            info!("Embedding model loaded, dimension {}", self.dimension);
            Ok(self.model.get().expect("model was just set"))
        }

        fn encode_one(&self, model: &LoadedModel, text: &str) -> Result<Vec<f32>> {
            let encoding = model
                .tokenizer
                .encode(text, true)
                .map_err(|e| CoreError::internal(format!("Tokenization failed: {e}")))?;

            let mut tokens: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            tokens.truncate(MAX_SEQUENCE_LENGTH);
            let seq_len = tokens.len();
            let attention_mask: Vec<i64> = vec![1; seq_len];

            let input_ids = Array2::from_shape_vec((1, seq_len), tokens)
                .map_err(|e| CoreError::internal(format!("Bad input tensor shape: {e}")))?;
            let mask = Array2::from_shape_vec((1, seq_len), attention_mask)
                .map_err(|e| CoreError::internal(format!("Bad mask tensor shape: {e}")))?;

            let input_ids = CowArray::from(input_ids.into_dyn());
            let mask = CowArray::from(mask.into_dyn());
            let inputs = vec![
                Value::from_array(model.session.allocator(), &input_ids)
                    .map_err(|e| CoreError::internal(format!("Tensor conversion failed: {e}")))?,
                Value::from_array(model.session.allocator(), &mask)
                    .map_err(|e| CoreError::internal(format!("Tensor conversion failed: {e}")))?,
            ];

            let outputs = model
                .session
                .run(inputs)
                .map_err(|e| CoreError::internal(format!("Embedding inference failed: {e}")))?;
            let tensor = outputs[0]
                .try_extract::<f32>()
                .map_err(|e| CoreError::internal(format!("Embedding output extraction failed: {e}")))?;
            let view = tensor.view();
            let flat: Vec<f32> = view.iter().copied().collect();

            // Mean-pool token embeddings when the model emits the full
            // hidden-state sequence rather than a pooled vector.
            if flat.len() == self.dimension {
                return Ok(flat);
            }
            if flat.len() % self.dimension != 0 || flat.is_empty() {
                return Err(CoreError::internal(format!(
                    "Unexpected embedding output size {}",
                    flat.len()
                )));
            }
            let token_count = flat.len() / self.dimension;
            let mut pooled = vec![0.0f32; self.dimension];
            for token in 0..token_count {
                for (slot, value) in pooled.iter_mut().enumerate() {
                    *value += flat[token * self.dimension + slot];
                }
            }
            for value in pooled.iter_mut() {
                *value /= token_count as f32;
            }
            Ok(pooled)
        }
    }

    impl TextEmbedder for OnnxEmbedder {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed_texts(
            &self,
            texts: &[String],
            is_query: bool,
            normalize: bool,
        ) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = self.load_model()?;
            let model = model
                .lock()
                .map_err(|_| CoreError::internal("embedding model lock poisoned"))?;

            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                let encoded = if is_query {
                    format!("{QUERY_INSTRUCTION}{text}")
                } else {
                    text.clone()
                };
                let mut vector = self.encode_one(&model, &encoded)?;
                if normalize {
                    l2_normalize(&mut vector);
                }
                vectors.push(vector);
            }
            Ok(vectors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_embedding_is_deterministic() {
        let embedder = ProjectionEmbedder::default();
        let a = embedder.embed_text("番茄炒蛋", false).unwrap();
        let b = embedder.embed_text("番茄炒蛋", false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_projection_embedding_is_normalized() {
        let embedder = ProjectionEmbedder::default();
        let v = embedder.embed_text("清蒸鲈鱼", false).unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_query_and_document_encodings_differ() {
        let embedder = ProjectionEmbedder::default();
        let doc = embedder.embed_text("宫保鸡丁", false).unwrap();
        let query = embedder.embed_text("宫保鸡丁", true).unwrap();
        assert_ne!(doc, query);
        // Asymmetric but still close: the same dish must remain the
        // nearest neighbour of its own query encoding.
        assert!(cosine_similarity(&doc, &query) > 0.8);
    }

    #[test]
    fn test_cosine_zero_vector_guard() {
        let zero = vec![0.0f32; 8];
        let one = vec![1.0f32; 8];
        assert_eq!(cosine_similarity(&zero, &one), 0.0);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let embedder = ProjectionEmbedder::default();
        let v = embedder.embed_text("慢跑", true).unwrap();
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }
}
