// src/config.rs - Configuration management for the health hub backend

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub uploads: UploadConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub base_url: String,
    pub api_key: String,
    /// Text model used for intent extraction and plan generation
    pub text_model: String,
    /// Multimodal model used for food analysis, menu recognition
    /// and meal comparison
    pub vision_model: String,
    pub generation_timeout_seconds: u64,
    pub multimodal_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Local path of the ONNX bi-encoder model (embeddings-onnx feature)
    pub model_path: String,
    pub tokenizer_path: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    pub root_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow!("Configuration file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;

        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Falls back to the built-in defaults when no config file exists.
    pub fn load_with_env() -> Result<Self> {
        let config_path =
            std::env::var("HEALTH_HUB_CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HEALTH_HUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("HEALTH_HUB_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(db_url) = std::env::var("HEALTH_HUB_DATABASE_URL") {
            self.database.url = db_url;
        }

        if let Ok(base_url) = std::env::var("HEALTH_HUB_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(api_key) = std::env::var("HEALTH_HUB_LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = std::env::var("HEALTH_HUB_LLM_TEXT_MODEL") {
            self.llm.text_model = model;
        }
        if let Ok(model) = std::env::var("HEALTH_HUB_LLM_VISION_MODEL") {
            self.llm.vision_model = model;
        }

        if let Ok(dir) = std::env::var("HEALTH_HUB_VECTOR_DATA_DIR") {
            self.vector_store.data_dir = dir;
        }
        if let Ok(dir) = std::env::var("HEALTH_HUB_UPLOAD_ROOT") {
            self.uploads.root_dir = dir;
        }

        if let Ok(level) = std::env::var("HEALTH_HUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(secret) = std::env::var("HEALTH_HUB_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }

    pub fn get_server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Invalid server port: {}", self.server.port));
        }
        if self.llm.base_url.is_empty() {
            return Err(anyhow!("LLM base URL is empty"));
        }
        if self.embedding.dimension == 0 {
            return Err(anyhow!("Embedding dimension must be positive"));
        }
        if self.auth.access_token_minutes <= 0 || self.auth.refresh_token_days <= 0 {
            return Err(anyhow!("Token lifetimes must be positive"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            database: DatabaseConfig {
                url: "sqlite:./health_hub.db?mode=rwc".to_string(),
                max_connections: 10,
                connection_timeout_seconds: 30,
            },
            llm: LlmConfig {
                base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
                api_key: String::new(),
                text_model: "qwen-turbo".to_string(),
                vision_model: "doubao-seed-1-6-251015".to_string(),
                generation_timeout_seconds: 30,
                multimodal_timeout_seconds: 60,
            },
            embedding: EmbeddingConfig {
                model_path: "./models/bge-m3/model.onnx".to_string(),
                tokenizer_path: "./models/bge-m3/tokenizer.json".to_string(),
                dimension: 1024,
            },
            vector_store: VectorStoreConfig {
                data_dir: "./data/vector_store".to_string(),
            },
            uploads: UploadConfig {
                root_dir: "./uploads".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "health-hub-dev-secret".to_string(),
                access_token_minutes: 30,
                refresh_token_days: 14,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.embedding.dimension, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.server.port, deserialized.server.port);
        assert_eq!(config.llm.base_url, deserialized.llm.base_url);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("test_config.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8080
cors_origins = ["http://test.com"]

[database]
url = "sqlite::memory:"
max_connections = 5
connection_timeout_seconds = 10

[llm]
base_url = "http://test-llm:8001/v1"
api_key = "test-key"
text_model = "test-text"
vision_model = "test-vision"
generation_timeout_seconds = 10
multimodal_timeout_seconds = 20

[embedding]
model_path = "/tmp/model.onnx"
tokenizer_path = "/tmp/tokenizer.json"
dimension = 1024

[vector_store]
data_dir = "/tmp/vectors"

[uploads]
root_dir = "/tmp/uploads"

[logging]
level = "debug"

[auth]
jwt_secret = "test-secret"
access_token_minutes = 15
refresh_token_days = 7
        "#;

        fs::write(&config_path, config_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.llm.base_url, "http://test-llm:8001/v1");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.auth.access_token_minutes, 15);
    }
}
