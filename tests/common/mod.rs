// tests/common/mod.rs - Shared test harness
//
// Builds the full application state on a scratch directory with the
// deterministic projection embedder and a scripted LLM transport, so no
// test touches the network or a real model.

use async_trait::async_trait;
use health_hub_ai::ai::{ChatTransport, ContentPart};
use health_hub_ai::api::AppState;
use health_hub_ai::config::Config;
use health_hub_ai::core::{CoreError, Result};
use health_hub_ai::database::Database;
use health_hub_ai::rag::ProjectionEmbedder;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// LLM transport that replays scripted responses. Keyed entries match
/// against the request text (needed when calls run concurrently) and win
/// over the FIFO queue; `Err` entries simulate an upstream outage; an
/// exhausted script also fails the call.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    keyed: Mutex<Vec<(String, std::result::Result<String, String>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            keyed: Mutex::new(Vec::new()),
        })
    }

    pub fn push_ok(&self, content: &str) {
        self.responses
            .lock()
            .expect("scripted transport lock")
            .push_back(Ok(content.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.responses
            .lock()
            .expect("scripted transport lock")
            .push_back(Err(message.to_string()));
    }

    /// Respond with `content` to the next request whose text contains `key`
    pub fn push_keyed_ok(&self, key: &str, content: &str) {
        self.keyed
            .lock()
            .expect("scripted transport lock")
            .push((key.to_string(), Ok(content.to_string())));
    }

    pub fn push_keyed_err(&self, key: &str, message: &str) {
        self.keyed
            .lock()
            .expect("scripted transport lock")
            .push((key.to_string(), Err(message.to_string())));
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(
        &self,
        _model: &str,
        parts: &[ContentPart],
        _timeout: Duration,
    ) -> Result<String> {
        let request_text: String = parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::ImageDataUri(_) => None,
            })
            .collect();

        {
            let mut keyed = self.keyed.lock().expect("scripted transport lock");
            if let Some(index) = keyed.iter().position(|(key, _)| request_text.contains(key)) {
                let (_, response) = keyed.remove(index);
                return match response {
                    Ok(content) => Ok(content),
                    Err(message) => Err(CoreError::upstream("llm", message)),
                };
            }
        }

        let next = self
            .responses
            .lock()
            .expect("scripted transport lock")
            .pop_front();
        match next {
            Some(Ok(content)) => Ok(content),
            Some(Err(message)) => Err(CoreError::upstream("llm", message)),
            None => Err(CoreError::upstream("llm", "no scripted response queued")),
        }
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub transport: Arc<ScriptedTransport>,
    // Held so the scratch directory outlives the test
    #[allow(dead_code)]
    pub dir: TempDir,
}

pub async fn setup() -> TestApp {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let mut config = Config::default();
    config.database.url = format!("sqlite:{}/test.db", dir.path().display());
    config.vector_store.data_dir = dir.path().join("vectors").display().to_string();
    config.uploads.root_dir = dir.path().join("uploads").display().to_string();

    let db = Arc::new(
        Database::connect(&config.database.url, 5)
            .await
            .expect("connect scratch database"),
    );
    let transport = ScriptedTransport::new();
    let embedder = Arc::new(ProjectionEmbedder::default());
    let state = AppState::build_with(config, db, embedder, transport.clone())
        .await
        .expect("build app state");

    TestApp {
        state,
        transport,
        dir,
    }
}

/// Register a bare user directly through the database layer
pub async fn create_user(app: &TestApp, nickname: &str) -> i64 {
    app.state
        .db
        .create_user(nickname, "salt$hash")
        .await
        .expect("create user")
        .id
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn days_ago(days: i64) -> String {
    (chrono::Local::now().date_naive() - chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}
