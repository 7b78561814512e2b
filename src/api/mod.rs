// src/api/mod.rs - HTTP boundary: state, response envelope, routing

pub mod exercise;
pub mod food;
pub mod stats;
pub mod user;

use crate::ai::{
    AiClient, AiLogService, ChatTransport, MealComparisonService, MenuAnalyzer, NutritionAnalyzer,
    TripPlanner,
};
use crate::allergen::AllergenService;
use crate::auth::AuthService;
use crate::config::Config;
use crate::core::CoreError;
use crate::database::Database;
use crate::mets::MetsService;
use crate::rag::{ExerciseKb, NutritionKb, ProjectionEmbedder, RecipeGraphKb, TextEmbedder, VectorStore};
use crate::recommend::RecommendationService;
use crate::stats::StatsService;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Uniform `{code, message, data}` envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "成功".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// CoreError carried across the handler boundary; maps the error kind to
/// an HTTP-like status and the envelope.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ApiResponse::<()> {
            code,
            message: self.0.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
    pub ai_log: Arc<AiLogService>,
    pub nutrition_kb: Arc<NutritionKb>,
    pub recipe_graph: Arc<RecipeGraphKb>,
    pub exercise_kb: Arc<ExerciseKb>,
    pub nutrition_analyzer: Arc<NutritionAnalyzer>,
    pub menu_analyzer: Arc<MenuAnalyzer>,
    pub meal_service: Arc<MealComparisonService>,
    pub trip_planner: Arc<TripPlanner>,
    pub allergen: Arc<AllergenService>,
    pub mets: Arc<MetsService>,
    pub stats: Arc<StatsService>,
    pub recommend: Arc<RecommendationService>,
}

impl AppState {
    /// Wire every service onto the shared singletons. The embedder falls
    /// back to the deterministic projection encoder when the ONNX model
    /// is unavailable.
    pub async fn build(config: Config, db: Arc<Database>) -> crate::core::Result<Arc<Self>> {
        let embedder = build_embedder(&config);
        let transport = Arc::new(crate::ai::HttpChatTransport::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
        ));
        Self::build_with(config, db, embedder, transport).await
    }

    /// Variant with injectable embedder and LLM transport (used by tests)
    pub async fn build_with(
        config: Config,
        db: Arc<Database>,
        embedder: Arc<dyn TextEmbedder>,
        transport: Arc<dyn ChatTransport>,
    ) -> crate::core::Result<Arc<Self>> {
        let store = Arc::new(VectorStore::new(&config.vector_store.data_dir));
        let nutrition_kb = Arc::new(NutritionKb::new(Arc::clone(&embedder), Arc::clone(&store)));
        let recipe_graph = Arc::new(RecipeGraphKb::new(Arc::clone(&embedder), Arc::clone(&store)));
        let exercise_kb = Arc::new(ExerciseKb::new(Arc::clone(&embedder), Arc::clone(&store)));

        let ai_log = Arc::new(AiLogService::new(db.pool().clone()));
        let ai_client = Arc::new(AiClient::new(
            transport,
            config.llm.clone(),
            Arc::clone(&ai_log),
        ));

        let nutrition_analyzer = Arc::new(NutritionAnalyzer::new(
            Arc::clone(&ai_client),
            Arc::clone(&nutrition_kb),
        ));
        let menu_analyzer = Arc::new(MenuAnalyzer::new(
            Arc::clone(&ai_client),
            Arc::clone(&nutrition_analyzer),
        ));
        let meal_service = Arc::new(MealComparisonService::new(
            Arc::clone(&ai_client),
            Arc::clone(&db),
            PathBuf::from(&config.uploads.root_dir),
        ));
        let mets = Arc::new(MetsService::with_exercise_kb(Arc::clone(&exercise_kb)));
        let trip_planner = Arc::new(TripPlanner::new(Arc::clone(&ai_client), Arc::clone(&mets)));
        let stats = Arc::new(StatsService::new(Arc::clone(&db)));
        let recommend = Arc::new(RecommendationService::new(Arc::clone(&db)));
        let auth = Arc::new(AuthService::new(&config.auth));

        Ok(Arc::new(Self {
            config,
            db,
            auth,
            ai_log,
            nutrition_kb,
            recipe_graph,
            exercise_kb,
            nutrition_analyzer,
            menu_analyzer,
            meal_service,
            trip_planner,
            allergen: Arc::new(AllergenService::new()),
            mets,
            stats,
            recommend,
        }))
    }
}

#[cfg(feature = "embeddings-onnx")]
fn build_embedder(config: &Config) -> Arc<dyn TextEmbedder> {
    if std::path::Path::new(&config.embedding.model_path).exists() {
        Arc::new(crate::rag::OnnxEmbedder::new(
            config.embedding.model_path.clone(),
            config.embedding.tokenizer_path.clone(),
        ))
    } else {
        tracing::warn!(
            "Embedding model not found at {}, using projection encoder",
            config.embedding.model_path
        );
        Arc::new(ProjectionEmbedder::new(config.embedding.dimension))
    }
}

#[cfg(not(feature = "embeddings-onnx"))]
fn build_embedder(config: &Config) -> Arc<dyn TextEmbedder> {
    Arc::new(ProjectionEmbedder::new(config.embedding.dimension))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Food and nutrition
        .route("/api/food/analyze", post(food::analyze_food))
        .route("/api/food/recognize", post(food::recognize_menu))
        .route("/api/food/latest-recognition", get(food::latest_recognition))
        .route("/api/food/record", post(food::add_diet_record))
        .route("/api/food/records", get(food::get_diet_records))
        .route("/api/food/records/today", get(food::get_today_diet_records))
        .route("/api/food/diet/:record_id", put(food::update_diet_record))
        .route("/api/food/diet/:record_id", delete(food::delete_diet_record))
        .route("/api/food/allergen/check", post(food::check_allergens))
        .route("/api/food/allergen/categories", get(food::allergen_categories))
        .route("/api/food/meal/before", post(food::meal_before))
        .route("/api/food/meal/after/:comparison_id", post(food::meal_after))
        .route("/api/food/meal/adjust/:comparison_id", post(food::meal_adjust))
        .route("/api/food/recommend", get(food::recommend_foods))
        // Trips and exercise
        .route("/api/trip/generate", post(exercise::generate_trip))
        .route("/api/trip/list", get(exercise::list_trips))
        .route("/api/trip/recent", get(exercise::recent_trips))
        .route("/api/trip/home", get(exercise::home_trips))
        .route("/api/trip/:trip_id", get(exercise::get_trip))
        .route("/api/exercise/record", post(exercise::create_record))
        .route("/api/exercise/records", get(exercise::list_records))
        .route("/api/exercise/record/:record_id", get(exercise::get_record))
        .route("/api/exercise/record/:record_id", delete(exercise::delete_record))
        // Stats
        .route("/api/stats/calories/daily", get(stats::daily_calories))
        .route("/api/stats/calories/weekly", get(stats::weekly_calories))
        .route("/api/stats/nutrients/daily", get(stats::daily_nutrients))
        .route("/api/stats/goal-progress", get(stats::goal_progress))
        .route("/api/stats/exercise-frequency", get(stats::exercise_frequency))
        // User and lifecycle
        .route("/api/user/register", post(user::register))
        .route("/api/user/login", post(user::login))
        .route("/api/user/refresh", post(user::refresh))
        .route("/api/user/me", get(user::me))
        .route("/api/user/preferences", get(user::get_preferences))
        .route("/api/user/preferences", put(user::update_preferences))
        .route("/api/user/data", delete(user::forget_me))
        .route("/api/user/ai-logs", get(user::ai_logs))
        .route("/api/user/ai-logs/stats", get(user::ai_log_stats))
        .with_state(state)
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(CorsLayer::permissive())
}
