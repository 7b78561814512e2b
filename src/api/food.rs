// src/api/food.rs - Food, allergen and meal-comparison handlers

use crate::api::{ApiError, ApiResponse, ApiResult, AppState};
use crate::core::CoreError;
use crate::models::*;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct AnalyzeFoodRequest {
    pub food_name: String,
}

/// The analyze endpoint keeps its historical `{success, message, data}`
/// envelope.
#[derive(Debug, Serialize)]
pub struct AnalyzeFoodResponse {
    pub success: bool,
    pub message: String,
    pub data: NutritionResult,
}

pub async fn analyze_food(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeFoodRequest>,
) -> Result<Json<AnalyzeFoodResponse>, ApiError> {
    if request.food_name.trim().is_empty() {
        return Err(CoreError::validation("food_name must not be empty").into());
    }
    let data = state.nutrition_analyzer.analyze(&request.food_name).await;
    Ok(Json(AnalyzeFoodResponse {
        success: true,
        message: "分析成功".to_string(),
        data,
    }))
}

struct UploadedImage {
    bytes: Vec<u8>,
    ext: String,
}

/// Pull the image (and optional form fields) out of a multipart body
async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<(Option<UploadedImage>, BTreeMap<String, String>), ApiError> {
    let mut image = None;
    let mut fields = BTreeMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(CoreError::validation(format!("invalid multipart body: {e}"))))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "image" {
            let ext = field
                .file_name()
                .and_then(|f| f.rsplit('.').next().map(|e| e.to_lowercase()))
                .filter(|e| ["jpg", "jpeg", "png", "webp"].contains(&e.as_str()))
                .unwrap_or_else(|| "jpg".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError(CoreError::validation(format!("failed to read image: {e}"))))?;
            image = Some(UploadedImage {
                bytes: bytes.to_vec(),
                ext,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError(CoreError::validation(format!("failed to read field: {e}"))))?;
            fields.insert(name, value);
        }
    }
    Ok((image, fields))
}

fn parse_i64_field(fields: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    fields.get(key).and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Serialize)]
pub struct DishesData {
    pub dishes: Vec<RecognizedDish>,
}

pub async fn recognize_menu(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<DishesData> {
    let (image, fields) = read_multipart(&mut multipart).await?;
    let image = image.ok_or_else(|| ApiError(CoreError::validation("image file is required")))?;
    let user_id = parse_i64_field(&fields, "userId");

    let health_goal = match user_id {
        Some(user_id) => state
            .db
            .get_user(user_id)
            .await?
            .map(|user| user.health_goal),
        None => None,
    };

    let dishes = state
        .menu_analyzer
        .recognize(&image.bytes, health_goal, user_id)
        .await?;

    // Persist when a user is attached; a failed save never fails the
    // recognition response.
    if let Some(user_id) = user_id {
        match serde_json::to_string(&dishes) {
            Ok(dishes_json) => {
                if let Err(e) = state.db.save_menu_recognition(user_id, &dishes_json).await {
                    warn!("Failed to save menu recognition: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize recognition result: {e}"),
        }
    }

    Ok(Json(ApiResponse::ok_with_message("识别成功", DishesData { dishes })))
}

#[derive(Debug, Deserialize)]
pub struct LatestRecognitionQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
}

pub async fn latest_recognition(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestRecognitionQuery>,
) -> ApiResult<DishesData> {
    match state.db.latest_menu_recognition(query.user_id).await? {
        Some(dishes_json) => {
            let dishes: Vec<RecognizedDish> =
                serde_json::from_str(&dishes_json).unwrap_or_default();
            Ok(Json(ApiResponse::ok_with_message("获取成功", DishesData { dishes })))
        }
        None => Ok(Json(ApiResponse {
            code: 404,
            message: "未找到识别记录".to_string(),
            data: Some(DishesData { dishes: Vec::new() }),
        })),
    }
}

pub async fn add_diet_record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddDietRecordRequest>,
) -> ApiResult<DietRecord> {
    let record = state.db.add_diet_record(&request).await?;
    Ok(Json(ApiResponse::ok_with_message("记录成功", record)))
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
}

pub async fn get_diet_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<BTreeMap<String, Vec<DietRecord>>> {
    let grouped = state.db.diet_records_by_date(query.user_id).await?;
    Ok(Json(ApiResponse::ok_with_message("获取成功", grouped)))
}

pub async fn get_today_diet_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<BTreeMap<String, Vec<DietRecord>>> {
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let records = state.db.diet_records_on(query.user_id, &today).await?;
    let mut grouped = BTreeMap::new();
    grouped.insert(today, records);
    Ok(Json(ApiResponse::ok_with_message("获取成功", grouped)))
}

pub async fn update_diet_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i64>,
    Json(request): Json<UpdateDietRecordRequest>,
) -> ApiResult<DietRecord> {
    let record = state.db.update_diet_record(record_id, &request).await?;
    Ok(Json(ApiResponse::ok_with_message("更新成功", record)))
}

pub async fn delete_diet_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<i64>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<()> {
    state.db.delete_diet_record(record_id, query.user_id).await?;
    Ok(Json(ApiResponse::ok_with_message("删除成功", ())))
}

#[derive(Debug, Deserialize)]
pub struct AllergenCheckRequest {
    pub food_name: String,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
}

pub async fn check_allergens(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AllergenCheckRequest>,
) -> ApiResult<crate::allergen::MergedAllergenResult> {
    if request.food_name.trim().is_empty() {
        return Err(CoreError::validation("food_name must not be empty").into());
    }

    let user_allergens = match request.user_id {
        Some(user_id) => state
            .db
            .get_user(user_id)
            .await?
            .map(|user| user.allergens)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let keyword_result = state.allergen.check(
        &request.food_name,
        request.ingredients.as_deref(),
        if user_allergens.is_empty() {
            None
        } else {
            Some(&user_allergens)
        },
    );

    // AI inference rides on the nutrition analyzer; a degraded analysis
    // simply contributes no AI allergens.
    let nutrition = state
        .nutrition_analyzer
        .analyze_for_user(&request.food_name, request.user_id)
        .await;

    let graph_hidden = {
        let recipe_graph = Arc::clone(&state.recipe_graph);
        let food_name = request.food_name.clone();
        tokio::task::spawn_blocking(move || recipe_graph.get_hidden_allergens(&food_name))
            .await
            .unwrap_or_default()
    };

    let merged = state.allergen.merge(
        &request.food_name,
        &keyword_result,
        &nutrition.allergens,
        &nutrition.allergen_reasoning,
        &graph_hidden,
        if user_allergens.is_empty() {
            None
        } else {
            Some(&user_allergens)
        },
    );

    Ok(Json(ApiResponse::ok_with_message("检测完成", merged)))
}

pub async fn allergen_categories(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<crate::allergen::AllergenCategoryInfo>> {
    Ok(Json(ApiResponse::ok(state.allergen.all_categories())))
}

#[derive(Debug, Serialize)]
pub struct BeforeMealData {
    pub comparison_id: i64,
    pub before_image_url: Option<String>,
    pub before_features: Option<String>,
    pub status: String,
}

pub async fn meal_before(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<BeforeMealData> {
    let (image, fields) = read_multipart(&mut multipart).await?;
    let image = image.ok_or_else(|| ApiError(CoreError::validation("image file is required")))?;
    let user_id = parse_i64_field(&fields, "user_id")
        .or_else(|| parse_i64_field(&fields, "userId"))
        .ok_or_else(|| ApiError(CoreError::validation("user_id is required")))?;

    let record = state
        .meal_service
        .upload_before(user_id, &image.bytes, &image.ext)
        .await?;

    Ok(Json(ApiResponse::ok_with_message(
        "餐前图片上传成功",
        BeforeMealData {
            comparison_id: record.id,
            before_image_url: record.before_image_url,
            before_features: record.before_features,
            status: record.status.as_str().to_string(),
        },
    )))
}

pub async fn meal_after(
    State(state): State<Arc<AppState>>,
    Path(comparison_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<MealComparison> {
    let (image, _fields) = read_multipart(&mut multipart).await?;
    let image = image.ok_or_else(|| ApiError(CoreError::validation("image file is required")))?;

    let record = state
        .meal_service
        .upload_after(comparison_id, &image.bytes, &image.ext)
        .await?;
    Ok(Json(ApiResponse::ok_with_message("对比完成", record)))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRatioRequest {
    pub new_ratio: f64,
}

pub async fn meal_adjust(
    State(state): State<Arc<AppState>>,
    Path(comparison_id): Path<i64>,
    Json(request): Json<AdjustRatioRequest>,
) -> ApiResult<MealComparison> {
    let record = state
        .meal_service
        .adjust(comparison_id, request.new_ratio)
        .await?;
    Ok(Json(ApiResponse::ok_with_message("调整成功", record)))
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: i64,
    #[serde(default = "default_meal_type")]
    pub meal_type: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_meal_type() -> String {
    "lunch".to_string()
}

fn default_limit() -> usize {
    5
}

pub async fn recommend_foods(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> ApiResult<RecommendationData> {
    let data = state
        .recommend
        .recommend(query.user_id, &query.meal_type, query.limit.clamp(1, 20))
        .await?;
    Ok(Json(ApiResponse::ok_with_message("推荐成功", data)))
}
