// src/api/user.rs - Account lifecycle, preferences and AI-log views

use crate::ai::{AiCallLogRow, AiLogStats};
use crate::api::{ApiResponse, ApiResult, AppState};
use crate::core::CoreError;
use crate::models::*;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn bearer_user(state: &AppState, headers: &HeaderMap) -> crate::core::Result<i64> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::auth("missing bearer token"))?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| CoreError::auth("malformed authorization header"))?;
    state.auth.verify_access(token)
}

#[derive(Debug, Serialize)]
pub struct AuthData {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub token: TokenPair,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AuthData> {
    if request.nickname.trim().is_empty() || request.password.len() < 6 {
        return Err(CoreError::validation(
            "nickname must not be empty and password must be at least 6 characters",
        )
        .into());
    }
    let password_hash = state.auth.hash_password(&request.password);
    let user = state
        .db
        .create_user(request.nickname.trim(), &password_hash)
        .await?;
    let token = state.auth.issue_pair(user.id)?;
    Ok(Json(ApiResponse::ok_with_message(
        "注册成功",
        AuthData {
            user_id: user.id,
            token,
        },
    )))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthData> {
    let user = state
        .db
        .get_user_by_nickname(request.nickname.trim())
        .await?
        .ok_or_else(|| CoreError::auth("invalid nickname or password"))?;
    if !state
        .auth
        .verify_password(&request.password, &user.password_hash)
    {
        return Err(CoreError::auth("invalid nickname or password").into());
    }
    let token = state.auth.issue_pair(user.id)?;
    Ok(Json(ApiResponse::ok_with_message(
        "登录成功",
        AuthData {
            user_id: user.id,
            token,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let user_id = state.auth.verify_refresh(&request.refresh_token)?;
    // A deleted account invalidates outstanding refresh tokens
    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::auth("account no longer exists"))?;
    let pair = state.auth.issue_pair(user_id)?;
    Ok(Json(ApiResponse::ok(pair)))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<User> {
    let user_id = bearer_user(&state, &headers)?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<User> {
    let user_id = bearer_user(&state, &headers)?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UpdatePreferencesRequest>,
) -> ApiResult<User> {
    let user_id = bearer_user(&state, &headers)?;
    let user = state.db.update_preferences(user_id, &request).await?;
    Ok(Json(ApiResponse::ok_with_message("更新成功", user)))
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ForgetMeData {
    pub deleted_counts: BTreeMap<String, i64>,
    pub total_deleted: i64,
}

/// "Forget me": delete the user and all dependent rows in one
/// transaction. A second call returns 404.
pub async fn forget_me(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<ForgetMeData> {
    let (deleted_counts, total_deleted) = state.db.forget_me(query.user_id).await?;
    Ok(Json(ApiResponse::ok_with_message(
        "用户数据已删除",
        ForgetMeData {
            deleted_counts,
            total_deleted,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct AiLogQuery {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub call_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct AiLogListData {
    pub total: i64,
    pub logs: Vec<AiCallLogRow>,
}

pub async fn ai_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AiLogQuery>,
) -> ApiResult<AiLogListData> {
    let (total, logs) = state
        .ai_log
        .list_logs(
            query.user_id,
            query.call_type.as_deref(),
            query.limit.clamp(1, 200),
            query.offset.max(0),
        )
        .await?;
    Ok(Json(ApiResponse::ok(AiLogListData { total, logs })))
}

pub async fn ai_log_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<AiLogStats> {
    let stats = state.ai_log.log_stats(query.user_id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
