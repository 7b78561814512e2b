// src/ai/call_log.rs - AI call audit log

use crate::core::Result;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::warn;

const SUMMARY_MAX_LEN: usize = 450;
const ERROR_MAX_LEN: usize = 1000;

/// One call about to be recorded
#[derive(Debug, Clone)]
pub struct AiCallEntry {
    pub user_id: Option<i64>,
    pub call_type: String,
    pub model_name: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub latency_ms: i64,
    pub token_usage: Option<i64>,
}

/// Persisted log row
#[derive(Debug, Clone, Serialize)]
pub struct AiCallLogRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub call_type: String,
    pub model_name: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub latency_ms: Option<i64>,
    pub token_usage: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiLogStats {
    pub total_calls: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub call_type_distribution: BTreeMap<String, i64>,
    pub model_distribution: BTreeMap<String, i64>,
    pub recent_7days_count: i64,
}

fn truncate(text: Option<String>, max_len: usize) -> Option<String> {
    text.map(|t| {
        if t.chars().count() <= max_len {
            t
        } else {
            let prefix: String = t.chars().take(max_len).collect();
            format!("{prefix}...")
        }
    })
}

/// Append-only AI call log. Writes run on their own pool connection and
/// never participate in a caller's transaction; a failed write is logged
/// and swallowed so it cannot affect the main flow.
pub struct AiLogService {
    pool: SqlitePool,
}

impl AiLogService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn log_call(&self, entry: AiCallEntry) {
        let token_usage = entry.token_usage.filter(|t| *t >= 0);

        let result = sqlx::query(
            r#"
            INSERT INTO ai_call_log
            (user_id, call_type, model_name, input_summary, output_summary,
             success, error_message, latency_ms, token_usage)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(entry.user_id)
        .bind(&entry.call_type)
        .bind(&entry.model_name)
        .bind(truncate(entry.input_summary, SUMMARY_MAX_LEN))
        .bind(truncate(entry.output_summary, SUMMARY_MAX_LEN))
        .bind(entry.success)
        .bind(truncate(entry.error_message, ERROR_MAX_LEN))
        .bind(entry.latency_ms)
        .bind(token_usage)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("Failed to record AI call log: {e}");
        }
    }

    pub async fn list_logs(
        &self,
        user_id: i64,
        call_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<AiCallLogRow>)> {
        let (total, rows) = if let Some(call_type) = call_type {
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM ai_call_log WHERE user_id = ? AND call_type = ?",
            )
            .bind(user_id)
            .bind(call_type)
            .fetch_one(&self.pool)
            .await?;
            let rows = sqlx::query(
                r#"
                SELECT id, user_id, call_type, model_name, input_summary, output_summary,
                       success, error_message, latency_ms, token_usage, created_at
                FROM ai_call_log
                WHERE user_id = ? AND call_type = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
            "#,
            )
            .bind(user_id)
            .bind(call_type)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            (total, rows)
        } else {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM ai_call_log WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;
            let rows = sqlx::query(
                r#"
                SELECT id, user_id, call_type, model_name, input_summary, output_summary,
                       success, error_message, latency_ms, token_usage, created_at
                FROM ai_call_log
                WHERE user_id = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
            "#,
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            (total, rows)
        };

        let logs = rows
            .into_iter()
            .map(|row| AiCallLogRow {
                id: row.get("id"),
                user_id: row.get("user_id"),
                call_type: row.get("call_type"),
                model_name: row.get("model_name"),
                input_summary: row.get("input_summary"),
                output_summary: row.get("output_summary"),
                success: row.get("success"),
                error_message: row.get("error_message"),
                latency_ms: row.get("latency_ms"),
                token_usage: row.get("token_usage"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok((total, logs))
    }

    pub async fn log_stats(&self, user_id: i64) -> Result<AiLogStats> {
        let total_calls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_call_log WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let success_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ai_call_log WHERE user_id = ? AND success = 1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        let failure_count = total_calls - success_count;
        let success_rate = if total_calls > 0 {
            (success_count as f64 / total_calls as f64 * 10000.0).round() / 10000.0
        } else {
            0.0
        };

        let avg_latency: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(latency_ms) FROM ai_call_log WHERE user_id = ? AND latency_ms IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        let avg_latency_ms = avg_latency.map(|v| (v * 10.0).round() / 10.0).unwrap_or(0.0);

        let mut call_type_distribution = BTreeMap::new();
        let type_rows = sqlx::query(
            "SELECT call_type, COUNT(*) AS cnt FROM ai_call_log WHERE user_id = ? GROUP BY call_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in type_rows {
            call_type_distribution.insert(row.get::<String, _>("call_type"), row.get::<i64, _>("cnt"));
        }

        let mut model_distribution = BTreeMap::new();
        let model_rows = sqlx::query(
            "SELECT model_name, COUNT(*) AS cnt FROM ai_call_log WHERE user_id = ? GROUP BY model_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in model_rows {
            model_distribution.insert(row.get::<String, _>("model_name"), row.get::<i64, _>("cnt"));
        }

        let seven_days_ago = (Utc::now() - Duration::days(7))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let recent_7days_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ai_call_log WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(seven_days_ago)
        .fetch_one(&self.pool)
        .await?;

        Ok(AiLogStats {
            total_calls,
            success_count,
            failure_count,
            success_rate,
            avg_latency_ms,
            call_type_distribution,
            model_distribution,
            recent_7days_count,
        })
    }
}
