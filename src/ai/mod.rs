// src/ai/mod.rs - AI enrichment pipeline

pub mod call_log;
pub mod client;
pub mod meal_diff;
pub mod menu;
pub mod nutrition;
pub mod trip;

pub use call_log::{AiCallEntry, AiCallLogRow, AiLogService, AiLogStats};
pub use client::{AiClient, CallType, ChatTransport, ContentPart, HttpChatTransport};
pub use meal_diff::MealComparisonService;
pub use menu::MenuAnalyzer;
pub use nutrition::NutritionAnalyzer;
pub use trip::TripPlanner;
