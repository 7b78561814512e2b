// src/lib.rs - Personal health-management backend
//
// AI-enrichment and analytics pipeline: retrieval-augmented nutrition
// analysis, allergen fusion, meal before/after comparison, exercise plan
// generation, and diet/exercise statistics.

pub mod ai;
pub mod allergen;
pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod database;
pub mod mets;
pub mod models;
pub mod rag;
pub mod recommend;
pub mod sample_data;
pub mod stats;
