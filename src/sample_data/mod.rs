// src/sample_data/mod.rs - Built-in knowledge datasets
//
// Default content of the three knowledge bases. A JSON file with the same
// record shape can be supplied at build time to replace any of them.

pub mod exercises;
pub mod nutrition;
pub mod recipes;

pub use exercises::builtin_exercises;
pub use nutrition::builtin_foods;
pub use recipes::builtin_recipes;
