pub mod exercise;
pub mod food;
pub mod meal;
pub mod stats;
pub mod user;

pub use exercise::*;
pub use food::*;
pub use meal::*;
pub use stats::*;
pub use user::*;
