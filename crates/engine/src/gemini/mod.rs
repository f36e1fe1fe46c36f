pub mod rest;
pub mod schema;

pub use rest::{parse_analysis, GeminiClient};
