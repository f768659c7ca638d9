pub mod models;
pub mod progress;
