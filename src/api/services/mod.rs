pub mod catalog;
pub mod health;
pub mod progress;
pub mod session;
