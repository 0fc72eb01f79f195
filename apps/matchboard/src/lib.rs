//! Matchboard: candidate–job matching with deduplicated, paginated notifications.

pub mod attributes;
pub mod config;
pub mod errors;
pub mod events;
pub mod explain;
pub mod matching;
pub mod models;
pub mod notifications;
pub mod seed;
pub mod state;

pub use config::Config;
pub use errors::AppError;
pub use state::AppState;
