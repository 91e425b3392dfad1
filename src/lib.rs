pub mod aggregator;
pub mod config;
pub mod models;
pub mod monitors;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod summary;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
