pub mod item;
pub mod price_record;

// Re-exports for convenience
pub use item::*;
pub use price_record::*;

/// Current time as integer epoch seconds, the timestamp unit stored with
/// every observed price.
pub fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp()
}
