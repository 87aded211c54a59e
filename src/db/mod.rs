// Re-export the Database struct and other public items
pub mod core;
mod knowledge_base;
mod results;
mod schema;
mod tests;
mod workflow;

// Re-export Database and essential traits
pub use self::core::Database;
pub use sqlx::Row;
