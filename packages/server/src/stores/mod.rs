//! Storage backends. Both implement every domain store trait.
//!
//! - `MemoryStore` - in-process, for tests and local development
//! - `PostgresStore` - sqlx / PostgreSQL

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
