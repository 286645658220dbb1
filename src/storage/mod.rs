//! Storage utilities and abstractions.
//!
//! ## Modules
//!
//! - `sqlite`: connection handle, pragmas, transactions
//! - `schema`: table definitions and first-run seeding

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteConfig, SqliteHandle};
