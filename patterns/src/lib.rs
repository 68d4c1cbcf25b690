//! Pattern knowledge base: relevance ranking and content trust checks.
//!
//! Callers fetch records from a [`store::PatternStore`], then rank them with
//! [`search`] or audit them with [`verify`]. Scoring, hashing and scanning are
//! pure functions over in-memory records; only the store performs I/O.

pub mod error;
pub mod factory;
pub mod injection;
pub mod integrity;
pub mod search;
pub mod store;
pub mod types;
pub mod verify;

pub use error::PatternError;
pub use injection::InjectionRisk;
pub use integrity::HashStatus;
pub use search::ScoredPattern;
pub use search::SearchOptions;
pub use types::Pattern;
pub use verify::VerifyOptions;
