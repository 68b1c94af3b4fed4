pub mod catalog;
pub mod config;
pub mod database;
pub mod duplicate_manager;
pub mod errors;
pub mod extractor;
pub mod model;
pub mod pipeline;
pub mod search;

pub use catalog::{BookLookup, Catalog, ImportOptions, ImportOutcome, LanguageMode, SearchPage};
pub use errors::{MdbError, Result};
