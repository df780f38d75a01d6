pub mod aggregator;
pub mod cache;
pub mod fetcher;
pub mod normalize;
pub mod parser;
pub mod verifier;

pub use crate::domain::model::{RawGrid, Roster, Source, StudentRecord};
pub use crate::domain::ports::{AccountStore, SourceRegistry, TabularProvider};
pub use crate::utils::error::Result;
