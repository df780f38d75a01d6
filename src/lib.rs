pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{
    csv_provider::CsvDirectoryProvider, file_store::JsonFileStore, memory_store::MemoryStore,
    sheets::GoogleSheetsProvider,
};
pub use app::PortalService;
pub use core::{
    aggregator::{RosterAggregator, RosterPipeline},
    cache::RosterCache,
    normalize::normalize,
};
pub use utils::error::{LoginError, PortalError, ProviderError, RegistrationError, Result};
