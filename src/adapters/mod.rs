// Adapters layer: concrete implementations of the domain ports.

pub mod csv_provider;
pub mod file_store;
pub mod memory_store;
pub mod sheets;
