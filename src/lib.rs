pub mod aggregator;
pub mod config;
pub mod enrich;
pub mod error;
pub mod geo;
pub mod loader;
pub mod output;
pub mod pipeline;
