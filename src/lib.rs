pub mod config;
pub mod engine;
pub mod feeds;
pub mod telemetry;
pub mod types;
pub mod venues;
