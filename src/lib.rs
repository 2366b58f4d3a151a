pub mod api;
pub mod app;
pub mod config;
pub mod importers;
pub mod metrics;
pub mod pipeline_error;
pub mod services;
pub mod table;
pub mod utils;
