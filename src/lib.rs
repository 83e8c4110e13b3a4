pub mod config;
pub mod coursegen_config;
pub mod errors;
pub mod generation;
pub mod telemetry;
pub mod ui;
