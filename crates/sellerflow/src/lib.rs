pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod sync;
pub mod telemetry;
