pub mod config;
pub mod error;
pub mod fetch;
pub mod sources;
pub mod storage;
pub mod telemetry;
pub mod workflows;
