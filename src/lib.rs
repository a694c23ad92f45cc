// Real-time ingestion core for the ground-station telemetry dashboard
pub mod application;
pub mod domain;
pub mod infrastructure;
