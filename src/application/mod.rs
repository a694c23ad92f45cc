// Application layer - Services and session-owned state
pub mod event_bus;
pub mod event_log;
pub mod models;
pub mod simulation_engine;
pub mod telemetry_history;
