// Domain layer - Pure data types and state machines
pub mod connection;
pub mod telemetry;
