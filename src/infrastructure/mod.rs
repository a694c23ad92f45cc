// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod frame_codec;
pub mod websocket_link;
