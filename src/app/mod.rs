// LogPilot - app/mod.rs
//
// Application layer: session orchestration, transports, host directory,
// state management.
// Dependencies: core layer.
// Must NOT depend on: ui, platform specifics.

pub mod hosts;
pub mod replay;
pub mod state;
pub mod stream;
pub mod transport;
pub mod websocket;
