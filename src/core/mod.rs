// LogPilot - core/mod.rs
//
// Core business logic layer: session state, severity catalog, date
// formatting, query construction, wire frames and routing.
// Must NOT depend on: ui, platform, app, or any network crate.

pub mod datefmt;
pub mod frame;
pub mod model;
pub mod query;
pub mod routing;
pub mod session;
pub mod severity;
