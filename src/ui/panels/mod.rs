// LogPilot - ui/panels/mod.rs

pub mod hosts;
pub mod records;
pub mod search;
pub mod status;
