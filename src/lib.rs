// * Catapult: health, readiness and metrics endpoints over a set of external integrations

pub mod app;
pub mod config;
pub mod engine;
pub mod network;
pub mod ops;
