//! Infrastructure layer: storage adapters, the inventory check engine, and
//! configuration.

pub mod config;
pub mod engine;
pub mod store;
