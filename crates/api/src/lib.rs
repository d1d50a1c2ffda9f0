//! HTTP API for inventory checks: routing, request/response mapping, and
//! store wiring.

pub mod app;
