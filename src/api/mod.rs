// src/api/mod.rs
// HTTP surface: thin marshalling over the orchestrator

pub mod routes;

pub use routes::create_router;
