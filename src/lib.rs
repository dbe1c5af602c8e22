//! Library crate for phenoeval-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Persistence entities and the storage abstraction.
pub mod dao;
/// Request/response types for every surface.
pub mod dto;
/// Error taxonomy and HTTP mapping.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business logic services.
pub mod services;
/// Shared application state and the session state machine.
pub mod state;
