#![deny(missing_docs)]

//! Core library for the Docchat server.

/// HTTP routing and REST handlers.
pub mod api;
/// Caller identity verification.
pub mod auth;
/// Environment-driven configuration management.
pub mod config;
/// Document text extraction boundary.
pub mod extract;
/// In-memory vector index and similarity search.
pub mod index;
/// Embedding and completion gateway.
pub mod inference;
/// Structured logging and tracing setup.
pub mod logging;
/// Activity metrics helpers.
pub mod metrics;
/// Chunking, retrieval, and answer synthesis pipeline.
pub mod processing;
/// Session orchestration and ingestion policy.
pub mod sessions;
/// Storage collaborator boundary and in-memory store.
pub mod storage;
