//! Lead Qualification Pipeline Library
//!
//! This library turns a partial lead record into a qualified, enriched and scored
//! record with a chosen outreach strategy, and persists it for later retrieval.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Pipeline stages and their collaborator traits.
//! - `data`: Storage adapters.
//! - `integrations`: External collaborator clients.
//! - `automation`: Strategy routing and channel fan-out.
//! - `cache_store`: In-process fast cache.
//! - `cache_validator`: Checksummed cache envelopes.
//! - `circuit_breaker`: Circuit breaker for the structured store.
//! - `completeness`: Lead completeness scoring.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema.
//! - `db_storage`: Postgres record store.
//! - `enrichment`: Waterfall enrichment.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `insight`: Multi-backend insight synthesis.
//! - `intelligence`: Competitive and market intelligence.
//! - `intent`: Intent signal aggregation.
//! - `isolation`: Per-call failure isolation.
//! - `knowledge`: Three-store persistence and retrieval.
//! - `models`: Core data models.
//! - `pipeline`: End-to-end orchestration.
//! - `services`: HTTP clients for collaborators.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod automation;
pub mod cache_store;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod completeness;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod insight;
pub mod intelligence;
pub mod intent;
pub mod isolation;
pub mod knowledge;
pub mod models;
pub mod pipeline;
pub mod services;
