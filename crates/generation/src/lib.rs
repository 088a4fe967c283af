//! Generation service client for Easel
//!
//! This crate is the boundary between the graph engine and the remote
//! generation backends. It provides:
//!
//! - `GenerationService`: the trait the engine drives jobs through
//! - `HttpGenerationService`: the production HTTP implementation
//! - `ModelCatalog`: a TTL-cached registry of the models the service offers
//!
//! The engine never talks to a backend directly; everything goes through
//! the `GenerationService` trait so tests and embedders can substitute
//! their own transport.

pub mod config;
pub mod http;
pub mod models;
pub mod service;
pub mod types;

// Re-export key types
pub use config::ServiceConfig;
pub use http::HttpGenerationService;
pub use models::{HttpModelSource, ModelCatalog, ModelInfo, ModelSource};
pub use service::{GenerationService, Result, ServiceError};
pub use types::{
    JobHandle, JobStatusResponse, NodeOutput, RemoteError, RemoteStatus, SubmitRequest,
};
