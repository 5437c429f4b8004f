//! # Meta Ads Infrastructure
//!
//! Infrastructure layer for the Meta Ads MCP server.
//!
//! This crate contains:
//! - The resilient Graph API request pipeline (admission, classification,
//!   retry, pagination)
//! - HTTP client plumbing (reqwest)
//! - Credential handling and configuration loading
//!
//! ## Architecture
//! - Builds on the generic resilience primitives in `metaads-common`
//! - Reports every failure as a `metaads-domain` classification
//! - Contains all "impure" code (network I/O, environment access)

pub mod config;
pub mod errors;
pub mod graph;
pub mod http;

// Re-export commonly used items
pub use errors::InfraError;
pub use graph::{
    AccessTokenProvider, AuthManager, Classifier, ClassifierConfig, FailureSignal, GraphClient,
    PageCursor, PageResult, PageStream, RequestDescriptor, RequestMethod, StaticTokenProvider,
};
pub use http::HttpClient;
