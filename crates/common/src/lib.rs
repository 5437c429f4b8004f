//! Shared utilities for the Meta Ads MCP workspace.
//!
//! Currently this crate hosts the generic resilience primitives (retry
//! execution and keyed rate limiting) that the Graph API request pipeline is
//! built on. Everything here is domain-free: no Meta types, no HTTP.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
