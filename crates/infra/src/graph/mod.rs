//! Meta Graph API integration
//!
//! The resilient request pipeline every tool handler goes through:
//! admission against the per-account rate budget, execution, failure
//! classification, retry, and pagination. Handlers only ever see a
//! [`RequestDescriptor`] going in and a JSON value or a classified
//! `MetaAdsError` coming out.

pub mod auth;
pub mod classify;
pub mod client;
pub mod descriptor;
pub mod pagination;

pub use auth::{AccessTokenProvider, AuthManager, StaticTokenProvider};
pub use classify::{Classifier, ClassifierConfig, FailureSignal};
pub use client::GraphClient;
pub use descriptor::{RequestDescriptor, RequestMethod};
pub use pagination::{PageCursor, PageResult, PageStream};
