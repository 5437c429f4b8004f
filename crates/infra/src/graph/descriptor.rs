//! Request descriptors
//!
//! A descriptor is the immutable description of one Graph API call: method,
//! endpoint path, account attribution for rate limiting, and parameters.
//! Attempt bookkeeping lives in the retry layer, not here: re-executing a
//! descriptor must always mean the same request.

use chrono::{DateTime, Utc};
use reqwest::Method;

/// Rate cost of a read call.
pub const READ_COST: f64 = 1.0;
/// Rate cost of a write call.
pub const WRITE_COST: f64 = 3.0;

/// HTTP method of a Graph API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Delete,
}

impl RequestMethod {
    /// The corresponding HTTP method.
    pub fn as_http(self) -> Method {
        match self {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post => Method::POST,
            RequestMethod::Delete => Method::DELETE,
        }
    }

    /// Writes are charged a higher rate cost than reads.
    pub fn is_write(self) -> bool {
        !matches!(self, RequestMethod::Get)
    }
}

/// Description of a single Graph API request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: RequestMethod,
    /// Endpoint path relative to the Graph base URL, e.g. `act_123/campaigns`
    /// or a bare object id.
    pub endpoint: String,
    /// Ad account the call is attributed to for rate limiting.
    pub account_id: Option<String>,
    /// Query parameters (auth parameters are attached by the pipeline).
    pub params: Vec<(String, String)>,
    /// Form body for write calls.
    pub form: Vec<(String, String)>,
    pub created_at: DateTime<Utc>,
}

impl RequestDescriptor {
    fn new(method: RequestMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            account_id: None,
            params: Vec::new(),
            form: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A read call.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, endpoint)
    }

    /// A write call with a form body.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(RequestMethod::Post, endpoint)
    }

    /// A delete call.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(RequestMethod::Delete, endpoint)
    }

    /// Attribute the call to an ad account for rate limiting.
    pub fn account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Append a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Append a form body field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Rate cost charged at admission time.
    pub fn cost(&self) -> f64 {
        if self.method.is_write() {
            WRITE_COST
        } else {
            READ_COST
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let descriptor = RequestDescriptor::get("act_123/campaigns")
            .account("act_123")
            .param("fields", "id,name")
            .param("limit", "50");

        assert_eq!(descriptor.method, RequestMethod::Get);
        assert_eq!(descriptor.endpoint, "act_123/campaigns");
        assert_eq!(descriptor.account_id.as_deref(), Some("act_123"));
        assert_eq!(descriptor.params.len(), 2);
        assert!(descriptor.form.is_empty());
    }

    #[test]
    fn writes_cost_more_than_reads() {
        assert_eq!(RequestDescriptor::get("me").cost(), READ_COST);
        assert_eq!(RequestDescriptor::post("act_1/campaigns").cost(), WRITE_COST);
        assert_eq!(RequestDescriptor::delete("camp_1").cost(), WRITE_COST);
        assert!(RequestMethod::Delete.is_write());
    }
}
