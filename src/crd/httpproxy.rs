//! Contour HTTPProxy resource types
//!
//! Declares the projectcontour.io/v1 HTTPProxy surface this controller
//! manages. Only the fields the router writes are modeled; Contour owns the
//! rest of the schema and its status reporting.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTPProxy spec as written by the router: an ordered list of routes,
/// evaluated first-match-wins by Contour
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "HTTPProxy",
    namespaced,
    status = "HTTPProxyStatus"
)]
pub struct HTTPProxySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// A single routing rule: conditions, optional policies and weighted
/// service backends
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(rename = "timeoutPolicy", skip_serializing_if = "Option::is_none")]
    pub timeout_policy: Option<TimeoutPolicy>,

    #[serde(rename = "retryPolicy", skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
}

/// Route condition: a URI prefix, optionally paired with one header
/// condition
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Condition {
    pub prefix: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderCondition>,
}

/// Header match condition; exact and contains are mutually exclusive
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct HeaderCondition {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

/// Response/idle timeout policy for a route
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct TimeoutPolicy {
    pub response: String,
    pub idle: String,
}

/// Retry policy for a route
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct RetryPolicy {
    #[serde(rename = "numRetries")]
    pub num_retries: u32,

    #[serde(rename = "perTryTimeout")]
    pub per_try_timeout: String,
}

/// Weighted service backend; weight is a percentage in 0..=100
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Service {
    pub name: String,
    pub port: i32,
    pub weight: u32,
}

/// HTTPProxy status; set to the valid marker at creation, maintained by
/// Contour afterwards
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct HTTPProxyStatus {
    #[serde(rename = "currentStatus")]
    pub current_status: String,

    pub description: String,
}

impl HTTPProxyStatus {
    /// Marker status written at creation time
    pub fn valid() -> Self {
        HTTPProxyStatus {
            current_status: "valid".to_string(),
            description: "valid HTTPProxy".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "httpproxy_test.rs"]
mod tests;
