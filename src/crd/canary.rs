use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canary is a Custom Resource describing a progressive delivery run
///
/// It names the target workload, the service routing parameters and the
/// request-match rules that gate canary traffic. The router reconciles a
/// Contour HTTPProxy from this description; the rollout loop adjusts the
/// primary/canary weight split over time via SetRoutes.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "siirto.io",
    version = "v1alpha1",
    kind = "Canary",
    namespaced,
    status = "CanaryStatus",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.targetRef.name"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Weight", "type":"integer", "jsonPath":".status.canaryWeight"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct CanarySpec {
    /// Reference to the workload being released
    #[serde(rename = "targetRef")]
    pub target_ref: CrossVersionObjectReference,

    /// Service routing parameters (port, URI match, timeout, retries)
    pub service: CanaryService,

    /// Analysis configuration, including the request-match rules that
    /// select which requests may reach the canary variant
    #[serde(default)]
    pub analysis: CanaryAnalysis,
}

/// Reference to the target workload (e.g. a Deployment)
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct CrossVersionObjectReference {
    #[serde(rename = "apiVersion", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub kind: String,

    /// Target name; the HTTPProxy shares this name, and the primary and
    /// canary services are derived from it
    pub name: String,
}

/// Service routing parameters for the canary target
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct CanaryService {
    /// Container port routed to on both variants
    pub port: i32,

    /// URI match rules; only the first rule's URI prefix is consulted
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<HttpMatchRequest>,

    /// HTTP response timeout (e.g. "15s"); when unset the router keeps
    /// its own default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Retry policy applied to both routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetrySpec>,
}

/// Retry configuration carried verbatim into the proxy spec
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RetrySpec {
    /// Number of retry attempts
    pub attempts: i32,

    /// Per-try timeout (e.g. "5s")
    #[serde(rename = "perTryTimeout")]
    pub per_try_timeout: String,
}

/// Analysis configuration for the canary run
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct CanaryAnalysis {
    /// Request-match rules gating canary traffic. When present, only
    /// matching requests are weight-split; everything else stays on the
    /// primary variant.
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<HttpMatchRequest>,
}

/// A single request-match rule (headers and/or URI)
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct HttpMatchRequest {
    /// Match criteria keyed by header name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, StringMatch>>,

    /// URI match; only the prefix form is honored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<StringMatch>,
}

/// String match criterion; exactly one field is expected to be set
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct StringMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// Status of a Canary resource
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct CanaryStatus {
    /// Current phase of the canary run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<CanaryPhase>,

    /// Last weight routed to the canary variant
    #[serde(rename = "canaryWeight", skip_serializing_if = "Option::is_none")]
    pub canary_weight: Option<u32>,

    /// Human-readable detail for the current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Phase of a canary run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub enum CanaryPhase {
    Initializing,
    Initialized,
    Progressing,
    Succeeded,
    Failed,
}

impl Canary {
    /// Name of the target workload; doubles as the HTTPProxy name
    pub fn target_name(&self) -> &str {
        &self.spec.target_ref.name
    }

    /// Name of the stable variant's service
    pub fn primary_service_name(&self) -> String {
        format!("{}-primary", self.spec.target_ref.name)
    }

    /// Name of the canary variant's service
    pub fn canary_service_name(&self) -> String {
        format!("{}-canary", self.spec.target_ref.name)
    }

    /// Whether request-match rules gate canary traffic
    pub fn has_match_rules(&self) -> bool {
        !self.spec.analysis.matches.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "canary_test.rs"]
mod tests;
