//! Condition and policy builders
//!
//! Translate the Canary's request-match rules and timeout/retry settings
//! into HTTPProxy route conditions and policies. All builders are total:
//! they never fail, and absent configuration yields None (the router's own
//! defaults apply).

use crate::crd::canary::Canary;
use crate::crd::httpproxy::{Condition, HeaderCondition, RetryPolicy, TimeoutPolicy};

/// Prefix used when the Canary does not configure a URI match
pub const DEFAULT_URI_PREFIX: &str = "/";

/// Idle timeout applied whenever a response timeout is configured
pub const IDLE_TIMEOUT: &str = "5m";

/// Resolve the URI prefix shared by every condition
///
/// Taken from the first service match rule's URI prefix when configured
/// and non-empty, otherwise "/".
pub fn uri_prefix(canary: &Canary) -> String {
    canary
        .spec
        .service
        .matches
        .first()
        .and_then(|m| m.uri.as_ref())
        .and_then(|uri| uri.prefix.clone())
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or_else(|| DEFAULT_URI_PREFIX.to_string())
}

/// Build the condition list for the match-qualified route
///
/// One condition per header entry per analysis match rule, each pairing the
/// shared URI prefix with a header condition. Anchored prefix and suffix
/// matches both fold into Contour's `contains` (the header condition model
/// does not distinguish them further); exact matches carry the value
/// verbatim. Always yields at least one condition: when no header entry
/// produces anything, the bare prefix condition is emitted instead.
pub fn build_conditions(canary: &Canary) -> Vec<Condition> {
    let prefix = uri_prefix(canary);
    let mut list = Vec::new();

    for rule in &canary.spec.analysis.matches {
        let Some(headers) = &rule.headers else {
            continue;
        };
        for (name, string_match) in headers {
            let header = if let Some(value) = &string_match.prefix {
                HeaderCondition {
                    name: name.clone(),
                    exact: None,
                    contains: Some(value.clone()),
                }
            } else if let Some(value) = &string_match.suffix {
                HeaderCondition {
                    name: name.clone(),
                    exact: None,
                    contains: Some(value.clone()),
                }
            } else {
                HeaderCondition {
                    name: name.clone(),
                    exact: string_match.exact.clone(),
                    contains: None,
                }
            };
            list.push(Condition {
                prefix: prefix.clone(),
                header: Some(header),
            });
        }
    }

    if list.is_empty() {
        list.push(Condition {
            prefix,
            header: None,
        });
    }

    list
}

/// Build the timeout policy, if a response timeout is configured
///
/// The idle timeout is pinned to 5 minutes; Contour applies its own
/// defaults when no policy is present.
pub fn build_timeout_policy(canary: &Canary) -> Option<TimeoutPolicy> {
    canary
        .spec
        .service
        .timeout
        .as_ref()
        .filter(|timeout| !timeout.is_empty())
        .map(|timeout| TimeoutPolicy {
            response: timeout.clone(),
            idle: IDLE_TIMEOUT.to_string(),
        })
}

/// Build the retry policy, if retries are configured
pub fn build_retry_policy(canary: &Canary) -> Option<RetryPolicy> {
    canary.spec.service.retries.as_ref().map(|retries| RetryPolicy {
        num_retries: retries.attempts.max(0) as u32,
        per_try_timeout: retries.per_try_timeout.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "conditions_test.rs"]
mod tests;
