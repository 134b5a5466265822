//! HTTPProxy spec composition and the weight-ignoring diff
//!
//! A single parameterized composer builds the desired proxy spec for both
//! the initial reconcile (100/0) and weight updates, so the match and
//! no-match shapes cannot drift apart.

use crate::crd::canary::Canary;
use crate::crd::httpproxy::{Condition, HTTPProxySpec, Route, Service};

use super::conditions::{build_conditions, build_retry_policy, build_timeout_policy, uri_prefix};

/// Weight of the primary variant before any traffic has shifted
pub const INITIAL_PRIMARY_WEIGHT: u32 = 100;

/// Weight of the canary variant before any traffic has shifted
pub const INITIAL_CANARY_WEIGHT: u32 = 0;

/// Compose the desired HTTPProxy spec for a Canary
///
/// Without request-match rules the spec is a single catch-all route carrying
/// the supplied weight pair. With match rules the match-qualified route comes
/// first (Contour evaluates routes in order, first match wins) and carries
/// the supplied weights, while the trailing catch-all route is pinned at
/// 100/0: traffic outside the declared match criteria always goes to the
/// stable variant, whatever the rollout progress.
pub fn compose_spec(canary: &Canary, primary_weight: u32, canary_weight: u32) -> HTTPProxySpec {
    let primary_name = canary.primary_service_name();
    let canary_name = canary.canary_service_name();
    let port = canary.spec.service.port;
    let timeout_policy = build_timeout_policy(canary);
    let retry_policy = build_retry_policy(canary);

    let services = |primary: u32, canary_w: u32| {
        vec![
            Service {
                name: primary_name.clone(),
                port,
                weight: primary,
            },
            Service {
                name: canary_name.clone(),
                port,
                weight: canary_w,
            },
        ]
    };

    let catch_all = |primary: u32, canary_w: u32| Route {
        conditions: vec![Condition {
            prefix: uri_prefix(canary),
            header: None,
        }],
        timeout_policy: timeout_policy.clone(),
        retry_policy: retry_policy.clone(),
        services: services(primary, canary_w),
    };

    let routes = if canary.has_match_rules() {
        vec![
            Route {
                conditions: build_conditions(canary),
                timeout_policy: timeout_policy.clone(),
                retry_policy: retry_policy.clone(),
                services: services(primary_weight, canary_weight),
            },
            catch_all(INITIAL_PRIMARY_WEIGHT, INITIAL_CANARY_WEIGHT),
        ]
    } else {
        vec![catch_all(primary_weight, canary_weight)]
    };

    HTTPProxySpec { routes }
}

/// Structural equality of two proxy specs, ignoring service weights
///
/// The weight field is the only field allowed to diverge between the
/// freshly composed spec and the stored one without triggering an update;
/// everything else (route order, conditions, policies, service names and
/// ports) must match exactly. The comparison is field by field so the
/// weight exclusion stays explicit.
pub fn specs_match_ignoring_weights(desired: &HTTPProxySpec, current: &HTTPProxySpec) -> bool {
    if desired.routes.len() != current.routes.len() {
        return false;
    }

    desired.routes.iter().zip(&current.routes).all(|(d, c)| {
        d.conditions == c.conditions
            && d.timeout_policy == c.timeout_policy
            && d.retry_policy == c.retry_policy
            && d.services.len() == c.services.len()
            && d.services
                .iter()
                .zip(&c.services)
                .all(|(ds, cs)| ds.name == cs.name && ds.port == cs.port)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "spec_test.rs"]
mod tests;
