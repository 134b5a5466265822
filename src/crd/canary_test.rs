use super::*;
use kube::api::ObjectMeta;
use kube::CustomResourceExt;

fn test_canary() -> Canary {
    Canary {
        metadata: ObjectMeta {
            name: Some("podinfo".to_string()),
            namespace: Some("test".to_string()),
            ..Default::default()
        },
        spec: CanarySpec {
            target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: "podinfo".to_string(),
            },
            service: CanaryService {
                port: 9898,
                matches: vec![],
                timeout: None,
                retries: None,
            },
            analysis: CanaryAnalysis::default(),
        },
        status: None,
    }
}

#[test]
fn test_derived_service_names() {
    let canary = test_canary();

    assert_eq!(canary.target_name(), "podinfo");
    assert_eq!(canary.primary_service_name(), "podinfo-primary");
    assert_eq!(canary.canary_service_name(), "podinfo-canary");
}

#[test]
fn test_has_match_rules() {
    let mut canary = test_canary();
    assert!(!canary.has_match_rules());

    canary.spec.analysis.matches.push(HttpMatchRequest {
        headers: Some(
            vec![(
                "x-canary".to_string(),
                StringMatch {
                    exact: Some("insider".to_string()),
                    ..Default::default()
                },
            )]
            .into_iter()
            .collect(),
        ),
        uri: None,
    });
    assert!(canary.has_match_rules());
}

#[test]
fn test_spec_serializes_with_camel_case_names() {
    let mut canary = test_canary();
    canary.spec.service.retries = Some(RetrySpec {
        attempts: 3,
        per_try_timeout: "5s".to_string(),
    });

    let json = serde_json::to_value(&canary.spec).unwrap();

    assert_eq!(json["targetRef"]["name"], "podinfo");
    assert_eq!(json["service"]["retries"]["perTryTimeout"], "5s");
    // Optional fields are omitted, not serialized as null
    assert!(json["service"].get("timeout").is_none());
    assert!(json["service"].get("match").is_none());
}

#[test]
fn test_crd_identity() {
    let crd = Canary::crd();

    assert_eq!(crd.spec.group, "siirto.io");
    assert_eq!(crd.spec.names.kind, "Canary");
    assert_eq!(crd.spec.versions.len(), 1);
    assert_eq!(crd.spec.versions[0].name, "v1alpha1");
}

#[test]
fn test_deserializes_full_manifest() {
    let yaml = r#"
targetRef:
  apiVersion: apps/v1
  kind: Deployment
  name: podinfo
service:
  port: 9898
  timeout: 15s
  match:
    - uri:
        prefix: /api
analysis:
  match:
    - headers:
        x-canary:
          exact: insider
"#;

    let spec: CanarySpec = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(spec.target_ref.name, "podinfo");
    assert_eq!(spec.service.port, 9898);
    assert_eq!(spec.service.timeout.as_deref(), Some("15s"));
    assert_eq!(
        spec.service.matches[0].uri.as_ref().unwrap().prefix.as_deref(),
        Some("/api")
    );
    let headers = spec.analysis.matches[0].headers.as_ref().unwrap();
    assert_eq!(headers["x-canary"].exact.as_deref(), Some("insider"));
}
