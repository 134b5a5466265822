use super::*;

#[test]
fn test_requeue_delay_is_short_for_conflicts() {
    let conflict = ReconcileError::Router(RouterError::Conflict {
        name: "podinfo".to_string(),
        namespace: "test".to_string(),
    });

    assert_eq!(
        requeue_delay(&conflict),
        Duration::from_secs(RETRYABLE_REQUEUE_SECONDS)
    );
}

#[test]
fn test_requeue_delay_backs_off_for_other_errors() {
    let missing = ReconcileError::MissingNamespace;
    assert_eq!(
        requeue_delay(&missing),
        Duration::from_secs(ERROR_REQUEUE_SECONDS)
    );

    let not_found = ReconcileError::Router(RouterError::NotFound {
        name: "podinfo".to_string(),
        namespace: "test".to_string(),
    });
    assert_eq!(
        requeue_delay(&not_found),
        Duration::from_secs(ERROR_REQUEUE_SECONDS)
    );
}

#[test]
fn test_router_errors_convert_with_context_intact() {
    let err: ReconcileError = RouterError::ServicesNotFound {
        name: "podinfo".to_string(),
        namespace: "test".to_string(),
    }
    .into();

    assert_eq!(
        err.to_string(),
        "Router error: HTTPProxy podinfo.test services not found"
    );
}
