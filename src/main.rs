use futures::StreamExt;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use siirto::controller::{error_policy, reconcile, Context};
use siirto::crd::canary::Canary;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Default requeue interval after a successful reconcile
const DEFAULT_REQUEUE_SECONDS: u64 = 60;

/// Requeue interval from env (default: 60s)
fn requeue_seconds() -> u64 {
    std::env::var("SIIRTO_REQUEUE_SECONDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_REQUEUE_SECONDS)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting siirto canary traffic router");

    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };
    info!("Connected to Kubernetes cluster");

    let canaries = Api::<Canary>::all(client.clone());

    let interval = Duration::from_secs(requeue_seconds());
    let ctx = Arc::new(Context::new(client).with_requeue_interval(interval));
    info!(
        requeue_seconds = interval.as_secs(),
        "Controller ready, starting reconciliation loop"
    );

    // Note: error_policy already logs errors with warn!, so we only log success here
    Controller::new(canaries, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Ok(o) = res {
                info!("Reconciled: {:?}", o);
            }
            // Errors are logged in error_policy, no duplicate logging
        })
        .await;

    info!("Controller stream ended");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
