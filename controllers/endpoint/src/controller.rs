//! Controller wiring: watch ManagedEndpoint resources and drive the
//! reconciler, one in-flight reconcile per object.
//!
//! Deletion runs through a finalizer so provider resources are released
//! before the object disappears. Errors requeue with per-object exponential
//! backoff, except dependency violations during teardown, which are the
//! provider unwinding dependents and get a fixed delay.

use crate::error::ControllerError;
use crate::reconciler::{Outcome, Reconciler, MANAGER};
use crds::ManagedEndpoint;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::finalizer::{finalizer, Event};
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Finalizer placed on every ManagedEndpoint this controller manages.
pub const FINALIZER: &str = "network.cloudnet.dev/endpoint-controller";

/// Fixed requeue for a converged object; doubles as the drift poll.
const REQUEUE_CONVERGED: Duration = Duration::from_secs(30);
/// Prompt requeue after creating a provider resource.
const REQUEUE_CREATED: Duration = Duration::from_secs(2);
/// Fixed requeue while the provider unwinds a dependent resource.
const REQUEUE_DEPENDENCY: Duration = Duration::from_secs(30);

fn object_key(obj: &ManagedEndpoint) -> String {
    format!(
        "{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

async fn reconcile(
    obj: Arc<ManagedEndpoint>,
    reconciler: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    let namespace = obj.namespace().ok_or_else(|| {
        ControllerError::InvalidConfig("ManagedEndpoint without a namespace".to_string())
    })?;
    let api: Api<ManagedEndpoint> = Api::namespaced(reconciler.kube_client(), &namespace);
    let key = object_key(&obj);

    let ctx = reconciler.clone();
    let result = finalizer(&api, FINALIZER, obj, |event| async move {
        match event {
            Event::Apply(obj) => {
                let outcome = ctx.converge(&obj).await?;
                Ok(match outcome {
                    Outcome::Created => Action::requeue(REQUEUE_CREATED),
                    Outcome::Converged | Outcome::Waiting => Action::requeue(REQUEUE_CONVERGED),
                })
            }
            Event::Cleanup(obj) => {
                ctx.teardown(&obj).await?;
                Ok(Action::await_change())
            }
        }
    })
    .await;

    match result {
        Ok(action) => {
            reconciler.backoffs().reset(&key);
            Ok(action)
        }
        Err(kube_runtime::finalizer::Error::ApplyFailed(e))
        | Err(kube_runtime::finalizer::Error::CleanupFailed(e)) => Err(e),
        Err(e) => Err(ControllerError::Finalizer(e.to_string())),
    }
}

fn error_policy(
    obj: Arc<ManagedEndpoint>,
    error: &ControllerError,
    reconciler: Arc<Reconciler>,
) -> Action {
    let key = object_key(&obj);
    if error.is_dependency_violation() {
        warn!(object = %key, "Dependent resource still attached, requeueing");
        return Action::requeue(REQUEUE_DEPENDENCY);
    }
    let delay = reconciler.backoffs().next_delay(&key);
    error!(object = %key, error = %error, delay_secs = delay.as_secs(), "Reconcile failed");
    Action::requeue(delay)
}

/// Run the controller until the watch stream ends.
pub async fn run(
    reconciler: Arc<Reconciler>,
    namespace: Option<String>,
) -> Result<(), ControllerError> {
    let api: Api<ManagedEndpoint> = match &namespace {
        Some(ns) => Api::namespaced(reconciler.kube_client(), ns),
        None => Api::all(reconciler.kube_client()),
    };

    info!(
        namespace = namespace.as_deref().unwrap_or("all"),
        "Watching ManagedEndpoint resources"
    );
    Controller::new(api, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => info!(object = %obj, "Reconciled"),
                Err(e) => warn!(error = %e, "Reconcile stream error"),
            }
        })
        .await;
    info!(manager = MANAGER, "Controller stream ended");
    Ok(())
}
