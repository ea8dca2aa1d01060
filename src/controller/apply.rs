//! # Apply Engine
//!
//! Performs one idempotent mutation of one object in one target namespace:
//!
//! - `Skip` does nothing
//! - `Ensure` prepares the object, tries an update and falls back to create on not-found
//! - `Remove` deletes, treating not-found as success
//!
//! Failures are logged and counted, never retried here. The next watch event or
//! resync tick is the retry.

use crate::controller::policy::prepare_object;
use crate::controller::resource::{object_name, ManagedResource};
use crate::controller::types::{Action, ApplyOutcome};
use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError};
use tracing::{error, info};

/// Apply `action` for `obj` in `namespace`.
///
/// Exactly one `apply.outcome` record is logged per call, except for `Skip`
/// which has no side effect at all.
pub async fn apply<S, K>(store: &S, action: Action, namespace: &str, obj: &K) -> ApplyOutcome
where
    S: ObjectStore,
    K: ManagedResource,
{
    let outcome = match action {
        Action::Skip => return ApplyOutcome::Noop,
        Action::Ensure => ensure(store, namespace, obj).await,
        Action::Remove => remove(store, namespace, obj).await,
    };

    let name = object_name(obj);
    match &outcome {
        ApplyOutcome::Error(cause) => error!(
            namespace,
            kind = %K::KIND,
            name,
            action = %action,
            error = cause.as_str(),
            "apply.outcome: error"
        ),
        other => info!(
            namespace,
            kind = %K::KIND,
            name,
            action = %action,
            outcome = other.as_str(),
            "apply.outcome"
        ),
    }
    metrics::increment_apply(K::KIND, action, &outcome);
    outcome
}

async fn ensure<S, K>(store: &S, namespace: &str, obj: &K) -> ApplyOutcome
where
    S: ObjectStore,
    K: ManagedResource,
{
    let Some(prepared) = prepare_object(obj) else {
        return ApplyOutcome::Skipped;
    };

    let result = match store.update(namespace, &prepared).await {
        Err(err) if err.is_not_found() => store.create(namespace, &prepared).await,
        other => other,
    };
    outcome_of(result.map(|_| ()))
}

async fn remove<S, K>(store: &S, namespace: &str, obj: &K) -> ApplyOutcome
where
    S: ObjectStore,
    K: ManagedResource,
{
    match store.delete::<K>(namespace, object_name(obj)).await {
        Err(err) if err.is_not_found() => ApplyOutcome::Success,
        other => outcome_of(other),
    }
}

fn outcome_of(result: Result<(), StoreError>) -> ApplyOutcome {
    match result {
        Ok(()) => ApplyOutcome::Success,
        Err(err) => ApplyOutcome::Error(err.to_string()),
    }
}
