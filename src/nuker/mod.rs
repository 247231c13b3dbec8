//! The nuke sequence: fetch and delete a CRD, unstick its instances, wait for it to go

pub mod convergence;
pub mod sweep;

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cluster::ClusterApi;
use crate::config::NukeConfig;
use crate::error::Phase;
use crate::resource::ResourceType;
use crate::{Error, Result};

pub use convergence::{wait_for_removal, Convergence};
pub use sweep::remove_stuck_resources;

/// How a successfully nuked target ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The CRD did not exist, nothing was done
    AlreadyGone,
    /// The CRD was deleted and disappeared within the timeout
    Converged { unstuck: usize },
    /// The CRD was deleted but is still present after the timeout
    StillPresent { unstuck: usize },
}

/// Run a cluster call, giving up as soon as `cancel` fires
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

/// Remove a CRD and clear finalizers on every instance still blocking it
#[instrument(skip(cancel, cluster, config))]
pub async fn nuke<C>(
    cancel: &CancellationToken,
    cluster: &C,
    crd: &str,
    config: &NukeConfig,
) -> Result<Outcome>
where
    C: ClusterApi + ?Sized,
{
    info!("Nuking…");

    let definition = match cancellable(cancel, cluster.get_crd(crd)).await {
        Ok(definition) => definition,
        Err(e) if e.is_not_found() => {
            debug!("CRD does not exist.");
            return Ok(Outcome::AlreadyGone);
        }
        Err(e) => return Err(Error::phase(Phase::Fetch, crd, e)),
    };

    // deleting first lets the garbage collector take every instance without finalizers
    match cancellable(cancel, cluster.delete_crd(crd)).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            debug!("CRD disappeared before it could be deleted.");
            return Ok(Outcome::AlreadyGone);
        }
        Err(e) => return Err(Error::phase(Phase::Delete, crd, e)),
    }

    let resource_type = ResourceType::from_crd(&definition)
        .map_err(|e| Error::phase(Phase::Resolve, crd, e))?;
    debug!(api_version = %resource_type.api_version, kind = %resource_type.kind, "Resolved resource type");

    let unstuck = remove_stuck_resources(cancel, cluster, &resource_type, config).await?;

    match wait_for_removal(cancel, cluster, crd, config).await? {
        Convergence::Removed => {
            info!(unstuck, "CRD is gone.");
            Ok(Outcome::Converged { unstuck })
        }
        Convergence::TimedOut => {
            warn!("CRD still exists, some resources might be blocked by owner references to them.");
            Ok(Outcome::StillPresent { unstuck })
        }
    }
}

/// Result of nuking one target
#[derive(Debug)]
pub struct TargetResult {
    pub crd: String,
    pub result: Result<Outcome>,
}

/// Results of a whole run
#[derive(Debug, Default)]
pub struct Report {
    pub targets: Vec<TargetResult>,
    /// Targets never attempted because the run was cancelled
    pub skipped: Vec<String>,
}

impl Report {
    /// Number of targets that failed
    pub fn failed(&self) -> usize {
        self.targets.iter().filter(|t| t.result.is_err()).count()
    }

    /// Number of targets nuked without error
    pub fn succeeded(&self) -> usize {
        self.targets.iter().filter(|t| t.result.is_ok()).count()
    }

    /// Whether every target was attempted and none failed
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }

    /// Outcome for a target, if it was attempted
    pub fn get(&self, crd: &str) -> Option<&Result<Outcome>> {
        self.targets.iter().find(|t| t.crd == crd).map(|t| &t.result)
    }
}

/// Nuke each CRD in turn.
///
/// A failing target is logged and recorded but never stops the others;
/// only cancellation ends the run early.
pub async fn nuke_all<C, S>(
    cancel: &CancellationToken,
    cluster: &C,
    crds: &[S],
    config: &NukeConfig,
) -> Report
where
    C: ClusterApi + ?Sized,
    S: AsRef<str>,
{
    let mut report = Report::default();
    let mut names = crds.iter().map(|name| name.as_ref().to_lowercase());

    for crd in names.by_ref() {
        let result = nuke(cancel, cluster, &crd, config).await;
        let cancelled = matches!(&result, Err(e) if e.is_cancelled());

        if let Err(e) = &result {
            error!(crd = %crd, "Failed to nuke: {}", e);
        }
        report.targets.push(TargetResult { crd, result });

        if cancelled {
            break;
        }
    }

    report.skipped.extend(names);
    if !report.skipped.is_empty() {
        warn!("Cancelled, skipping {} remaining CRD(s)", report.skipped.len());
    }

    report
}
