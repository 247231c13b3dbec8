//! Waiting for a deleted CRD to disappear

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cancellable;
use crate::cluster::ClusterApi;
use crate::config::NukeConfig;
use crate::error::Phase;
use crate::{Error, Result};

/// Terminal state of the convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The CRD is gone
    Removed,
    /// The CRD was still there when the timeout elapsed
    TimedOut,
}

/// Poll for the CRD until it is gone or `config.timeout` elapses.
///
/// The first check happens immediately. Running out of time is not an error.
pub async fn wait_for_removal<C>(
    cancel: &CancellationToken,
    cluster: &C,
    crd: &str,
    config: &NukeConfig,
) -> Result<Convergence>
where
    C: ClusterApi + ?Sized,
{
    let deadline = Instant::now() + config.timeout;

    loop {
        match cancellable(cancel, cluster.get_crd(crd)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(Convergence::Removed),
            Err(e) => return Err(Error::phase(Phase::Poll, crd, e)),
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("Gave up waiting after {:?}", config.timeout);
            return Ok(Convergence::TimedOut);
        }

        let pause = config.poll_interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = sleep(pause) => {}
        }
    }
}
