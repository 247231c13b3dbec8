//! Clearing finalizers on instances the garbage collector cannot remove

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cancellable;
use crate::cluster::ClusterApi;
use crate::config::NukeConfig;
use crate::error::Phase;
use crate::resource::{clear_finalizers_patch, GenericResource, ResourceScope, ResourceType};
use crate::{Error, Result};

/// Strip finalizers from every instance of `resource_type` that still has some.
///
/// Namespaced kinds are listed one namespace at a time. The first failed
/// patch aborts the sweep. Returns the number of instances unstuck.
pub async fn remove_stuck_resources<C>(
    cancel: &CancellationToken,
    cluster: &C,
    resource_type: &ResourceType,
    config: &NukeConfig,
) -> Result<usize>
where
    C: ClusterApi + ?Sized,
{
    match resource_type.scope {
        ResourceScope::Cluster => sweep_scope(cancel, cluster, resource_type, None, config).await,
        ResourceScope::Namespaced => {
            let namespaces = match cancellable(cancel, cluster.list_namespaces()).await {
                Ok(namespaces) => namespaces,
                Err(e) if e.is_not_found() && config.tolerate_list_not_found => {
                    debug!("No namespaces to sweep.");
                    Vec::new()
                }
                Err(e) => return Err(Error::phase(Phase::ListNamespaces, "namespaces", e)),
            };

            let mut unstuck = 0;
            for namespace in &namespaces {
                unstuck +=
                    sweep_scope(cancel, cluster, resource_type, Some(namespace), config).await?;
            }
            Ok(unstuck)
        }
    }
}

async fn sweep_scope<C>(
    cancel: &CancellationToken,
    cluster: &C,
    resource_type: &ResourceType,
    namespace: Option<&str>,
    config: &NukeConfig,
) -> Result<usize>
where
    C: ClusterApi + ?Sized,
{
    let objects = match cancellable(cancel, cluster.list_objects(resource_type, namespace)).await {
        Ok(objects) => objects,
        Err(e) if e.is_not_found() && config.tolerate_list_not_found => {
            debug!(namespace, "{} no longer served.", resource_type.plural);
            return Ok(0);
        }
        Err(e) => {
            let target = match namespace {
                Some(ns) => format!("{} in {}", resource_type.plural, ns),
                None => resource_type.plural.clone(),
            };
            return Err(Error::phase(Phase::ListObjects, target, e));
        }
    };

    let patch = clear_finalizers_patch();
    let mut unstuck = 0;

    for object in objects.iter().filter(|o| o.is_stuck()) {
        let ident = object.ident();
        debug!(resource = %ident, "Nuking…");

        cancellable(cancel, cluster.patch_object(resource_type, object, &patch))
            .await
            .map_err(|e| Error::phase(Phase::Patch, ident, e))?;
        unstuck += 1;
    }

    Ok(unstuck)
}
