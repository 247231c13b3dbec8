//! [`ClusterApi`] backed by a live API server

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use serde_json::Value;
use tracing::debug;

use super::ClusterApi;
use crate::resource::ResourceType;
use crate::{Error, Result};

/// Build a client from an explicit kubeconfig file, or infer one from the environment
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    let config = match kubeconfig {
        Some(path) => {
            debug!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::ConfigError(format!("Invalid kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::ConfigError(format!("Failed to infer kubeconfig: {}", e)))?,
    };

    Client::try_from(config)
        .map_err(|e| Error::ConfigError(format!("Failed to create kube client: {}", e)))
}

/// Cluster access through a [`kube::Client`]
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn crds(&self) -> Api<CustomResourceDefinition> {
        Api::all(self.client.clone())
    }

    fn dynamic(&self, resource_type: &ResourceType, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = resource_type.api_resource();
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_crd(&self, name: &str) -> Result<CustomResourceDefinition> {
        Ok(self.crds().get(name).await?)
    }

    async fn delete_crd(&self, name: &str) -> Result<()> {
        self.crds().delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_objects(
        &self,
        resource_type: &ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let list = self
            .dynamic(resource_type, namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn patch_object(
        &self,
        resource_type: &ResourceType,
        object: &DynamicObject,
        patch: &Value,
    ) -> Result<()> {
        let namespace = object.namespace();
        self.dynamic(resource_type, namespace.as_deref())
            .patch(&object.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
