//! Cluster API access
//!
//! The nuke sequence only needs a handful of calls against the API server.
//! They are collected in [`ClusterApi`] so the sequence can run against a
//! real cluster ([`KubeCluster`]) or an in-memory one ([`MockCluster`]).

pub mod client;
pub mod mock;

pub use client::{connect, KubeCluster};
pub use mock::{Call, Failure, MockCluster, Operation};

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::DynamicObject;
use serde_json::Value;

use crate::resource::ResourceType;
use crate::Result;

/// Calls the nuke sequence makes against the cluster.
///
/// Missing objects and unserved resource types are reported as
/// [`Error::NotFound`](crate::Error::NotFound); callers decide whether that is fatal.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a CRD by name
    async fn get_crd(&self, name: &str) -> Result<CustomResourceDefinition>;

    /// Issue a delete for a CRD
    async fn delete_crd(&self, name: &str) -> Result<()>;

    /// Names of all namespaces
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// List instances of a custom resource, optionally restricted to one namespace
    async fn list_objects(
        &self,
        resource_type: &ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;

    /// Apply a JSON merge patch to an instance
    async fn patch_object(
        &self,
        resource_type: &ResourceType,
        object: &DynamicObject,
        patch: &Value,
    ) -> Result<()>;
}
