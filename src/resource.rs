//! Runtime-typed view of custom resources
//!
//! The kind being swept is only known once the CRD has been fetched, so
//! instances are handled as loosely typed documents ([`DynamicObject`])
//! addressed by a [`ResourceType`] resolved from the CRD.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{ApiResource, DynamicObject};
use kube::ResourceExt;
use serde_json::{json, Value};

use crate::{Error, Result};

/// Scope value of a namespaced CRD
const NAMESPACED: &str = "Namespaced";

/// Name, namespace and finalizer access for objects of any kind
pub trait GenericResource {
    /// Object name
    fn resource_name(&self) -> String;

    /// Object namespace, `None` for cluster-scoped objects
    fn resource_namespace(&self) -> Option<String>;

    /// Ordered finalizer list
    fn pending_finalizers(&self) -> &[String];

    /// Replace the finalizer list
    fn set_finalizers(&mut self, finalizers: Vec<String>);

    /// `namespace/name`, or the bare name for cluster-scoped objects
    fn ident(&self) -> String {
        match self.resource_namespace() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, self.resource_name()),
            _ => self.resource_name(),
        }
    }

    /// Whether something still blocks physical removal of the object
    fn is_stuck(&self) -> bool {
        !self.pending_finalizers().is_empty()
    }
}

impl GenericResource for DynamicObject {
    fn resource_name(&self) -> String {
        self.name_any()
    }

    fn resource_namespace(&self) -> Option<String> {
        self.namespace()
    }

    fn pending_finalizers(&self) -> &[String] {
        self.metadata.finalizers.as_deref().unwrap_or_default()
    }

    fn set_finalizers(&mut self, finalizers: Vec<String>) {
        self.metadata.finalizers = if finalizers.is_empty() {
            None
        } else {
            Some(finalizers)
        };
    }
}

/// Whether instances of a CRD live in namespaces or at cluster level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    Namespaced,
    Cluster,
}

/// Everything needed to address instances of a custom resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    /// `<group>/<version>`
    pub api_version: String,
    pub kind: String,
    pub plural: String,
    pub scope: ResourceScope,
}

impl ResourceType {
    /// Resolve the served API version, kind and scope of a CRD
    pub fn from_crd(crd: &CustomResourceDefinition) -> Result<Self> {
        let spec = &crd.spec;
        let version = served_version(crd)?;

        let scope = if spec.scope == NAMESPACED {
            ResourceScope::Namespaced
        } else {
            ResourceScope::Cluster
        };

        Ok(Self {
            group: spec.group.clone(),
            version: version.to_string(),
            api_version: format!("{}/{}", spec.group, version),
            kind: spec.names.kind.clone(),
            plural: spec.names.plural.clone(),
            scope,
        })
    }

    /// Dynamic API resource for use with [`kube::Api`]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// `<group>/<version>` of the first served version, in listed order
pub fn served_api_version(crd: &CustomResourceDefinition) -> Result<String> {
    let version = served_version(crd)?;
    Ok(format!("{}/{}", crd.spec.group, version))
}

fn served_version(crd: &CustomResourceDefinition) -> Result<&str> {
    crd.spec
        .versions
        .iter()
        .find(|v| v.served)
        .map(|v| v.name.as_str())
        .ok_or_else(|| Error::NoServedVersion {
            crd: crd.name_any(),
        })
}

/// Merge patch that drops the finalizer list and nothing else
pub fn clear_finalizers_patch() -> Value {
    json!({
        "metadata": {
            "finalizers": null
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
        CustomResourceDefinitionVersion,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn version(name: &str, served: bool) -> CustomResourceDefinitionVersion {
        CustomResourceDefinitionVersion {
            name: name.to_string(),
            served,
            ..Default::default()
        }
    }

    fn crd(scope: &str, versions: Vec<CustomResourceDefinitionVersion>) -> CustomResourceDefinition {
        CustomResourceDefinition {
            metadata: ObjectMeta {
                name: Some("widgets.example.com".to_string()),
                ..Default::default()
            },
            spec: CustomResourceDefinitionSpec {
                group: "example.com".to_string(),
                names: CustomResourceDefinitionNames {
                    kind: "Widget".to_string(),
                    plural: "widgets".to_string(),
                    ..Default::default()
                },
                scope: scope.to_string(),
                versions,
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn first_served_version_wins() {
        let crd = crd(
            "Namespaced",
            vec![
                version("v1alpha1", false),
                version("v1beta1", true),
                version("v1", true),
            ],
        );

        assert_eq!(served_api_version(&crd).unwrap(), "example.com/v1beta1");
    }

    #[test]
    fn no_served_version_is_an_error() {
        let crd = crd("Cluster", vec![version("v1alpha1", false), version("v1", false)]);

        let err = ResourceType::from_crd(&crd).unwrap_err();
        assert!(matches!(err, Error::NoServedVersion { ref crd } if crd == "widgets.example.com"));
    }

    #[test]
    fn resource_type_carries_scope_and_names() {
        let namespaced = ResourceType::from_crd(&crd("Namespaced", vec![version("v1", true)])).unwrap();
        assert_eq!(namespaced.scope, ResourceScope::Namespaced);
        assert_eq!(namespaced.api_version, "example.com/v1");
        assert_eq!(namespaced.kind, "Widget");
        assert_eq!(namespaced.plural, "widgets");

        let cluster = ResourceType::from_crd(&crd("Cluster", vec![version("v1", true)])).unwrap();
        assert_eq!(cluster.scope, ResourceScope::Cluster);
        assert_eq!(cluster.api_resource().plural, "widgets");
    }

    #[test]
    fn ident_includes_namespace_when_present() {
        let ar = ResourceType::from_crd(&crd("Namespaced", vec![version("v1", true)]))
            .unwrap()
            .api_resource();

        let namespaced = DynamicObject::new("gizmo", &ar).within("team-a");
        assert_eq!(namespaced.ident(), "team-a/gizmo");

        let cluster = DynamicObject::new("gizmo", &ar);
        assert_eq!(cluster.ident(), "gizmo");
    }

    #[test]
    fn finalizers_round_trip_through_metadata() {
        let ar = ResourceType::from_crd(&crd("Cluster", vec![version("v1", true)]))
            .unwrap()
            .api_resource();
        let mut obj = DynamicObject::new("gizmo", &ar);
        assert!(!obj.is_stuck());

        obj.set_finalizers(vec!["a.b/finalizer".to_string()]);
        assert!(obj.is_stuck());
        assert_eq!(obj.pending_finalizers(), ["a.b/finalizer".to_string()]);

        obj.set_finalizers(Vec::new());
        assert!(obj.metadata.finalizers.is_none());
    }

    #[test]
    fn clear_patch_only_touches_finalizers() {
        let patch = clear_finalizers_patch();
        let top = patch.as_object().unwrap();
        assert_eq!(top.len(), 1);

        let metadata = top["metadata"].as_object().unwrap();
        assert_eq!(metadata.len(), 1);
        assert!(metadata["finalizers"].is_null());
    }
}
