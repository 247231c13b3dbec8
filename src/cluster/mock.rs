//! In-memory cluster for testing
//!
//! Holds CRDs, namespaces and custom resource instances in memory and mimics
//! the garbage collector closely enough to exercise the nuke sequence: once a
//! CRD is deleted, instances without finalizers vanish, and the CRD itself
//! goes away when no instances remain.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::Value;

use super::ClusterApi;
use crate::resource::{GenericResource, ResourceType};
use crate::{Error, Result};

/// Kind of cluster call, used for counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetCrd,
    DeleteCrd,
    ListNamespaces,
    ListObjects,
    PatchObject,
}

/// Error to inject into a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Api(String),
}

impl Failure {
    fn to_error(&self, what: &str) -> Error {
        match self {
            Failure::NotFound => Error::NotFound(what.to_string()),
            Failure::Api(msg) => Error::KubeError(msg.clone()),
        }
    }
}

/// A recorded cluster call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetCrd(String),
    DeleteCrd(String),
    ListNamespaces,
    ListObjects {
        api_version: String,
        kind: String,
        namespace: Option<String>,
    },
    PatchObject {
        ident: String,
        patch: Value,
    },
}

impl Call {
    fn operation(&self) -> Operation {
        match self {
            Call::GetCrd(_) => Operation::GetCrd,
            Call::DeleteCrd(_) => Operation::DeleteCrd,
            Call::ListNamespaces => Operation::ListNamespaces,
            Call::ListObjects { .. } => Operation::ListObjects,
            Call::PatchObject { .. } => Operation::PatchObject,
        }
    }
}

struct StoredCrd {
    crd: CustomResourceDefinition,
    deleting: bool,
    held: bool,
}

impl StoredCrd {
    fn owns(&self, obj: &DynamicObject) -> bool {
        let Some(types) = &obj.types else {
            return false;
        };
        let group = types.api_version.split('/').next().unwrap_or_default();
        group == self.crd.spec.group && types.kind == self.crd.spec.names.kind
    }
}

struct InjectedFailure {
    operation: Operation,
    target: Option<String>,
    failure: Failure,
    /// Matching calls to let through before failing
    skip: usize,
}

#[derive(Default)]
struct State {
    crds: BTreeMap<String, StoredCrd>,
    namespaces: Vec<String>,
    objects: Vec<DynamicObject>,
    patched: Vec<DynamicObject>,
    failures: Vec<InjectedFailure>,
    calls: Vec<Call>,
    unserve_on_delete: bool,
}

impl State {
    fn injected(&mut self, operation: Operation, target: Option<&str>) -> Option<Failure> {
        let injected = self.failures.iter_mut().find(|f| {
            f.operation == operation && (f.target.is_none() || f.target.as_deref() == target)
        })?;

        if injected.skip > 0 {
            injected.skip -= 1;
            return None;
        }
        Some(injected.failure.clone())
    }

    /// Drop unblocked instances of deleting CRDs, then CRDs with no instances left
    fn collect_garbage(&mut self) {
        let State { crds, objects, .. } = self;

        objects.retain(|obj| {
            obj.is_stuck() || !crds.values().any(|c| c.deleting && c.owns(obj))
        });

        crds.retain(|_, c| c.held || !c.deleting || objects.iter().any(|obj| c.owns(obj)));
    }
}

/// In-memory [`ClusterApi`] with call recording
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a CRD
    pub fn with_crd(self, crd: CustomResourceDefinition) -> Self {
        self.state().crds.insert(
            crd.name_any(),
            StoredCrd {
                crd,
                deleting: false,
                held: false,
            },
        );
        self
    }

    /// Register namespaces
    pub fn with_namespaces(self, namespaces: &[&str]) -> Self {
        self.state()
            .namespaces
            .extend(namespaces.iter().map(|ns| ns.to_string()));
        self
    }

    /// Store a custom resource instance
    pub fn with_object(self, object: DynamicObject) -> Self {
        self.state().objects.push(object);
        self
    }

    /// Keep a CRD around after deletion, as an external owner reference would
    pub fn hold_crd(self, name: &str) -> Self {
        if let Some(stored) = self.state().crds.get_mut(name) {
            stored.held = true;
        }
        self
    }

    /// Stop serving a kind as soon as its CRD is being deleted
    pub fn unserve_on_delete(self) -> Self {
        self.state().unserve_on_delete = true;
        self
    }

    /// Make every matching call fail. `target` is the CRD name, the plural of
    /// a listed resource or the `namespace/name` of a patched object; `None`
    /// matches all calls of the operation.
    pub fn fail(self, operation: Operation, target: Option<&str>, failure: Failure) -> Self {
        self.fail_after(operation, target, 0, failure)
    }

    /// Like [`fail`](Self::fail), but the first `skip` matching calls succeed
    pub fn fail_after(
        self,
        operation: Operation,
        target: Option<&str>,
        skip: usize,
        failure: Failure,
    ) -> Self {
        self.state().failures.push(InjectedFailure {
            operation,
            target: target.map(str::to_string),
            failure,
            skip,
        });
        self
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of calls of one kind
    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Whether a CRD is still present
    pub fn crd_exists(&self, name: &str) -> bool {
        self.state().crds.contains_key(name)
    }

    /// Instances still present
    pub fn objects(&self) -> Vec<DynamicObject> {
        self.state().objects.clone()
    }

    /// Instances as they looked right after each patch
    pub fn patched(&self) -> Vec<DynamicObject> {
        self.state().patched.clone()
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn get_crd(&self, name: &str) -> Result<CustomResourceDefinition> {
        let mut state = self.state();
        state.calls.push(Call::GetCrd(name.to_string()));

        if let Some(failure) = state.injected(Operation::GetCrd, Some(name)) {
            return Err(failure.to_error(name));
        }

        state
            .crds
            .get(name)
            .map(|stored| stored.crd.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn delete_crd(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteCrd(name.to_string()));

        if let Some(failure) = state.injected(Operation::DeleteCrd, Some(name)) {
            return Err(failure.to_error(name));
        }

        let stored = state
            .crds
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        stored.deleting = true;
        state.collect_garbage();
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        state.calls.push(Call::ListNamespaces);

        if let Some(failure) = state.injected(Operation::ListNamespaces, None) {
            return Err(failure.to_error("namespaces"));
        }

        Ok(state.namespaces.clone())
    }

    async fn list_objects(
        &self,
        resource_type: &ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let mut state = self.state();
        state.calls.push(Call::ListObjects {
            api_version: resource_type.api_version.clone(),
            kind: resource_type.kind.clone(),
            namespace: namespace.map(str::to_string),
        });

        let plural = resource_type.plural.as_str();
        if let Some(failure) = state.injected(Operation::ListObjects, Some(plural)) {
            return Err(failure.to_error(plural));
        }

        let owner = state.crds.values().find(|c| {
            c.crd.spec.group == resource_type.group && c.crd.spec.names.kind == resource_type.kind
        });
        let served = match owner {
            Some(c) => !(c.deleting && state.unserve_on_delete),
            None => false,
        };
        if !served {
            return Err(Error::NotFound(resource_type.plural.clone()));
        }

        Ok(state
            .objects
            .iter()
            .filter(|obj| {
                obj.types.as_ref().is_some_and(|t| {
                    t.api_version == resource_type.api_version && t.kind == resource_type.kind
                })
            })
            .filter(|obj| namespace.is_none() || obj.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn patch_object(
        &self,
        _resource_type: &ResourceType,
        object: &DynamicObject,
        patch: &Value,
    ) -> Result<()> {
        let ident = object.ident();
        let mut state = self.state();
        state.calls.push(Call::PatchObject {
            ident: ident.clone(),
            patch: patch.clone(),
        });

        if let Some(failure) = state.injected(Operation::PatchObject, Some(ident.as_str())) {
            return Err(failure.to_error(&ident));
        }

        let stored = state
            .objects
            .iter_mut()
            .find(|obj| obj.ident() == ident)
            .ok_or_else(|| Error::NotFound(ident.clone()))?;

        let mut doc = serde_json::to_value(&*stored)
            .map_err(|e| Error::KubeError(format!("Failed to encode {}: {}", ident, e)))?;
        merge(&mut doc, patch);
        *stored = serde_json::from_value(doc)
            .map_err(|e| Error::KubeError(format!("Failed to decode {}: {}", ident, e)))?;

        let snapshot = stored.clone();
        state.patched.push(snapshot);
        state.collect_garbage();
        Ok(())
    }
}

/// JSON merge patch (RFC 7386)
fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Default::default());
    }

    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
