//! In-memory [`ClusterGateway`] with call recording, for resolver tests.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashSet},
    io::Write,
};

use base64::{Engine, prelude::BASE64_STANDARD};
use flate2::{Compression, write::GzEncoder};

use k8s_openapi::{
    ByteString,
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Namespace, Secret},
    },
};
use kube::{Error as KubeError, api::ObjectMeta, core::ErrorResponse};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::{
    Error, Result,
    dynamic::{DynamicObject, GroupVersionResource},
    gateway::ClusterGateway,
};

pub(crate) const GET_NAMESPACE: &str = "get_namespace";
pub(crate) const LIST_SECRETS: &str = "list_secrets";
pub(crate) const GET_SECRET: &str = "get_secret";
pub(crate) const GET_CONFIG_MAP: &str = "get_config_map";
pub(crate) const GET_DEPLOYMENT: &str = "get_deployment";
pub(crate) const GET_DYNAMIC: &str = "get_dynamic";
pub(crate) const CREATE_CONFIG_MAP: &str = "create_config_map";

pub(crate) fn api_error(code: u16) -> Error {
    Error::Kube(KubeError::Api(
        ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status={code}"),
            reason: "Test".to_string(),
            code,
        },
    ))
}

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

pub(crate) fn secret(namespace: &str, name: &str) -> Secret {
    Secret {
        metadata: meta(Some(namespace), name),
        ..Default::default()
    }
}

pub(crate) fn annotated_secret(namespace: &str, name: &str, key: &str, value: &str) -> Secret {
    let mut secret = secret(namespace, name);
    secret.metadata.annotations = Some(BTreeMap::from([(key.to_string(), value.to_string())]));
    secret
}

pub(crate) fn secret_with_data(namespace: &str, name: &str, key: &str, value: &[u8]) -> Secret {
    let mut secret = secret(namespace, name);
    secret.data = Some(BTreeMap::from([(
        key.to_string(),
        ByteString(value.to_vec()),
    )]));
    secret
}

pub(crate) fn labeled_config_map(namespace: &str, name: &str, key: &str, value: &str) -> ConfigMap {
    let mut config_map = ConfigMap {
        metadata: meta(Some(namespace), name),
        ..Default::default()
    };
    config_map.metadata.labels = Some(BTreeMap::from([(key.to_string(), value.to_string())]));
    config_map
}

/// Helm release secret payload as stored by Helm: JSON, optionally gzipped, base64.
pub(crate) fn release_payload(cluster_name: &str, gzip: bool) -> Vec<u8> {
    let record = json!({
        "name": "fleet-agent-local",
        "version": 1,
        "config": {
            "global": {
                "fleet": {
                    "clusterLabels": {
                        "management.cattle.io/cluster-display-name": "downstream",
                        "management.cattle.io/cluster-name": cluster_name,
                    }
                }
            }
        }
    });
    let mut bytes = serde_json::to_vec(&record).expect("release fixture should serialize");
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).expect("gzip write");
        bytes = encoder.finish().expect("gzip finish");
    }
    BASE64_STANDARD.encode(bytes).into_bytes()
}

#[derive(Default)]
pub(crate) struct FakeGateway {
    namespaces: HashSet<String>,
    secrets: Vec<Secret>,
    config_maps: Vec<ConfigMap>,
    deployments: Vec<Deployment>,
    dynamic: Vec<(GroupVersionResource, DynamicObject)>,
    failing: HashSet<&'static str>,
    calls: RefCell<Vec<&'static str>>,
    created: RefCell<Vec<ConfigMap>>,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_namespace(mut self, name: &str) -> Self {
        self.namespaces.insert(name.to_string());
        self
    }

    pub(crate) fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    pub(crate) fn with_config_map(mut self, config_map: ConfigMap) -> Self {
        self.config_maps.push(config_map);
        self
    }

    pub(crate) fn with_deployment(mut self, namespace: &str, name: &str) -> Self {
        self.deployments.push(Deployment {
            metadata: meta(Some(namespace), name),
            ..Default::default()
        });
        self
    }

    /// Cluster-scoped dynamic object with a top-level `value` field.
    pub(crate) fn with_dynamic(mut self, gvr: GroupVersionResource, name: &str, value: &str) -> Self {
        let object = serde_json::from_value(json!({
            "metadata": { "name": name },
            "value": value,
        }))
        .expect("dynamic fixture should deserialize");
        self.dynamic.push((gvr, object));
        self
    }

    /// Make every call to `method` fail with a transport-style error.
    pub(crate) fn failing(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    pub(crate) fn calls(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|call| **call == method).count()
    }

    pub(crate) fn call_log(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub(crate) fn created(&self) -> Vec<ConfigMap> {
        self.created.borrow().clone()
    }

    fn record(&self, cancel: &CancellationToken, method: &'static str) -> Result<()> {
        self.calls.borrow_mut().push(method);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.failing.contains(method) {
            return Err(api_error(500));
        }
        Ok(())
    }
}

fn find<T: kube::Resource + Clone>(items: &[T], namespace: &str, name: &str) -> Option<T> {
    items
        .iter()
        .find(|item| {
            item.meta().namespace.as_deref() == Some(namespace)
                && item.meta().name.as_deref() == Some(name)
        })
        .cloned()
}

impl ClusterGateway for FakeGateway {
    async fn get_namespace(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> Result<Option<Namespace>> {
        self.record(cancel, GET_NAMESPACE)?;
        Ok(self.namespaces.contains(name).then(|| Namespace {
            metadata: meta(None, name),
            ..Default::default()
        }))
    }

    async fn list_secrets(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> Result<Vec<Secret>> {
        self.record(cancel, LIST_SECRETS)?;
        Ok(self
            .secrets
            .iter()
            .filter(|secret| secret.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>> {
        self.record(cancel, GET_SECRET)?;
        Ok(find(&self.secrets, namespace, name))
    }

    async fn get_config_map(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>> {
        self.record(cancel, GET_CONFIG_MAP)?;
        Ok(find(&self.config_maps, namespace, name))
    }

    async fn get_deployment(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>> {
        self.record(cancel, GET_DEPLOYMENT)?;
        Ok(find(&self.deployments, namespace, name))
    }

    async fn get_dynamic(
        &self,
        cancel: &CancellationToken,
        gvr: &GroupVersionResource,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        self.record(cancel, GET_DYNAMIC)?;
        Ok(self
            .dynamic
            .iter()
            .find(|(candidate, object)| {
                candidate == gvr && object.metadata.name.as_deref() == Some(name)
            })
            .map(|(_, object)| object.clone()))
    }

    async fn create_config_map(
        &self,
        cancel: &CancellationToken,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        self.record(cancel, CREATE_CONFIG_MAP)?;
        self.created.borrow_mut().push(config_map.clone());
        Ok(config_map.clone())
    }
}
