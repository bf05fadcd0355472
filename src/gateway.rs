use std::{future::Future, path::Path};

use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Namespace, Secret},
};
use kube::{
    Api, Client, Config,
    api::{ListParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    Error, Result,
    cancel::ApiCancelExt,
    dynamic::{DynamicObject, GroupVersionResource},
};

/// Narrow view of the cluster API consumed by the resolvers.
///
/// Lookups return `Ok(None)` when the object does not exist; `Err` means the
/// request itself failed (transport, permission, cancellation).
pub trait ClusterGateway {
    fn get_namespace(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> impl Future<Output = Result<Option<Namespace>>>;

    /// All secrets in `namespace`, in the order the API server lists them.
    fn list_secrets(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<Secret>>>;

    fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Secret>>>;

    fn get_config_map(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<ConfigMap>>>;

    fn get_deployment(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Deployment>>>;

    /// Cluster-scoped object addressed by group/version/resource.
    fn get_dynamic(
        &self,
        cancel: &CancellationToken,
        gvr: &GroupVersionResource,
        name: &str,
    ) -> impl Future<Output = Result<Option<DynamicObject>>>;

    /// Create `config_map` in its own namespace, or in the client's default
    /// namespace when it has none.
    fn create_config_map(
        &self,
        cancel: &CancellationToken,
        config_map: &ConfigMap,
    ) -> impl Future<Output = Result<ConfigMap>>;
}

/// [`ClusterGateway`] backed by a single `kube::Client`.
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an explicit kubeconfig file, or from ambient
    /// credentials (in-cluster service account, `KUBECONFIG`, `~/.kube/config`).
    ///
    /// # Errors
    /// Returns [`Error::Config`] when no usable credentials can be loaded.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                debug!(path = %path.display(), "using kubeconfig file");
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::Config(format!("failed to read kubeconfig {}: {e}", path.display()))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| Error::Config(format!("failed to load kubeconfig: {e}")))?
            }
            None => {
                debug!("inferring ambient cluster credentials");
                Config::infer()
                    .await
                    .map_err(|e| Error::Config(format!("failed to infer config: {e}")))?
            }
        };

        let client = Client::try_from(config)
            .map_err(|e| Error::Config(format!("failed to create client: {e}")))?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl ClusterGateway for KubeGateway {
    async fn get_namespace(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> Result<Option<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get_opt_cancellable(cancel, name).await
    }

    async fn list_secrets(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> Result<Vec<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list_cancellable(cancel, &ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_secret(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt_cancellable(cancel, name).await
    }

    async fn get_config_map(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt_cancellable(cancel, name).await
    }

    async fn get_deployment(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt_cancellable(cancel, name).await
    }

    async fn get_dynamic(
        &self,
        cancel: &CancellationToken,
        gvr: &GroupVersionResource,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let api_resource = gvr.to_api_resource();
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
        api.get_opt_cancellable(cancel, name).await
    }

    async fn create_config_map(
        &self,
        cancel: &CancellationToken,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap> {
        let api: Api<ConfigMap> = match config_map.metadata.namespace.as_deref() {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::default_namespaced(self.client.clone()),
        };
        api.create_cancellable(cancel, &PostParams::default(), config_map)
            .await
    }
}
