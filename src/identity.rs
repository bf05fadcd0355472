//! Cluster identity resolution.
//!
//! The probes run in a fixed order and the first one that yields an
//! identifier wins. A failed request is logged and treated like "not found",
//! except cancellation, which aborts the whole chain.

use kube::api::ObjectMeta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    CLUSTER_NAME_LABEL, Error, FLEET_AGENT, FLEET_NAMESPACE, IMPERSONATION_NAMESPACE,
    LOCAL_CLUSTER_ID, LOCAL_NAMESPACE, PROJECT_ID_ANNOTATION, RANCHER_DEPLOYMENT, Result,
    gateway::ClusterGateway, legacy,
};

/// Identifier found by a probe, `None` when the probe came up empty.
pub type ProbeOutcome = Option<String>;

/// One strategy for locating the cluster identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProbe {
    /// The Rancher server deployment exists, so this is the local cluster.
    LocalCluster,
    /// Cluster name label on the fleet agent config map.
    AgentConfigMap,
    /// Project id annotation on the fleet agent secret.
    AgentSecretAnnotation,
    /// Project id annotation on any secret in the impersonation namespace.
    ImpersonationSecrets,
    /// Cluster label inside the newest fleet agent Helm release. Opt-in only.
    HelmRelease,
}

impl IdentityProbe {
    /// Default probe order.
    pub const CHAIN: [IdentityProbe; 4] = [
        IdentityProbe::LocalCluster,
        IdentityProbe::AgentConfigMap,
        IdentityProbe::AgentSecretAnnotation,
        IdentityProbe::ImpersonationSecrets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IdentityProbe::LocalCluster => "local-cluster",
            IdentityProbe::AgentConfigMap => "agent-configmap",
            IdentityProbe::AgentSecretAnnotation => "agent-secret-annotation",
            IdentityProbe::ImpersonationSecrets => "impersonation-secrets",
            IdentityProbe::HelmRelease => "helm-release",
        }
    }

    pub async fn probe<G: ClusterGateway>(
        self,
        gateway: &G,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome> {
        match self {
            IdentityProbe::LocalCluster => local_cluster(gateway, cancel).await,
            IdentityProbe::AgentConfigMap => agent_config_map(gateway, cancel).await,
            IdentityProbe::AgentSecretAnnotation => agent_secret_annotation(gateway, cancel).await,
            IdentityProbe::ImpersonationSecrets => impersonation_secrets(gateway, cancel).await,
            IdentityProbe::HelmRelease => legacy::cluster_id_from_helm_release(gateway, cancel)
                .await
                .map(Some),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOptions {
    /// Append [`IdentityProbe::HelmRelease`] after the default chain,
    /// for agents too old to carry the newer markers.
    pub helm_release_fallback: bool,
}

impl IdentityOptions {
    pub fn chain(&self) -> Vec<IdentityProbe> {
        let mut chain = IdentityProbe::CHAIN.to_vec();
        if self.helm_release_fallback {
            chain.push(IdentityProbe::HelmRelease);
        }
        chain
    }
}

/// Resolve the cluster identifier by running each probe until one succeeds.
///
/// # Errors
/// [`Error::ClusterIdNotFound`] when every probe comes up empty,
/// [`Error::Cancelled`] when `cancel` fires.
pub async fn resolve_cluster_id<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
    options: &IdentityOptions,
) -> Result<String> {
    for probe in options.chain() {
        debug!(probe = probe.name(), "running identity probe");
        match probe.probe(gateway, cancel).await {
            Ok(Some(cluster_id)) => {
                info!(probe = probe.name(), %cluster_id, "resolved cluster id");
                return Ok(cluster_id);
            }
            Ok(None) => debug!(probe = probe.name(), "no cluster id found"),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => warn!(probe = probe.name(), error = %err, "identity probe failed"),
        }
    }

    Err(Error::ClusterIdNotFound)
}

/// Cluster id part of a `<cluster-id>:<project-id>` annotation value.
pub fn cluster_id_from_project_id(value: &str) -> Option<&str> {
    value.split(':').next().filter(|id| !id.is_empty())
}

fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

async fn local_cluster<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome> {
    let deployment = gateway
        .get_deployment(cancel, LOCAL_NAMESPACE, RANCHER_DEPLOYMENT)
        .await?;
    Ok(deployment.map(|_| LOCAL_CLUSTER_ID.to_string()))
}

async fn agent_config_map<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome> {
    let Some(config_map) = gateway
        .get_config_map(cancel, FLEET_NAMESPACE, FLEET_AGENT)
        .await?
    else {
        return Ok(None);
    };

    Ok(config_map
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(CLUSTER_NAME_LABEL))
        .filter(|value| !value.is_empty())
        .cloned())
}

async fn agent_secret_annotation<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome> {
    let Some(secret) = gateway
        .get_secret(cancel, FLEET_NAMESPACE, FLEET_AGENT)
        .await?
    else {
        return Ok(None);
    };

    Ok(annotation(&secret.metadata, PROJECT_ID_ANNOTATION)
        .and_then(cluster_id_from_project_id)
        .map(str::to_string))
}

async fn impersonation_secrets<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome> {
    if gateway
        .get_namespace(cancel, IMPERSONATION_NAMESPACE)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let secrets = gateway.list_secrets(cancel, IMPERSONATION_NAMESPACE).await?;
    Ok(secrets
        .iter()
        .find_map(|secret| annotation(&secret.metadata, PROJECT_ID_ANNOTATION))
        .and_then(cluster_id_from_project_id)
        .map(str::to_string))
}
