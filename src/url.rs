//! Rancher server URL resolution.

use kube::config::Kubeconfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Error, FLEET_AGENT, FLEET_NAMESPACE, KUBECONFIG_KEY, Result, SERVER_URL_SETTING,
    SETTINGS_GROUP, SETTINGS_RESOURCE, SETTINGS_VERSION, dynamic::GroupVersionResource,
    gateway::ClusterGateway,
};

/// `settings.management.cattle.io/v3`, only served on the Rancher local cluster.
pub fn settings_resource() -> GroupVersionResource {
    GroupVersionResource::new(SETTINGS_GROUP, SETTINGS_VERSION, SETTINGS_RESOURCE)
}

/// Resolve the Rancher server URL.
///
/// The `server-url` setting is tried first. If it cannot be read or is empty,
/// the URL comes from the kubeconfig the fleet agent uses to reach Rancher,
/// and any failure on that path is returned as is.
pub async fn resolve_cluster_url<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<String> {
    match server_url_setting(gateway, cancel).await {
        Ok(Some(url)) => {
            info!(%url, "resolved url from server-url setting");
            return Ok(url);
        }
        Ok(None) => debug!("server-url setting not available"),
        Err(err) if err.is_cancelled() => return Err(err),
        Err(err) => warn!(error = %err, "failed to read server-url setting"),
    }

    let url = agent_kubeconfig_server(gateway, cancel).await?;
    info!(%url, "resolved url from fleet agent kubeconfig");
    Ok(url)
}

async fn server_url_setting<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let setting = gateway
        .get_dynamic(cancel, &settings_resource(), SERVER_URL_SETTING)
        .await?;
    Ok(setting.and_then(|setting| setting.string_field("value").map(str::to_string)))
}

async fn agent_kubeconfig_server<G: ClusterGateway>(
    gateway: &G,
    cancel: &CancellationToken,
) -> Result<String> {
    if gateway
        .get_namespace(cancel, FLEET_NAMESPACE)
        .await?
        .is_none()
    {
        return Err(Error::NamespaceNotFound(FLEET_NAMESPACE.to_string()));
    }

    let secret = gateway
        .get_secret(cancel, FLEET_NAMESPACE, FLEET_AGENT)
        .await?
        .ok_or_else(|| Error::SecretNotFound {
            namespace: FLEET_NAMESPACE.to_string(),
            name: FLEET_AGENT.to_string(),
        })?;

    let document = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_KEY))
        .ok_or_else(|| Error::MissingSecretKey {
            namespace: FLEET_NAMESPACE.to_string(),
            name: FLEET_AGENT.to_string(),
            key: KUBECONFIG_KEY.to_string(),
        })?;

    server_from_kubeconfig(&document.0)
}

/// Server address of the first cluster listed in a kubeconfig document.
pub fn server_from_kubeconfig(document: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(document).map_err(|e| Error::Kubeconfig(e.to_string()))?;
    let kubeconfig = Kubeconfig::from_yaml(text).map_err(|e| Error::Kubeconfig(e.to_string()))?;

    kubeconfig
        .clusters
        .first()
        .and_then(|named| named.cluster.as_ref())
        .and_then(|cluster| cluster.server.clone())
        .filter(|server| !server.is_empty())
        .ok_or(Error::NoClusterServer)
}
