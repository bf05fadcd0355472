//! Cluster id recovery from the fleet agent's Helm release record.
//!
//! Old agents carried none of the markers the default identity chain looks
//! for, but their Helm release values include the cluster name label. The
//! release is stored in a secret as base64 text, optionally gzip-compressed
//! underneath, wrapping a JSON release record.

use std::{collections::BTreeMap, io::Read};

use base64::{Engine, prelude::BASE64_STANDARD};
use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    CLUSTER_NAME_LABEL, Error, FLEET_NAMESPACE, HELM_RELEASE_KEY, HELM_RELEASE_SECRET_TYPE,
    Result, gateway::ClusterGateway,
};

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// The subset of a Helm release record needed to find the cluster name.
#[derive(Debug, Default, Deserialize)]
pub struct ReleaseDescriptor {
    #[serde(default)]
    config: Option<ReleaseValues>,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseValues {
    #[serde(default)]
    global: Option<GlobalValues>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalValues {
    #[serde(default)]
    fleet: Option<FleetValues>,
}

#[derive(Debug, Default, Deserialize)]
struct FleetValues {
    #[serde(default, rename = "clusterLabels")]
    cluster_labels: Option<BTreeMap<String, String>>,
}

impl ReleaseDescriptor {
    /// `config.global.fleet.clusterLabels["management.cattle.io/cluster-name"]`,
    /// when present and non-empty.
    pub fn cluster_name(&self) -> Option<&str> {
        self.config
            .as_ref()?
            .global
            .as_ref()?
            .fleet
            .as_ref()?
            .cluster_labels
            .as_ref()?
            .get(CLUSTER_NAME_LABEL)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// Decode a stored release: base64, then gunzip when the gzip magic number
/// leads the payload, then JSON.
pub fn decode_release(data: &[u8]) -> Result<ReleaseDescriptor> {
    let mut bytes = BASE64_STANDARD
        .decode(data)
        .map_err(|e| Error::ReleaseDecode(format!("invalid base64: {e}")))?;

    if bytes.len() > GZIP_MAGIC.len() && bytes.starts_with(&GZIP_MAGIC) {
        debug!("release payload is gzipped");
        let mut inflated = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| Error::ReleaseDecode(format!("invalid gzip stream: {e}")))?;
        bytes = inflated;
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::ReleaseDecode(format!("invalid release record: {e}")))
}

/// Newest Helm release secret among `secrets`.
///
/// Helm puts the revision in the secret name, so the greatest name wins.
/// The comparison is lexicographic: `v10` sorts before `v9`.
pub fn latest_release_secret(secrets: &[Secret]) -> Option<&Secret> {
    secrets
        .iter()
        .filter(|secret| secret.type_.as_deref() == Some(HELM_RELEASE_SECRET_TYPE))
        .max_by(|a, b| a.metadata.name.cmp(&b.metadata.name))
}

/// Read the cluster id out of the newest Helm release in the fleet namespace.
pub async fn cluster_id_from_helm_release<G: ClusterGateway>(
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

    let secrets = gateway.list_secrets(cancel, FLEET_NAMESPACE).await?;
    debug!(count = secrets.len(), "listed fleet namespace secrets");
    let secret = latest_release_secret(&secrets)
        .ok_or_else(|| Error::NoReleaseSecret(FLEET_NAMESPACE.to_string()))?;
    let name = secret.metadata.name.clone().unwrap_or_default();
    debug!(secret = %name, "using helm release secret");

    let data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(HELM_RELEASE_KEY))
        .ok_or_else(|| Error::MissingSecretKey {
            namespace: FLEET_NAMESPACE.to_string(),
            name,
            key: HELM_RELEASE_KEY.to_string(),
        })?;

    decode_release(&data.0)?
        .cluster_name()
        .map(str::to_string)
        .ok_or(Error::ClusterIdNotFound)
}
