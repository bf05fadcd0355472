#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use k8s_openapi;
pub use kube;
pub use tokio_util::sync::CancellationToken;

pub mod cancel;
pub mod claputil;
pub mod cli;
pub mod dynamic;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod legacy;
pub mod output;
pub mod url;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use gateway::{ClusterGateway, KubeGateway};
pub use identity::{IdentityOptions, IdentityProbe, resolve_cluster_id};
pub use url::resolve_cluster_url;

/// Identifier reported for the cluster Rancher itself runs in.
pub const LOCAL_CLUSTER_ID: &str = "local";

/// Namespace of the Rancher server deployment on the local cluster.
pub const LOCAL_NAMESPACE: &str = "cattle-system";
pub const RANCHER_DEPLOYMENT: &str = "rancher";

/// Namespace the fleet agent is installed into on downstream clusters.
pub const FLEET_NAMESPACE: &str = "cattle-fleet-system";
/// Name shared by the fleet agent's config map and secret.
pub const FLEET_AGENT: &str = "fleet-agent";

pub const CLUSTER_NAME_LABEL: &str = "management.cattle.io/cluster-name";
/// Annotation of the form `<cluster-id>:<project-id>`.
pub const PROJECT_ID_ANNOTATION: &str = "field.cattle.io/projectId";

pub const IMPERSONATION_NAMESPACE: &str = "cattle-impersonation-system";

pub const SETTINGS_GROUP: &str = "management.cattle.io";
pub const SETTINGS_VERSION: &str = "v3";
pub const SETTINGS_RESOURCE: &str = "settings";
pub const SERVER_URL_SETTING: &str = "server-url";

/// Data key of the fleet agent secret holding its kubeconfig.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

pub const HELM_RELEASE_SECRET_TYPE: &str = "helm.sh/release.v1";
pub const HELM_RELEASE_KEY: &str = "release";
