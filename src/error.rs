use thiserror::Error;

/// Errors surfaced by the gateway and the resolvers.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable cluster credentials. Fatal, nothing else runs.
    #[error("failed to load cluster credentials: {0}")]
    Config(String),

    /// The Kubernetes API rejected the request or could not be reached.
    #[error("kubernetes api request failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("operation cancelled")]
    Cancelled,

    /// Every identity probe in the chain came back empty.
    #[error("could not find the cluster id")]
    ClusterIdNotFound,

    #[error("namespace {0} not found")]
    NamespaceNotFound(String),

    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("secret {namespace}/{name} has no {key} key")]
    MissingSecretKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("failed to parse kubeconfig: {0}")]
    Kubeconfig(String),

    /// The embedded kubeconfig lists no cluster, or its first cluster has no server.
    #[error("kubeconfig has no cluster server address")]
    NoClusterServer,

    #[error("no helm release secret found in namespace {0}")]
    NoReleaseSecret(String),

    #[error("failed to decode helm release: {0}")]
    ReleaseDecode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
