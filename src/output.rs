use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::gateway::ClusterGateway;

/// Config map to record the resolved value in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapTarget {
    pub name: String,
    /// `None` means the client's default namespace.
    pub namespace: Option<String>,
    pub key: String,
}

impl ConfigMapTarget {
    pub fn to_config_map(&self, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: self.namespace.clone(),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(self.key.clone(), value.to_string())])),
            ..Default::default()
        }
    }
}

/// Where a resolved value goes besides stdout.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    pub config_map: Option<ConfigMapTarget>,
    pub write_file: Option<PathBuf>,
}

impl OutputSink {
    /// Write the config map, then the file, then print `value` to `out`.
    /// Nothing is printed if a side effect fails.
    pub async fn deliver<G: ClusterGateway, W: Write>(
        &self,
        gateway: &G,
        cancel: &CancellationToken,
        value: &str,
        out: &mut W,
    ) -> anyhow::Result<()> {
        if let Some(target) = &self.config_map {
            debug!(name = %target.name, namespace = ?target.namespace, key = %target.key, "creating configmap");
            gateway
                .create_config_map(cancel, &target.to_config_map(value))
                .await
                .with_context(|| format!("failed to create configmap {}", target.name))?;
            info!(name = %target.name, "wrote value to configmap");
        }

        if let Some(path) = &self.write_file {
            write_value_file(path, value)
                .with_context(|| format!("failed to write {path:?}"))?;
            info!(path = %path.display(), "wrote value to file");
        }

        print_value(out, value).context("failed to write to stdout")
    }
}

/// Write `value` verbatim, truncating any existing file. New files get mode
/// `0o666` before umask.
pub fn write_value_file(path: &Path, value: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o666);
    }

    let mut file = options.open(path)?;
    file.write_all(value.as_bytes())?;
    file.flush()
}

/// Print without a trailing newline.
pub fn print_value<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    out.write_all(value.as_bytes())?;
    out.flush()
}
