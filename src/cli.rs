use std::{
    ffi::OsStr,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueHint};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    claputil::namespace_value_completer,
    gateway::{ClusterGateway, KubeGateway},
    identity::{IdentityOptions, resolve_cluster_id},
    output::{ConfigMapTarget, OutputSink},
    url::resolve_cluster_url,
};

#[derive(Debug, Parser)]
#[command(
    name = "rcidf",
    version,
    about = "rcidf: rancher cluster id finder. also finds rancher url!",
    long_about = "rcidf finds the cluster id of a downstream Rancher cluster. It can also find the Rancher server url."
)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to a kubeconfig file; ambient or in-cluster credentials when unset
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub kubeconfig: Option<PathBuf>,

    /// Name of a configmap to create holding the result
    #[arg(long, global = true, value_name = "NAME", requires = "configmap_key")]
    pub configmap_name: Option<String>,

    /// Namespace of the configmap; the client's default namespace when unset
    #[arg(long, global = true, value_name = "NAMESPACE", add = namespace_value_completer())]
    pub configmap_namespace: Option<String>,

    /// Key in the configmap
    #[arg(long, global = true, value_name = "KEY")]
    pub configmap_key: Option<String>,

    /// Path to write the result to
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub write_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Find the id of the Rancher cluster
    Id {
        /// Also try the fleet agent's Helm release record, for very old agents
        #[arg(long)]
        helm_release_fallback: bool,
    },
    /// Find the url of the Rancher server
    Url,
}

/// Flag values for one invocation, fixed once parsed.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub debug: bool,
    pub kubeconfig: Option<PathBuf>,
    pub output: OutputSink,
}

fn non_empty<T: AsRef<OsStr>>(value: &Option<T>) -> Option<&T> {
    value
        .as_ref()
        .filter(|v| !AsRef::<OsStr>::as_ref(*v).is_empty())
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        let config_map = non_empty(&cli.configmap_name).map(|name| ConfigMapTarget {
            name: name.clone(),
            namespace: non_empty(&cli.configmap_namespace).cloned(),
            key: cli.configmap_key.clone().unwrap_or_default(),
        });

        Self {
            debug: cli.debug,
            kubeconfig: non_empty(&cli.kubeconfig).cloned(),
            output: OutputSink {
                config_map,
                write_file: non_empty(&cli.write_file).cloned(),
            },
        }
    }
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings::from(self)
    }

    /// Connect to the cluster and run the selected command, printing to stdout.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = self.settings();
        let cancel = CancellationToken::new();

        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupted, cancelling");
                on_interrupt.cancel();
            }
        });

        let gateway = KubeGateway::connect(settings.kubeconfig.as_deref())
            .await
            .context("failed to connect to the cluster")?;

        execute(&gateway, self.command, &settings, &cancel, &mut io::stdout()).await
    }
}

/// Resolve the value `command` asks for and hand it to the output sink.
pub async fn execute<G: ClusterGateway, W: Write>(
    gateway: &G,
    command: Command,
    settings: &Settings,
    cancel: &CancellationToken,
    out: &mut W,
) -> anyhow::Result<()> {
    let value = match command {
        Command::Id {
            helm_release_fallback,
        } => {
            let options = IdentityOptions {
                helm_release_fallback,
            };
            resolve_cluster_id(gateway, cancel, &options)
                .await
                .context("failed to resolve cluster id")?
        }
        Command::Url => resolve_cluster_url(gateway, cancel)
            .await
            .context("failed to resolve rancher url")?,
    };

    settings.output.deliver(gateway, cancel, &value, out).await
}
