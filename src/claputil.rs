use std::ffi::OsStr;

use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, api::ListParams};
use tokio::{runtime::Handle, task};

use crate::gateway::KubeGateway;

pub use clap_complete::env::CompleteEnv;

/// Create an `ArgValueCompleter` that lists namespaces visible to the ambient credentials.
///
/// This makes a network call, so it may be slow, and it returns no candidates
/// on any connection or permission failure. `--kubeconfig` is not considered
/// because other argument values are not available to completers.
/// See https://github.com/clap-rs/clap/issues/1910 for more details.
pub fn namespace_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let prefix = input.to_string_lossy().trim().to_string();

        let lookup = async move {
            let Ok(gateway) = KubeGateway::connect(None).await else {
                return Vec::new();
            };
            let api: Api<Namespace> = Api::all(gateway.client().clone());
            let Ok(list) = api.list(&ListParams::default()).await else {
                return Vec::new();
            };

            let names = list.items.into_iter().filter_map(|ns| ns.metadata.name);
            matching_candidates(names, &prefix)
        };

        // `Runtime::block_on` panics inside a runtime, so escape to a blocking
        // thread and reuse the current handle when there is one.
        match Handle::try_current() {
            Ok(handle) => task::block_in_place(move || handle.block_on(lookup)),
            Err(_) => tokio::runtime::Runtime::new()
                .map(|rt| rt.block_on(lookup))
                .unwrap_or_default(),
        }
    })
}

fn matching_candidates(
    names: impl IntoIterator<Item = String>,
    prefix: &str,
) -> Vec<CompletionCandidate> {
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(CompletionCandidate::new)
        .collect()
}
