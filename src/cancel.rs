use std::{fmt::Debug, future::Future};

use kube::{
    Api,
    api::{ListParams, ObjectList, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Run a Kubernetes API call unless `cancel` fires first.
///
/// A token that is already cancelled short-circuits without polling `operation`.
/// When the token fires mid-flight the request future is dropped.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, operation: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T, kube::Error>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = operation => result.map_err(Error::from),
    }
}

/// Cancellation-aware extension methods for `Api<T>`.
pub trait ApiCancelExt<K> {
    fn get_opt_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        name: &'a str,
    ) -> impl Future<Output = Result<Option<K>>> + 'a
    where
        K: Clone + DeserializeOwned + Debug;

    fn list_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        lp: &'a ListParams,
    ) -> impl Future<Output = Result<ObjectList<K>>> + 'a
    where
        K: Clone + DeserializeOwned + Debug;

    fn create_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        pp: &'a PostParams,
        data: &'a K,
    ) -> impl Future<Output = Result<K>> + 'a
    where
        K: Clone + DeserializeOwned + Debug + Serialize;
}

impl<K> ApiCancelExt<K> for Api<K> {
    fn get_opt_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        name: &'a str,
    ) -> impl Future<Output = Result<Option<K>>> + 'a
    where
        K: Clone + DeserializeOwned + Debug,
    {
        async move { cancellable(cancel, self.get_opt(name)).await }
    }

    fn list_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        lp: &'a ListParams,
    ) -> impl Future<Output = Result<ObjectList<K>>> + 'a
    where
        K: Clone + DeserializeOwned + Debug,
    {
        async move { cancellable(cancel, self.list(lp)).await }
    }

    fn create_cancellable<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        pp: &'a PostParams,
        data: &'a K,
    ) -> impl Future<Output = Result<K>> + 'a
    where
        K: Clone + DeserializeOwned + Debug + Serialize,
    {
        async move { cancellable(cancel, self.create(pp, data)).await }
    }
}
