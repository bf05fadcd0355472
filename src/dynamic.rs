use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::{
    Resource,
    api::{ObjectMeta, TypeMeta},
    core::DynamicResourceScope,
};

/// Coordinates of a resource that has no statically typed schema.
///
/// An empty `group` (or `"core"`) addresses the legacy core API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    /// Plural resource name, as used in the request path.
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Cluster-scoped `APIResource` usable as the dynamic type of [`DynamicObject`].
    ///
    /// `kind` stays empty: reads only need group, version and plural.
    pub fn to_api_resource(&self) -> APIResource {
        APIResource {
            name: self.resource.clone(),
            group: Some(self.group.clone()),
            version: Some(self.version.clone()),
            namespaced: false,
            ..Default::default()
        }
    }
}

/// Untyped object keyed on `APIResource` rather than `kube::api::ApiResource`,
/// so the same discovery type can address it.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Top-level string field, `None` when absent, not a string, or empty.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.data
            .get(field)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

fn is_core_group(group: &str) -> bool {
    group.is_empty() || group == "core"
}

impl Resource for DynamicObject {
    type DynamicType = APIResource;
    type Scope = DynamicResourceScope;

    fn group(dt: &APIResource) -> Cow<'_, str> {
        let group = dt.group.as_deref().unwrap_or_default();
        if is_core_group(group) {
            "".into()
        } else {
            group.into()
        }
    }

    fn version(dt: &APIResource) -> Cow<'_, str> {
        dt.version.as_deref().unwrap_or_default().into()
    }

    fn kind(dt: &APIResource) -> Cow<'_, str> {
        dt.kind.as_str().into()
    }

    fn api_version(dt: &APIResource) -> Cow<'_, str> {
        let group = dt.group.as_deref().unwrap_or_default();
        let version = dt.version.as_deref().unwrap_or_default();
        if is_core_group(group) {
            version.into()
        } else {
            format!("{group}/{version}").into()
        }
    }

    fn plural(dt: &APIResource) -> Cow<'_, str> {
        dt.name.as_str().into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
