//! Layer version management.
//!
//! Layers are published independently of functions and referenced from a
//! [`FunctionSpec`](crate::FunctionSpec) by name and version. Publication
//! is caller-driven and carries no retry policy.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use stratus_api::{ActionRequest, CloudApi};

use crate::config::ClientConfig;
use crate::error::{DeployError, DeployResult};
use crate::packer::{self, CodeType};
use crate::spec::Runtime;

const SERVICE: &str = "faas";
const API_VERSION: &str = "2023-04-01";

/// A published layer version as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerVersionInfo {
    /// Layer name.
    #[serde(rename = "LayerName")]
    pub name: String,
    /// Version number.
    #[serde(rename = "LayerVersion")]
    pub version: u32,
    /// Free-form description supplied at publication.
    #[serde(rename = "Description", default)]
    pub description: String,
    /// Runtimes the layer declares compatibility with.
    #[serde(rename = "CompatibleRuntimes", default)]
    pub compatible_runtimes: Vec<String>,
    /// Publication timestamp as reported by the platform.
    #[serde(rename = "AddTime", default)]
    pub added: String,
}

/// Publishes and inspects layer versions in one region.
#[derive(Debug)]
pub struct LayerManager<C: CloudApi> {
    api: Arc<C>,
    region: String,
}

impl<C: CloudApi> LayerManager<C> {
    /// Create a manager bound to the configured region.
    pub fn new(api: Arc<C>, config: &ClientConfig) -> DeployResult<Self> {
        if config.region.is_empty() {
            return Err(DeployError::config("region is not configured"));
        }
        Ok(Self {
            api,
            region: config.region.clone(),
        })
    }

    /// Package `source_dir` and publish it as a new version of `name`.
    ///
    /// Returns the version number the platform assigned.
    pub async fn publish_layer_version(
        &self,
        name: &str,
        source_dir: &Path,
        compatible_runtimes: &[Runtime],
        description: &str,
        ignore: &[String],
    ) -> DeployResult<u32> {
        if name.is_empty() {
            return Err(DeployError::validation("layer name must not be empty"));
        }
        let artifact = packer::pack(source_dir, CodeType::Directory, ignore).await?;
        let runtimes: Vec<Value> = compatible_runtimes
            .iter()
            .map(|r| Value::from(r.as_str()))
            .collect();

        let request = self
            .request("PublishLayerVersion")
            .param("LayerName", name)
            .param("Content", json!({ "ZipFile": artifact.as_base64() }))
            .param("CompatibleRuntimes", runtimes)
            .param("Description", description);
        let response = self.api.call(request).await?;

        let version = response
            .field("LayerVersion")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                DeployError::validation("publish response carried no layer version")
            })?;
        let version = u32::try_from(version).map_err(|_| {
            DeployError::validation(format!("layer version {version} out of range"))
        })?;
        info!(layer = name, version, "published layer version");
        Ok(version)
    }

    /// List all published versions of a layer, newest first as the
    /// platform reports them.
    pub async fn list_layer_versions(&self, name: &str) -> DeployResult<Vec<LayerVersionInfo>> {
        let request = self.request("ListLayerVersions").param("LayerName", name);
        let response = self.api.call(request).await?;
        let wire: ListVersionsWire = response.deserialize_into()?;
        Ok(wire.versions)
    }

    /// Fetch one layer version.
    pub async fn get_layer_version(
        &self,
        name: &str,
        version: u32,
    ) -> DeployResult<LayerVersionInfo> {
        let request = self
            .request("GetLayerVersion")
            .param("LayerName", name)
            .param("LayerVersion", version);
        let response = self.api.call(request).await?;
        Ok(response.deserialize_into()?)
    }

    fn request(&self, action: &str) -> ActionRequest {
        ActionRequest::new(SERVICE, API_VERSION, action).with_region(self.region.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ListVersionsWire {
    #[serde(rename = "LayerVersions", default)]
    versions: Vec<LayerVersionInfo>,
}
