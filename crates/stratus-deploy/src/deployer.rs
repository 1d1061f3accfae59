//! Idempotent function deployment against the platform API.
//!
//! [`FunctionDeployer`] drives the create-or-reconcile sequence described
//! at the crate root. It is generic over [`CloudApi`] so tests can swap in
//! a scripted transport.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use stratus_api::{ActionRequest, ApiResponse, CloudApi};

use crate::config::{ClientConfig, DeployConfig};
use crate::error::{DeployError, DeployResult};
use crate::packer::{self, PackedArtifact};
use crate::spec::{
    CodeSource, DeployOutcome, FunctionDetail, FunctionSpec, FunctionStatus, FunctionSummary,
    Trigger, VpcDetail,
};

/// Function service identifier.
const SERVICE: &str = "faas";

/// Function service API version.
const API_VERSION: &str = "2023-04-01";

/// Network service identifier, used only for VPC name lookups.
const VPC_SERVICE: &str = "vpc";

/// Network service API version.
const VPC_API_VERSION: &str = "2022-11-01";

/// Maximum code-protection secret length.
const MAX_CODE_SECRET_LEN: usize = 160;

/// Per-call behaviour switches for [`FunctionDeployer::create_function`].
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Reconcile an existing function instead of failing on conflict.
    pub force: bool,
    /// After a create with remote dependency installation, poll until the
    /// function leaves its transient status.
    pub wait_for_active: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            force: false,
            wait_for_active: true,
        }
    }
}

/// Deploys and manages functions in one namespace of one region.
#[derive(Debug)]
pub struct FunctionDeployer<C: CloudApi> {
    api: Arc<C>,
    namespace: String,
    region: String,
    deploy: DeployConfig,
}

impl<C: CloudApi> FunctionDeployer<C> {
    /// Create a deployer bound to the configured region and namespace.
    ///
    /// Both must be resolved; an unconfigured deployer fails here rather
    /// than on its first call.
    pub fn new(api: Arc<C>, config: &ClientConfig) -> DeployResult<Self> {
        if config.region.is_empty() {
            return Err(DeployError::config("region is not configured"));
        }
        if config.namespace.is_empty() {
            return Err(DeployError::config("namespace is not configured"));
        }
        Ok(Self {
            api,
            namespace: config.namespace.clone(),
            region: config.region.clone(),
            deploy: config.deploy.clone(),
        })
    }

    /// Make the remote function match `spec`, creating it if absent.
    ///
    /// The happy path is one `CreateFunction` call followed by trigger
    /// creation. On a conflict with `force` set, the existing function is
    /// converged instead: triggers, then configuration (environment is a
    /// full replace), then code, reusing the artifact packaged for the
    /// create attempt. The reconcile sequence is at-least-once and
    /// non-transactional; a failure part-way leaves earlier steps applied.
    pub async fn create_function(
        &self,
        spec: &FunctionSpec,
        source: CodeSource,
        options: CreateOptions,
    ) -> DeployResult<DeployOutcome> {
        validate_spec(spec)?;
        let artifact = self.resolve_artifact(spec, source).await?;

        info!(function = %spec.name, runtime = %spec.runtime, "creating function");
        match self.api.call(self.create_request(spec, &artifact)).await {
            Ok(response) => {
                let _ = self
                    .create_function_triggers(&spec.name, &spec.triggers)
                    .await?;
                if spec.install_dependency && options.wait_for_active {
                    self.wait_for_active(&spec.name).await?;
                }
                Ok(DeployOutcome::Created(response))
            }
            Err(err) if err.is_conflict() && options.force => {
                info!(function = %spec.name, "function exists, reconciling");
                let triggers = self
                    .create_function_triggers(&spec.name, &spec.triggers)
                    .await?;
                let config = self.api.call(self.config_request(spec)).await?;
                let code = self
                    .call_with_retry(self.code_request(spec, &artifact))
                    .await?;
                Ok(DeployOutcome::Reconciled {
                    triggers,
                    config,
                    code,
                })
            }
            Err(err) if err.is_conflict() => Err(DeployError::conflict(&spec.name, err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the code of an existing function.
    pub async fn update_function_code(
        &self,
        spec: &FunctionSpec,
        source: CodeSource,
    ) -> DeployResult<ApiResponse> {
        validate_spec(spec)?;
        let artifact = self.resolve_artifact(spec, source).await?;
        Ok(self.api.call(self.code_request(spec, &artifact)).await?)
    }

    /// Replace the configuration of an existing function.
    ///
    /// Environment variables are always sent as the complete desired set.
    pub async fn update_function_config(&self, spec: &FunctionSpec) -> DeployResult<ApiResponse> {
        validate_spec(spec)?;
        Ok(self.api.call(self.config_request(spec)).await?)
    }

    /// Apply an incremental code change to an existing function.
    ///
    /// `add` names a path under `root` whose files are packaged and
    /// overlaid onto the remote artifact; `delete_files` names remote
    /// paths to remove. At least one of the two must be supplied. The
    /// full artifact is never re-uploaded.
    pub async fn update_function_incremental_code(
        &self,
        spec: &FunctionSpec,
        root: &Path,
        add: Option<&Path>,
        delete_files: &[String],
    ) -> DeployResult<ApiResponse> {
        validate_spec(spec)?;
        if add.is_none() && delete_files.is_empty() {
            return Err(DeployError::validation(
                "incremental update requires an addition path or deletions",
            ));
        }

        let mut request = self
            .faas_request("UpdateFunctionIncrementalCode")
            .param("FunctionName", spec.name.clone())
            .param("Handler", spec.handler_or_default());
        if let Some(add) = add {
            let artifact = packer::pack_incremental(root, add, &spec.ignore).await?;
            request = request.param("Code", json!({ "ZipFile": artifact.as_base64() }));
        }
        if !delete_files.is_empty() {
            let deletes: Vec<Value> = delete_files
                .iter()
                .map(|f| Value::from(f.as_str()))
                .collect();
            request = request.param("DeleteFiles", deletes);
        }
        Ok(self.api.call(request).await?)
    }

    /// Create each declared trigger in order, retrying individual calls.
    ///
    /// An empty list is a no-op `None`. Returns the response of the last
    /// trigger created.
    pub async fn create_function_triggers(
        &self,
        function: &str,
        triggers: &[Trigger],
    ) -> DeployResult<Option<ApiResponse>> {
        let mut last = None;
        for trigger in triggers {
            debug!(function, trigger = %trigger.name, "creating trigger");
            let request = self
                .faas_request("CreateTrigger")
                .param("FunctionName", function)
                .param("TriggerName", trigger.name.clone())
                .param("Type", trigger.trigger_type.clone())
                .param("TriggerDesc", trigger.config.clone());
            last = Some(self.call_with_retry(request).await?);
        }
        Ok(last)
    }

    /// Inspect the current remote state of a function.
    ///
    /// When the function sits in a VPC, its name is resolved through a
    /// secondary lookup; if that lookup fails the detail is returned with
    /// an empty VPC name rather than failing the inspection.
    pub async fn get_function_detail(&self, name: &str) -> DeployResult<FunctionDetail> {
        let request = self
            .faas_request("GetFunction")
            .param("FunctionName", name)
            .param("ShowCode", "FALSE");
        let response = self.api.call(request).await?;
        let wire: FunctionWire = response.deserialize_into()?;

        let vpc = match wire.vpc {
            Some(v) if !v.vpc_id.is_empty() => Some(self.resolve_vpc_name(v).await),
            _ => None,
        };

        let env_variables = wire
            .environment
            .map(|e| e.variables.into_iter().map(|v| (v.key, v.value)).collect())
            .unwrap_or_default();

        let triggers = wire
            .triggers
            .into_iter()
            .map(|t| Trigger {
                name: t.name,
                trigger_type: t.trigger_type,
                config: t.config,
            })
            .collect();

        Ok(FunctionDetail {
            name: wire.name,
            status: FunctionStatus::parse(&wire.status),
            runtime: wire.runtime,
            handler: wire.handler,
            timeout_secs: wire.timeout,
            memory_mb: wire.memory,
            env_variables,
            vpc,
            triggers,
            request_id: response.request_id,
        })
    }

    /// Poll until the function leaves {Creating, Updating}.
    ///
    /// Any other status ends the wait; interpreting a failed activation is
    /// the caller's concern.
    pub async fn wait_for_active(&self, name: &str) -> DeployResult<FunctionDetail> {
        loop {
            let detail = self.get_function_detail(name).await?;
            if !detail.status.is_transient() {
                debug!(function = name, status = %detail.status, "function settled");
                return Ok(detail);
            }
            debug!(function = name, status = %detail.status, "function still converging");
            sleep(Duration::from_millis(self.deploy.poll_interval_ms)).await;
        }
    }

    /// Delete a function.
    pub async fn delete_function(&self, name: &str) -> DeployResult<ApiResponse> {
        let request = self.faas_request("DeleteFunction").param("FunctionName", name);
        Ok(self.api.call(request).await?)
    }

    /// Invoke a function synchronously with an optional JSON payload.
    pub async fn invoke_function(
        &self,
        name: &str,
        payload: Option<Value>,
    ) -> DeployResult<ApiResponse> {
        let mut request = self
            .faas_request("Invoke")
            .param("FunctionName", name)
            .param("InvocationType", "RequestResponse");
        if let Some(payload) = payload {
            request = request.param("ClientContext", payload.to_string());
        }
        Ok(self.api.call(request).await?)
    }

    /// List the functions in this namespace.
    pub async fn list_functions(&self) -> DeployResult<Vec<FunctionSummary>> {
        let response = self.api.call(self.faas_request("ListFunctions")).await?;
        let wire: ListWire = response.deserialize_into()?;
        Ok(wire.functions)
    }

    /// Call the API, retrying transport and platform failures on a fixed
    /// delay up to the configured retry budget. The last error propagates.
    async fn call_with_retry(&self, request: ActionRequest) -> DeployResult<ApiResponse> {
        let mut attempt = 0;
        loop {
            match self.api.call(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.deploy.max_retries => {
                    attempt += 1;
                    warn!(
                        action = %request.action,
                        attempt,
                        error = %err,
                        "call failed, retrying"
                    );
                    sleep(Duration::from_millis(self.deploy.retry_delay_ms)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn resolve_artifact(
        &self,
        spec: &FunctionSpec,
        source: CodeSource,
    ) -> DeployResult<PackedArtifact> {
        match source {
            CodeSource::Prebuilt(artifact) => Ok(artifact),
            CodeSource::Local(path) => {
                Ok(packer::pack(&path, spec.runtime.code_type(), &spec.ignore).await?)
            }
        }
    }

    /// Base request for the function service, carrying region and
    /// namespace.
    fn faas_request(&self, action: &str) -> ActionRequest {
        ActionRequest::new(SERVICE, API_VERSION, action)
            .with_region(self.region.clone())
            .param("Namespace", self.namespace.clone())
    }

    fn create_request(&self, spec: &FunctionSpec, artifact: &PackedArtifact) -> ActionRequest {
        let mut request = self
            .faas_request("CreateFunction")
            .param("FunctionName", spec.name.clone())
            .param("Code", json!({ "ZipFile": artifact.as_base64() }))
            .param("Handler", spec.handler_or_default())
            .param("Runtime", spec.runtime.as_str())
            .param("Timeout", spec.timeout_or_default())
            .param("MemorySize", spec.memory_or_default())
            .param("Environment", environment_param(spec))
            .param("InstallDependency", flag(spec.install_dependency))
            .param_opt("CodeSecret", spec.code_secret.clone());
        if let Some(vpc) = &spec.vpc {
            request = request.param(
                "VpcConfig",
                json!({ "VpcId": vpc.vpc_id, "SubnetId": vpc.subnet_id }),
            );
        }
        if !spec.layers.is_empty() {
            let layers: Vec<Value> = spec
                .layers
                .iter()
                .map(|l| json!({ "LayerName": l.name, "LayerVersion": l.version }))
                .collect();
            request = request.param("Layers", layers);
        }
        request
    }

    fn code_request(&self, spec: &FunctionSpec, artifact: &PackedArtifact) -> ActionRequest {
        self.faas_request("UpdateFunctionCode")
            .param("FunctionName", spec.name.clone())
            .param("Handler", spec.handler_or_default())
            .param("Code", json!({ "ZipFile": artifact.as_base64() }))
    }

    fn config_request(&self, spec: &FunctionSpec) -> ActionRequest {
        let mut request = self
            .faas_request("UpdateFunctionConfiguration")
            .param("FunctionName", spec.name.clone())
            .param("Runtime", spec.runtime.as_str())
            .param("Timeout", spec.timeout_or_default())
            .param("MemorySize", spec.memory_or_default())
            .param("Environment", environment_param(spec))
            .param("InstallDependency", flag(spec.install_dependency));
        if let Some(vpc) = &spec.vpc {
            request = request.param(
                "VpcConfig",
                json!({ "VpcId": vpc.vpc_id, "SubnetId": vpc.subnet_id }),
            );
        }
        request
    }

    async fn resolve_vpc_name(&self, vpc: VpcWire) -> VpcDetail {
        let request = ActionRequest::new(VPC_SERVICE, VPC_API_VERSION, "DescribeVpcs")
            .with_region(self.region.clone())
            .param("VpcIds.0", vpc.vpc_id.clone());
        let vpc_name = match self.api.call(request).await {
            Ok(response) => response
                .field("VpcSet")
                .and_then(|set| set.get(0))
                .and_then(|v| v.get("VpcName"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            Err(err) => {
                warn!(vpc = %vpc.vpc_id, error = %err, "VPC name lookup failed, leaving name empty");
                String::new()
            }
        };
        VpcDetail {
            vpc_id: vpc.vpc_id,
            subnet_id: vpc.subnet_id,
            vpc_name,
        }
    }
}

fn validate_spec(spec: &FunctionSpec) -> DeployResult<()> {
    if spec.name.is_empty() {
        return Err(DeployError::validation("function name must not be empty"));
    }
    if let Some(secret) = &spec.code_secret {
        let well_formed = !secret.is_empty()
            && secret.len() <= MAX_CODE_SECRET_LEN
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '=' | '/'));
        if !well_formed {
            return Err(DeployError::validation(
                "code secret must be 1-160 characters from [A-Za-z0-9+=/]",
            ));
        }
    }
    Ok(())
}

/// Environment variables in the platform's key/value list shape. Always
/// the complete desired set.
fn environment_param(spec: &FunctionSpec) -> Value {
    let variables: Vec<Value> = spec
        .env_variables
        .iter()
        .map(|(k, v)| json!({ "Key": k, "Value": v }))
        .collect();
    json!({ "Variables": variables })
}

const fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

#[derive(Debug, Deserialize)]
struct FunctionWire {
    #[serde(rename = "FunctionName")]
    name: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Runtime", default)]
    runtime: String,
    #[serde(rename = "Handler", default)]
    handler: String,
    #[serde(rename = "Timeout", default)]
    timeout: u32,
    #[serde(rename = "MemorySize", default)]
    memory: u32,
    #[serde(rename = "Environment")]
    environment: Option<EnvironmentWire>,
    #[serde(rename = "VpcConfig")]
    vpc: Option<VpcWire>,
    #[serde(rename = "Triggers", default)]
    triggers: Vec<TriggerWire>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentWire {
    #[serde(rename = "Variables", default)]
    variables: Vec<VariableWire>,
}

#[derive(Debug, Deserialize)]
struct VariableWire {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct VpcWire {
    #[serde(rename = "VpcId", default)]
    vpc_id: String,
    #[serde(rename = "SubnetId", default)]
    subnet_id: String,
}

#[derive(Debug, Deserialize)]
struct TriggerWire {
    #[serde(rename = "TriggerName")]
    name: String,
    #[serde(rename = "Type", default)]
    trigger_type: String,
    #[serde(rename = "TriggerDesc", default)]
    config: String,
}

#[derive(Debug, Deserialize)]
struct ListWire {
    #[serde(rename = "Functions", default)]
    functions: Vec<FunctionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{LayerRef, Runtime, VpcConfig};
    use stratus_api::ApiResult;

    /// Transport double for request-derivation tests; never actually
    /// called.
    struct NoopApi;

    #[async_trait::async_trait]
    impl CloudApi for NoopApi {
        async fn call(&self, _request: ActionRequest) -> ApiResult<ApiResponse> {
            unreachable!("request-derivation tests never reach the network")
        }
    }

    fn deployer() -> FunctionDeployer<NoopApi> {
        let config = ClientConfig {
            region: "ap-east-1".to_owned(),
            namespace: "default".to_owned(),
            ..ClientConfig::default()
        };
        FunctionDeployer::new(Arc::new(NoopApi), &config).unwrap()
    }

    #[test]
    fn unresolved_region_or_namespace_is_rejected() {
        let config = ClientConfig::default();
        assert!(matches!(
            FunctionDeployer::new(Arc::new(NoopApi), &config),
            Err(DeployError::Config(_))
        ));
    }

    #[test]
    fn create_request_applies_platform_defaults() {
        let spec = FunctionSpec::new("hello", Runtime::Nodejs10);
        let artifact = PackedArtifact::from_base64("UEs=");
        let request = deployer().create_request(&spec, &artifact);

        let params = request.params();
        assert_eq!(params["Handler"], "index.main");
        assert_eq!(params["Timeout"], 20);
        assert_eq!(params["MemorySize"], 256);
        assert_eq!(params["Runtime"], "Nodejs10.15");
        assert_eq!(params["InstallDependency"], "FALSE");
        assert_eq!(params["Namespace"], "default");
        assert_eq!(params["Code"]["ZipFile"], "UEs=");
        assert!(!params.contains_key("VpcConfig"));
        assert!(!params.contains_key("CodeSecret"));
        assert!(!params.contains_key("Layers"));
    }

    #[test]
    fn vpc_and_layers_are_serialised_when_present() {
        let mut spec = FunctionSpec::new("hello", Runtime::Php7);
        spec.vpc = Some(VpcConfig {
            vpc_id: "vpc-1".to_owned(),
            subnet_id: "subnet-1".to_owned(),
        });
        spec.layers = vec![LayerRef {
            name: "shared".to_owned(),
            version: 3,
        }];
        let artifact = PackedArtifact::from_base64("UEs=");
        let request = deployer().create_request(&spec, &artifact);

        let params = request.params();
        assert_eq!(params["VpcConfig"]["VpcId"], "vpc-1");
        assert_eq!(params["VpcConfig"]["SubnetId"], "subnet-1");
        assert_eq!(params["Layers"][0]["LayerName"], "shared");
        assert_eq!(params["Layers"][0]["LayerVersion"], 3);
    }

    #[test]
    fn environment_is_the_complete_desired_set() {
        let mut spec = FunctionSpec::new("hello", Runtime::Nodejs8);
        spec.env_variables
            .insert("B_SECOND".to_owned(), "2".to_owned());
        spec.env_variables
            .insert("A_FIRST".to_owned(), "1".to_owned());

        let request = deployer().config_request(&spec);
        let variables = &request.params()["Environment"]["Variables"];
        assert_eq!(variables[0]["Key"], "A_FIRST");
        assert_eq!(variables[1]["Key"], "B_SECOND");
        assert_eq!(variables.as_array().unwrap().len(), 2);
    }

    #[test]
    fn code_secret_shape_is_enforced() {
        let mut spec = FunctionSpec::new("hello", Runtime::Nodejs10);

        spec.code_secret = Some("abcDEF123+=/".to_owned());
        assert!(validate_spec(&spec).is_ok());

        spec.code_secret = Some("has space".to_owned());
        assert!(matches!(
            validate_spec(&spec),
            Err(DeployError::Validation(_))
        ));

        spec.code_secret = Some(String::new());
        assert!(validate_spec(&spec).is_err());

        spec.code_secret = Some("a".repeat(161));
        assert!(validate_spec(&spec).is_err());

        spec.code_secret = Some("a".repeat(160));
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn install_dependency_flag_is_upper_case() {
        assert_eq!(flag(true), "TRUE");
        assert_eq!(flag(false), "FALSE");
    }
}
