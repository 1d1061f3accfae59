//! Function specification and remote-state types.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::packer::{CodeType, PackedArtifact};
use stratus_api::ApiResponse;

/// Default handler entry point applied when the spec omits one.
pub const DEFAULT_HANDLER: &str = "index.main";

/// Default execution timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u32 = 20;

/// Default memory tier in MB.
pub const DEFAULT_MEMORY_MB: u32 = 256;

/// Supported function runtimes.
///
/// A closed set: unknown identifiers are rejected before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Runtime {
    /// Node.js 10.15.
    #[serde(rename = "Nodejs10.15")]
    Nodejs10,
    /// Node.js 8.9.
    #[serde(rename = "Nodejs8.9")]
    Nodejs8,
    /// PHP 7.
    #[serde(rename = "Php7")]
    Php7,
    /// Java 8. Packages a single compiled jar rather than a source tree.
    #[serde(rename = "Java8")]
    Java8,
}

impl Runtime {
    /// Platform identifier for this runtime.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nodejs10 => "Nodejs10.15",
            Self::Nodejs8 => "Nodejs8.9",
            Self::Php7 => "Php7",
            Self::Java8 => "Java8",
        }
    }

    /// How source code for this runtime is packaged.
    #[must_use]
    pub const fn code_type(self) -> CodeType {
        match self {
            Self::Java8 => CodeType::SingleFile,
            _ => CodeType::Directory,
        }
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for runtime identifiers outside the supported set.
#[derive(Debug, thiserror::Error)]
#[error("unsupported runtime: {0}")]
pub struct UnsupportedRuntime(pub String);

impl FromStr for Runtime {
    type Err = UnsupportedRuntime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Nodejs10.15" => Ok(Self::Nodejs10),
            "Nodejs8.9" => Ok(Self::Nodejs8),
            "Php7" => Ok(Self::Php7),
            "Java8" => Ok(Self::Java8),
            other => Err(UnsupportedRuntime(other.to_owned())),
        }
    }
}

/// VPC placement for a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    /// VPC identifier.
    pub vpc_id: String,
    /// Subnet identifier.
    pub subnet_id: String,
}

/// Reference to a published layer version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRef {
    /// Layer name.
    pub name: String,
    /// Layer version number.
    pub version: u32,
}

/// An event trigger bound to a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger name.
    pub name: String,
    /// Trigger type, e.g. `timer` or `http`.
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// Platform-specific trigger description, serialised as the platform
    /// expects it.
    pub config: String,
}

/// Desired state of one function.
///
/// Supplied by the caller and never mutated; platform defaults are applied
/// only while deriving request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name.
    pub name: String,
    /// Runtime identifier.
    pub runtime: Runtime,
    /// Handler entry point; defaults to [`DEFAULT_HANDLER`].
    pub handler: Option<String>,
    /// Execution timeout; defaults to [`DEFAULT_TIMEOUT_SECS`].
    pub timeout_secs: Option<u32>,
    /// Memory tier; defaults to [`DEFAULT_MEMORY_MB`].
    pub memory_mb: Option<u32>,
    /// Environment variables. Updates always send the complete desired
    /// set - full replace, never a diff.
    #[serde(default)]
    pub env_variables: BTreeMap<String, String>,
    /// Optional VPC placement.
    pub vpc: Option<VpcConfig>,
    /// Layer versions to attach.
    #[serde(default)]
    pub layers: Vec<LayerRef>,
    /// Install declared dependencies remotely after upload.
    #[serde(default)]
    pub install_dependency: bool,
    /// Event triggers to converge.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Code-protection secret, validated before any network call.
    pub code_secret: Option<String>,
    /// Ignore globs applied while packaging, matched against paths relative
    /// to the source root.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl FunctionSpec {
    /// Create a minimal spec; everything else starts at platform defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, runtime: Runtime) -> Self {
        Self {
            name: name.into(),
            runtime,
            handler: None,
            timeout_secs: None,
            memory_mb: None,
            env_variables: BTreeMap::new(),
            vpc: None,
            layers: Vec::new(),
            install_dependency: false,
            triggers: Vec::new(),
            code_secret: None,
            ignore: Vec::new(),
        }
    }

    /// Handler with the platform default applied.
    #[must_use]
    pub fn handler_or_default(&self) -> &str {
        self.handler.as_deref().unwrap_or(DEFAULT_HANDLER)
    }

    /// Timeout with the platform default applied.
    #[must_use]
    pub fn timeout_or_default(&self) -> u32 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Memory tier with the platform default applied.
    #[must_use]
    pub fn memory_or_default(&self) -> u32 {
        self.memory_mb.unwrap_or(DEFAULT_MEMORY_MB)
    }
}

/// Where the deployable code comes from.
#[derive(Debug, Clone)]
pub enum CodeSource {
    /// Package a local path (directory, or single file for runtimes that
    /// require it).
    Local(PathBuf),
    /// Use an already-packaged artifact; the packer is not invoked.
    Prebuilt(PackedArtifact),
}

/// Remote lifecycle status of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionStatus {
    /// Creation in progress.
    Creating,
    /// Update in progress.
    Updating,
    /// Ready to serve.
    Active,
    /// Activation failed.
    Failed,
    /// Any status this client does not interpret.
    Other(String),
}

impl FunctionStatus {
    /// Parse the platform's status string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Creating" | "CREATING" => Self::Creating,
            "Updating" | "UPDATING" => Self::Updating,
            "Active" | "ACTIVE" => Self::Active,
            "Failed" | "FAILED" | "CreateFailed" | "UpdateFailed" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// True while the platform is still converging the function.
    ///
    /// The readiness wait continues only for these statuses; anything else
    /// ends the wait without being interpreted.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Creating | Self::Updating)
    }
}

impl std::fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => f.write_str("Creating"),
            Self::Updating => f.write_str("Updating"),
            Self::Active => f.write_str("Active"),
            Self::Failed => f.write_str("Failed"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// VPC details reported for a deployed function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpcDetail {
    /// VPC identifier.
    pub vpc_id: String,
    /// Subnet identifier.
    pub subnet_id: String,
    /// Resolved VPC name; empty when the lookup was skipped or degraded.
    pub vpc_name: String,
}

/// Inspected state of a deployed function.
#[derive(Debug, Clone)]
pub struct FunctionDetail {
    /// Function name.
    pub name: String,
    /// Lifecycle status.
    pub status: FunctionStatus,
    /// Runtime identifier as reported by the platform.
    pub runtime: String,
    /// Handler entry point.
    pub handler: String,
    /// Execution timeout in seconds.
    pub timeout_secs: u32,
    /// Memory tier in MB.
    pub memory_mb: u32,
    /// Environment variables.
    pub env_variables: BTreeMap<String, String>,
    /// VPC placement, if any.
    pub vpc: Option<VpcDetail>,
    /// Bound triggers.
    pub triggers: Vec<Trigger>,
    /// Request id of the inspection call.
    pub request_id: Option<String>,
}

/// One row of a function listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSummary {
    /// Function name.
    #[serde(rename = "FunctionName")]
    pub name: String,
    /// Lifecycle status as reported by the platform.
    #[serde(rename = "Status", default)]
    pub status: String,
    /// Runtime identifier as reported by the platform.
    #[serde(rename = "Runtime", default)]
    pub runtime: String,
    /// Last modification timestamp as reported by the platform.
    #[serde(rename = "ModTime", default)]
    pub modified: String,
}

/// Result of one `create_function` invocation.
///
/// Constructed once per call, returned, not retained.
#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// The function did not exist; one create call succeeded.
    Created(ApiResponse),
    /// The function existed and was converged by the reconcile sequence.
    ///
    /// All three sub-results are collected even when some fields were
    /// unchanged, so callers can audit exactly what ran. `triggers` is
    /// `None` when the spec declares none.
    Reconciled {
        /// Result of trigger creation, if any triggers were declared.
        triggers: Option<ApiResponse>,
        /// Result of the configuration update.
        config: ApiResponse,
        /// Result of the code update.
        code: ApiResponse,
    },
}
