//! Function packaging and deployment orchestration for the Stratus platform.
//!
//! This crate makes a remote function match one [`FunctionSpec`], handling
//! the common case where the function does not yet exist and the conflict
//! case where it already does.
//!
//! # Deployment state machine
//!
//! ```text
//! Validate ──▶ Package ──▶ Attempt-Create ──▶ Created ──▶ [Await-Active]
//!                               │
//!                               ▼ (conflict + force)
//!                           Reconcile: triggers ──▶ config ──▶ code
//! ```
//!
//! - **Validate** rejects unknown runtimes and malformed code-protection
//!   secrets before any network call.
//! - **Package** turns the source tree into a base64 zip artifact via
//!   [`packer`]; the artifact is packaged once and reused by the reconcile
//!   path.
//! - **Reconcile** is at-least-once, non-transactional convergence: if the
//!   configuration update fails after triggers succeeded, the remote
//!   function is left partially updated. Callers audit the composite
//!   [`DeployOutcome`] to see exactly what ran.
//!
//! Trigger creation and (on the reconcile path) code update retry on a
//! fixed delay; the initial create is never blindly retried, since a retry
//! racing a transient failure could itself turn into a conflict.
//!
//! # Example
//!
//! ```ignore
//! use stratus_deploy::{ClientConfig, CodeSource, CreateOptions, FunctionDeployer, FunctionSpec, Runtime};
//!
//! let config = ClientConfig::load()?;
//! let client = Arc::new(config.api_client()?);
//! let deployer = FunctionDeployer::new(client, &config)?;
//!
//! let spec = FunctionSpec::new("hello", Runtime::Nodejs10);
//! let outcome = deployer
//!     .create_function(&spec, CodeSource::Local("./functions/hello".into()), CreateOptions::default())
//!     .await?;
//! ```

pub mod config;
pub mod deployer;
pub mod error;
pub mod layers;
pub mod packer;
pub mod spec;

pub use config::{ClientConfig, DeployConfig};
pub use deployer::{CreateOptions, FunctionDeployer};
pub use error::{DeployError, DeployResult};
pub use layers::{LayerManager, LayerVersionInfo};
pub use packer::{CodeType, PackError, PackedArtifact};
pub use spec::{
    CodeSource, DeployOutcome, FunctionDetail, FunctionSpec, FunctionStatus, FunctionSummary,
    LayerRef, Runtime, Trigger, VpcConfig,
};
