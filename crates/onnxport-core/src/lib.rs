//! onnxport core - convert Hub models to ONNX and republish them.
//!
//! The crate drives an external converter toolchain against a model hosted
//! on the Hugging Face Hub and uploads the quantized ONNX result back to
//! the registry, under a `-ONNX` copy or into the operator's own
//! repository. It is headless; `onnxport-cli` is the terminal front end.
//!
//! # Example
//!
//! ```rust,ignore
//! use onnxport_core::convert::SystemCommandRunner;
//! use onnxport_core::hub::HubClient;
//! use onnxport_core::pipeline::{ConversionRequest, Pipeline};
//! use onnxport_core::Config;
//!
//! #[tokio::main]
//! async fn main() -> onnxport_core::Result<()> {
//!     let config = Config::resolve(None).await?;
//!     let registry = HubClient::new(&config)?;
//!     let runner = SystemCommandRunner;
//!     let pipeline = Pipeline::new(&config, &registry, &runner);
//!
//!     let report = pipeline
//!         .run(&ConversionRequest {
//!             source_model_id: "EleutherAI/pythia-14m".into(),
//!             trust_remote_code: false,
//!             reuse_same_repository: false,
//!         })
//!         .await?;
//!     println!("{}", report.destination_url);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod naming;
pub mod pipeline;
pub mod publish;
pub mod toolchain;

// Re-export commonly used types
pub use config::{Config, TokenSource};
pub use convert::{CommandRunner, ConversionOutcome, ConversionRunner, SystemCommandRunner};
pub use error::{OnnxportError, Result};
pub use hub::{HubClient, Registry};
pub use naming::PublishTarget;
pub use pipeline::{ConversionRequest, Pipeline, PublishPlan, RunOutcome, RunReport};
pub use publish::{PublishCoordinator, PublishFailure};
pub use toolchain::ToolchainProvisioner;
