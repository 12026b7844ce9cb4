//! Build pipeline module for stagehand
//!
//! Provides the stage vocabulary and the executor that runs it against a
//! resolved environment.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using glob patterns from the environment
//! - **Stages**: The fixed set of transform stages and their failure policy
//! - **Execution**: Run stages in full-build or watch-startup order
//!
//! # Example
//!
//! ```ignore
//! use stagehand::build::{BuildContext, BuildPipeline};
//! use stagehand::config::{load_config, EnvironmentResolver};
//!
//! let (doc, path) = load_config(None)?;
//! let resolved = EnvironmentResolver::new(doc).resolve(Some("staging"))?;
//! let context = BuildContext::new(&resolved, project_root);
//! let pipeline = BuildPipeline::new(context);
//!
//! let result = pipeline.full_build();
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod pipeline;
pub mod result;
pub mod stage;

pub use context::*;
pub use discovery::*;
pub use pipeline::*;
pub use result::*;
pub use stage::*;
