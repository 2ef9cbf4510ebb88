//! Staged Go module builds for goalign.
//!
//! A [`Pipeline`] copies the module that contains the invocation directory
//! into a throwaway staging tree, vendors its dependencies, realigns struct
//! fields in every eligible package, builds the binary and copies the single
//! new executable back next to the caller.
//!
//! ```no_run
//! use goalign_build::Pipeline;
//! use goalign_core::PipelineConfig;
//!
//! # async fn example() -> Result<(), goalign_build::BuildError> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let report = pipeline.run(&std::env::current_dir().unwrap()).await?;
//! println!("{:?}", report.artifact);
//! # Ok(())
//! # }
//! ```

mod error;
mod pipeline;
mod reconcile;
mod report;
mod snapshot;
mod staging;
mod toolchain;

pub use error::BuildError;
pub use pipeline::Pipeline;
pub use reconcile::{ARTIFACT_MODE, ArtifactReconciler, Reconciliation, select_artifact};
pub use report::{BuildReport, DryRunReport};
pub use snapshot::{DirSnapshot, EntryKind, SnapshotEntry};
pub use staging::{STAGING_DIR_NAME, StagingArea};
pub use toolchain::{GO_NAME, GoToolchain, locate_tool};

pub use goalign_core::PipelineConfig;
