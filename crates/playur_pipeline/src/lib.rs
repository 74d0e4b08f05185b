//! # PlayUR Build Pipeline
//!
//! Builds a web player, zips it and uploads it to a branch on the PlayUR
//! server.
//!
//! ## Sequence
//!
//! 1. **Build**: run the host build system (skipped for upload-only runs)
//! 2. **Archive**: replace `<output>/index.zip` with a fresh zip of the output
//! 3. **Branch**: ask which branch to upload to (empty means `main`)
//! 4. **Version**: fetch the branch's latest build number and add one
//! 5. **Upload**: post the archive and its [`BuildDescriptor`]
//!
//! Every failure ends the run. See [`PipelineState`] for the states a run
//! passes through.
//!
//! [`BuildDescriptor`]: playur_core::records::BuildDescriptor

pub mod archive;
pub mod build;
pub mod prompt;
pub mod sequencer;

pub use archive::{ArchiveError, ArchiveSummary, compress_directory};
pub use build::CommandBuildSystem;
pub use prompt::{FixedBranch, StdinBranchPrompt};
pub use sequencer::{
    BuildApi, BuildUploadPipeline, PipelineError, PipelineMode, PipelineOutcome, PipelineRequest,
    PipelineState, UploadReceipt,
};
