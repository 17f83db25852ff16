mod action;
mod error;
mod pool;
mod report;
mod supervisor;

pub use action::{BuildAction, BuildJob, CommandAction, toolchain_version};
pub use error::{ActionError, BuildError, JobFailure};
pub use pool::{JobOutcome, RunContext, dispatch};
pub use report::{Artifact, BuildReport, CHECKSUM_FILE, write_checksums};
pub use supervisor::{BuildSettings, BuildSupervisor, run_dir};
