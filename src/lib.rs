pub mod analysis;
pub mod archive;
pub mod args;
pub mod dlink;
mod error;
pub mod io;
pub mod job;
pub mod magic;
pub mod scanner;

pub use error::ExtractError;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use job::Job;
use scanner::Binwalk;

/// Artifacts present in the output directory once the job finished.
#[derive(Debug)]
pub struct Outcome {
    pub kernel: Option<PathBuf>,
    pub rootfs: Option<PathBuf>,
}

pub fn main(args: args::Args) -> Result<Outcome, ExtractError> {
    if !args.input.exists() {
        return Err(ExtractError::InputDoesNotExist(args.input));
    }

    let output_dir = args.output;
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)
            .map_err(|e| ExtractError::OutputDirFail(output_dir.clone(), e))?;
    }

    let scanner = Binwalk::new(args.binwalk, Duration::from_secs(args.timeout));
    let job = Job::new(
        args.input,
        Some(output_dir),
        !args.no_kernel,
        !args.no_rootfs,
        Box::new(scanner),
    );
    job.run();

    Ok(Outcome {
        kernel: job.kernel_path(job::TAG).filter(|path| path.is_file()),
        rootfs: job.rootfs_path(job::TAG).filter(|path| path.is_file()),
    })
}
