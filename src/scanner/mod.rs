//! Contract with the binary-signature scanner.
//!
//! The engine never inspects raw signatures itself. It hands a file to a
//! [`Scanner`], names the signature category it cares about, and consumes
//! the findings (and, when extraction was requested, the directory the
//! scanner populated). Production runs use [`Binwalk`]; tests substitute a
//! scripted implementation.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

mod binwalk;
pub mod describe;

pub use binwalk::Binwalk;

/// Signature categories the engine asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Header,
    Kernel,
    Filesystem,
    Archive,
    Compressed,
}

impl Category {
    /// Inclusion filter string understood by the scanner.
    pub fn filter(self) -> &'static str {
        match self {
            Category::Header => "header",
            Category::Kernel => "kernel",
            Category::Filesystem => "filesystem",
            Category::Archive => "archive",
            Category::Compressed => "compressed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Decode recognized payloads into a directory under the work dir.
    pub extract: bool,
    /// Keep decoding nested payloads inside whatever extraction produces.
    pub recurse: bool,
}

/// One signature hit. Descriptions are free text, but follow conventions
/// stable enough to parse; see [`describe`].
#[derive(Debug, Clone)]
pub struct Finding {
    pub description: String,
    pub offset: u64,
}

/// The outcome of one scanner pass over a target.
#[derive(Debug, Clone, Default)]
pub struct ScanModule {
    pub results: Vec<Finding>,
    /// Where the scanner deposited decoded contents, if extraction was
    /// requested and anything was extractable.
    pub extracted_directory: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to launch {program} ({source})")]
    SpawnFail { program: String, source: io::Error },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status} scanning {target:?}")]
    ScanFail {
        program: String,
        status: ExitStatus,
        target: PathBuf,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Black-box signature scanner.
///
/// `work_dir` is where extraction products land; implementations must not
/// rely on the process working directory.
pub trait Scanner {
    fn scan(
        &self,
        target: &Path,
        category: Category,
        options: ScanOptions,
        work_dir: &Path,
    ) -> Result<Vec<ScanModule>, ScanError>;
}
