use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scanner::ScanError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Input does not exist ({0:?})")]
    InputDoesNotExist(PathBuf),

    #[error("Failed to create output directory {0:?} ({1})")]
    OutputDirFail(PathBuf, #[source] io::Error),

    #[error("Signature scan failed ({0})")]
    Scan(#[from] ScanError),

    #[error("Encrypted payload is not block aligned")]
    Unaligned,

    #[error(transparent)]
    Io(#[from] io::Error),
}
