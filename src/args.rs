use clap::Parser;
use std::path::PathBuf;

/// Extract the kernel and root filesystem from firmware update images
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input firmware file or directory
    pub input: PathBuf,

    /// Output directory for the extracted kernel and rootfs archive
    #[arg(default_value = "images")]
    pub output: PathBuf,

    /// Disable extraction of the root filesystem
    #[arg(long, alias("nf"))]
    pub no_rootfs: bool,

    /// Disable extraction of the kernel
    #[arg(long, alias("nk"))]
    pub no_kernel: bool,

    /// Signature scanner executable
    #[arg(long, default_value = "binwalk")]
    pub binwalk: String,

    /// Timeout for each scanner invocation, measured in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// Enable loud (verbose) output - shows all extraction and processing steps
    #[arg(long)]
    pub loud: bool,
}
