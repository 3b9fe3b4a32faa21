//! Rootfs repacking.

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Pack the contents of `root` as a gzip-compressed tarball at `dest`.
///
/// Symlinks are stored as links, not chased; firmware roots routinely
/// contain absolute symlinks pointing outside the tree.
pub fn tar_gz_dir(root: &Path, dest: &Path) -> io::Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", root)?;
    builder.into_inner()?.finish()?;
    Ok(())
}
