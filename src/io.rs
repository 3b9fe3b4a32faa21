//! File I/O helpers shared across the engine.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use md5::{Digest, Md5};

/// MD5 of a file, streamed in 64 KiB blocks.
pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{digest:x}"))
}

/// Copy `size` bytes at `offset` of `src` into a new file at `dest`.
/// A zero size writes nothing and creates nothing.
pub fn carve_region(src: &Path, offset: u64, size: u64, dest: &Path) -> io::Result<()> {
    if size == 0 {
        return Ok(());
    }

    let mut input = File::open(src)?;
    input.seek(SeekFrom::Start(offset))?;
    let mut output = File::create(dest)?;
    io::copy(&mut input.take(size), &mut output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn md5_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            md5_file(&path).unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn md5_streams_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        fs::write(&path, vec![0u8; 150 * 1024]).unwrap();

        let whole = {
            let mut hasher = Md5::new();
            hasher.update(fs::read(&path).unwrap());
            format!("{:x}", hasher.finalize())
        };
        assert_eq!(md5_file(&path).unwrap(), whole);
    }

    #[test]
    fn carve_copies_the_requested_region() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, (0u8..=255).collect::<Vec<_>>()).unwrap();

        carve_region(&src, 16, 32, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), (16u8..48).collect::<Vec<_>>());
    }

    #[test]
    fn zero_size_carve_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, b"data").unwrap();

        carve_region(&src, 0, 0, &dest).unwrap();
        assert!(!dest.exists());
    }
}
