//! UNIX root directory detection.

use std::fs;
use std::path::{Path, PathBuf};

/// Directory names that mark the root of a UNIX filesystem.
pub const UNIX_DIRS: [&str; 13] = [
    "bin", "etc", "dev", "home", "lib", "mnt", "opt", "root", "run", "sbin", "tmp", "usr", "var",
];

/// How many of [`UNIX_DIRS`] must be present as immediate subdirectories.
pub const UNIX_THRESHOLD: usize = 4;

/// Locate an extracted UNIX root at or below `start`.
///
/// Single-entry directory chains (`jffs2-root/fs_1/...`) are unwrapped
/// first. With `recurse`, each immediate subdirectory gets one more try,
/// itself without recursion; decoders sometimes produce several trees and
/// only one of them is the root.
pub fn find_unix_root(start: &Path, recurse: bool) -> Option<PathBuf> {
    let mut path = start.to_path_buf();

    loop {
        let entries = read_sorted(&path)?;
        match entries.as_slice() {
            [only] if only.is_dir() => path = only.clone(),
            _ => break,
        }
    }

    let subdirs: Vec<PathBuf> = read_sorted(&path)?
        .into_iter()
        .filter(|entry| entry.is_dir())
        .collect();

    let count = subdirs
        .iter()
        .filter_map(|dir| dir.file_name().and_then(|name| name.to_str()))
        .filter(|name| UNIX_DIRS.contains(name))
        .count();
    if count >= UNIX_THRESHOLD {
        return Some(path);
    }

    if recurse {
        for dir in &subdirs {
            if let Some(root) = find_unix_root(dir, false) {
                return Some(root);
            }
        }
    }

    None
}

fn read_sorted(path: &Path) -> Option<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .ok()?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    entries.sort();
    Some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdirs(base: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir_all(base.join(name)).unwrap();
        }
    }

    #[test]
    fn four_unix_dirs_meet_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["bin", "etc", "lib", "usr"]);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(
            find_unix_root(dir.path(), true),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn three_unix_dirs_do_not() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["bin", "etc", "lib", "www"]);

        assert_eq!(find_unix_root(dir.path(), true), None);
    }

    #[test]
    fn unix_named_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["bin", "etc", "lib"]);
        fs::write(dir.path().join("usr"), "not a directory").unwrap();

        assert_eq!(find_unix_root(dir.path(), true), None);
    }

    #[test]
    fn single_child_chains_are_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("jffs2-root/fs_1");
        mkdirs(&nested, &["bin", "dev", "etc", "sbin", "home"]);

        assert_eq!(find_unix_root(dir.path(), true), Some(nested));
    }

    #[test]
    fn recursion_tries_subdirectories_once() {
        let dir = tempfile::tempdir().unwrap();
        // two sibling trees, only the second qualifies
        mkdirs(dir.path(), &["bootloader"]);
        let root = dir.path().join("squashfs-root");
        mkdirs(&root, &["bin", "etc", "usr", "var"]);

        assert_eq!(find_unix_root(dir.path(), true), Some(root));
    }

    #[test]
    fn recursion_does_not_descend_two_levels() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b");
        mkdirs(&deep, &["bin", "etc", "usr", "var"]);
        // make "a" hold a sibling so the chain unwrap stops at the top
        fs::write(dir.path().join("manifest"), "x").unwrap();
        fs::write(dir.path().join("a").join("manifest"), "x").unwrap();

        assert_eq!(find_unix_root(dir.path(), true), None);
    }
}
