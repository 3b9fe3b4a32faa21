//! Job-wide parameters, completion state, and the traversal driver.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use walkdir::WalkDir;

use crate::analysis::rootfs::find_unix_root;
use crate::analysis::ExtractionNode;
use crate::archive;
use crate::scanner::Scanner;

/// Output tag shared by every node; only the first successful kernel and
/// rootfs per job survive under it.
pub const TAG: &str = "1";

/// Everything fixed for one extraction run, plus the shared visited set.
pub struct Job {
    input: PathBuf,
    output_dir: Option<PathBuf>,
    want_kernel: AtomicBool,
    want_rootfs: AtomicBool,
    /// MD5 digests of every candidate already examined. The lock covers
    /// only the test-and-insert, never any I/O.
    visited: Mutex<HashSet<String>>,
    scanner: Box<dyn Scanner>,
}

impl Job {
    pub fn new(
        input: PathBuf,
        output_dir: Option<PathBuf>,
        kernel: bool,
        rootfs: bool,
        scanner: Box<dyn Scanner>,
    ) -> Self {
        Self {
            input,
            output_dir,
            want_kernel: AtomicBool::new(kernel),
            want_rootfs: AtomicBool::new(rootfs),
            visited: Mutex::new(HashSet::new()),
            scanner,
        }
    }

    pub fn scanner(&self) -> &dyn Scanner {
        self.scanner.as_ref()
    }

    pub fn want_kernel(&self) -> bool {
        self.want_kernel.load(Ordering::Relaxed)
    }

    pub fn want_rootfs(&self) -> bool {
        self.want_rootfs.load(Ordering::Relaxed)
    }

    /// Downgrade to "don't want": with nowhere to write the artifact,
    /// finding it satisfies completion on its own.
    pub fn clear_want_kernel(&self) {
        self.want_kernel.store(false, Ordering::Relaxed);
    }

    pub fn clear_want_rootfs(&self) {
        self.want_rootfs.store(false, Ordering::Relaxed);
    }

    /// `output/<tag>.kernel`, when an output directory exists.
    pub fn kernel_path(&self, tag: &str) -> Option<PathBuf> {
        self.output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{tag}.kernel")))
    }

    /// `output/<tag>.tar.gz`, when an output directory exists.
    pub fn rootfs_path(&self, tag: &str) -> Option<PathBuf> {
        self.output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{tag}.tar.gz")))
    }

    pub fn kernel_done(&self, tag: &str) -> bool {
        if !self.want_kernel() {
            return true;
        }
        self.kernel_path(tag).is_some_and(|path| path.is_file())
    }

    pub fn rootfs_done(&self, tag: &str) -> bool {
        if !self.want_rootfs() {
            return true;
        }
        self.rootfs_path(tag).is_some_and(|path| path.is_file())
    }

    /// True when `digest` was not seen before; records it either way.
    pub fn first_visit(&self, digest: &str) -> bool {
        self.visited.lock().unwrap().insert(digest.to_string())
    }

    /// Drive the whole job: seed nodes from the input and process each.
    /// Completion is expressed purely through the output files; a seed
    /// that yields nothing just moves on to the next.
    pub fn run(&self) {
        if self.input.is_dir() {
            self.offer_directory_root();
            for entry in WalkDir::new(&self.input)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
            {
                self.seed(entry.into_path());
            }
        } else if self.input.is_file() {
            self.seed(self.input.clone());
        } else {
            log::error!("Cannot read input {:?}", self.input);
        }
    }

    fn seed(&self, path: PathBuf) {
        match ExtractionNode::new(self, path.clone(), 0) {
            Ok(mut node) => {
                node.process();
            }
            Err(e) => log::warn!("Cannot read candidate {:?}: {e}", path),
        }
    }

    /// An input that is already an unpacked tree may itself be the root
    /// filesystem; check before grinding through its files.
    fn offer_directory_root(&self) {
        if self.rootfs_done(TAG) {
            return;
        }
        let Some(root) = find_unix_root(&self.input, true) else {
            return;
        };
        log::info!("Found UNIX filesystem in {}", root.display());
        match self.rootfs_path(TAG) {
            Some(out) => {
                if let Err(e) = archive::tar_gz_dir(&root, &out) {
                    log::error!("Failed to archive {}: {e}", root.display());
                }
            }
            None => self.clear_want_rootfs(),
        }
    }
}
