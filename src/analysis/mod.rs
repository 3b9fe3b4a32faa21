//! Per-candidate analysis: the recursive extraction cascade.
//!
//! Every candidate file becomes an [`ExtractionNode`]. Processing runs a
//! fixed sequence of checks against it; any check may carve or decode
//! children, which recurse through the same machinery until the job's
//! kernel and rootfs outputs exist or the traversal bounds fire.

pub mod rootfs;

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::ExtractError;
use crate::io::{carve_region, md5_file};
use crate::job::{Job, TAG};
use crate::scanner::describe::{classify, FindingKind};
use crate::scanner::{Category, ScanModule, ScanOptions};
use crate::{archive, dlink, magic};

/// Maximum nesting of real container layers.
pub const RECURSION_DEPTH: usize = 3;

/// Maximum children processed per container directory.
pub const RECURSION_BREADTH: usize = 5;

/// Payload of a U-Boot legacy image starts this far past the header.
const UIMAGE_HEADER_LEN: u64 = 64;

/// One candidate file under analysis, with its private scratch directory.
///
/// The scratch is allocated only when the node survives the preflight
/// checks, and is removed when the node is dropped, on every exit path.
pub struct ExtractionNode<'a> {
    job: &'a Job,
    path: PathBuf,
    depth: usize,
    digest: String,
    tag: &'static str,
    scratch: Option<TempDir>,
    terminate: bool,
    kernel_done: bool,
    rootfs_done: bool,
}

impl<'a> ExtractionNode<'a> {
    /// Hashes the file eagerly; failing to read it fails construction.
    pub fn new(job: &'a Job, path: PathBuf, depth: usize) -> std::io::Result<Self> {
        let digest = md5_file(&path)?;
        let mut node = Self {
            job,
            path,
            depth,
            digest,
            tag: TAG,
            scratch: None,
            terminate: false,
            kernel_done: false,
            rootfs_done: false,
        };
        node.update_status();
        Ok(node)
    }

    /// Complete when early termination was signaled or both outputs exist.
    pub fn complete(&self) -> bool {
        self.terminate || (self.kernel_done && self.rootfs_done)
    }

    fn update_status(&mut self) -> bool {
        self.kernel_done = self.job.kernel_done(self.tag);
        self.rootfs_done = self.job.rootfs_done(self.tag);
        self.complete()
    }

    fn trace(&self, msg: &str) {
        log::info!("{}{}", "\t".repeat(self.depth), msg);
    }

    fn scratch_path(&self) -> &Path {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .expect("scratch exists while analysis runs")
    }

    /// Run the preflight checks and the analysis cascade. Returns true
    /// when this node, including everything reached through it, reports
    /// complete.
    pub fn process(&mut self) -> bool {
        self.trace(&self.path.display().to_string());

        if self.complete() {
            self.trace(">> Skipping: completed");
            return true;
        }
        if self.depth > RECURSION_DEPTH {
            self.trace(&format!(">> Skipping: recursion depth {}", self.depth));
            return self.complete();
        }

        self.trace(&format!(">> MD5: {}", self.digest));
        if !self.job.first_visit(&self.digest) {
            self.trace(">> Skipping: already visited");
            return self.complete();
        }

        if let Some(reported) = magic::blacklisted(&self.path) {
            self.trace(&format!(">> Skipping: {reported}"));
            return self.complete();
        }

        match tempfile::Builder::new().prefix("fwextract_").tempdir() {
            Ok(scratch) => {
                self.trace(&format!(">> Scratch: {}", scratch.path().display()));
                self.scratch = Some(scratch);
            }
            Err(e) => {
                log::error!("Failed to create scratch directory: {e}");
                return self.complete();
            }
        }
        self.trace(&format!(
            ">> Status: kernel: {}, rootfs: {}",
            self.kernel_done, self.rootfs_done
        ));

        let phases: [(&str, fn(&mut Self) -> Result<bool, ExtractError>); 6] = [
            ("archive", Self::check_archive),
            ("encryption", Self::check_encryption),
            ("firmware", Self::check_firmware),
            ("kernel", Self::check_kernel),
            ("rootfs", Self::check_rootfs),
            ("compressed", Self::check_compressed),
        ];
        for (name, phase) in phases {
            match phase(self) {
                Ok(true) => {
                    if self.update_status() {
                        self.trace(">> Skipping: completed");
                        return true;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    // one bad candidate never aborts the job
                    log::error!("{name} analysis failed for {:?}: {e}", self.path);
                    return false;
                }
            }
        }
        false
    }

    fn check_archive(&mut self) -> Result<bool, ExtractError> {
        self.check_container(Category::Archive)
    }

    fn check_compressed(&mut self) -> Result<bool, ExtractError> {
        self.check_container(Category::Compressed)
    }

    /// Open a container, preferring a whole extracted UNIX root over
    /// recursing into individual children.
    fn check_container(&mut self, category: Category) -> Result<bool, ExtractError> {
        let modules = self.job.scanner().scan(
            &self.path,
            category,
            ScanOptions {
                extract: true,
                recurse: true,
            },
            self.scratch_path(),
        )?;

        for module in &modules {
            if let Some(finding) = module.results.first() {
                self.trace(&format!(">>>> {}", finding.description));
            }
            let Some(dir) = module.extracted_directory.as_deref() else {
                continue;
            };

            if let Some(root) = rootfs::find_unix_root(dir, true) {
                self.trace(&format!(">>>> Found UNIX filesystem in {}", root.display()));
                self.emit_rootfs(&root)?;
                return Ok(true);
            }

            self.trace(&format!(">> Recursing into {}", category.filter()));
            let children = order_children(child_files(dir), original_name_hint(module));
            let mut count = 0usize;
            for child_path in children {
                if count > RECURSION_BREADTH {
                    self.trace(&format!(
                        ">> Skipping: recursion breadth {RECURSION_BREADTH}"
                    ));
                    self.terminate = true;
                    return Ok(true);
                }
                let Some(mut child) = self.child(child_path, self.depth + 1) else {
                    continue;
                };
                if child.process() && self.update_status() {
                    return Ok(true);
                }
                count += 1;
            }
        }
        Ok(false)
    }

    /// D-Link SHRS blobs decrypt into the scratch directory; the plaintext
    /// is picked up through the surrounding container's traversal rather
    /// than re-queued here.
    fn check_encryption(&mut self) -> Result<bool, ExtractError> {
        let mut head = [0u8; 4];
        match File::open(&self.path)?.read_exact(&mut head) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if &head != dlink::MAGIC {
            return Ok(false);
        }

        self.trace(&format!(
            ">>>> Found D-Link encrypted firmware in {}",
            self.path.display()
        ));
        let dest = self.scratch_path().join("dlink_decrypt");
        if let Err(e) = dlink::decrypt_shrs(&self.path, &dest) {
            log::warn!("SHRS decryption failed for {:?}: {e}", self.path);
        }
        Ok(true)
    }

    /// Carve kernel/rootfs slices straight out of known vendor headers.
    /// Carved children stay at the same depth: no container layer was
    /// peeled.
    fn check_firmware(&mut self) -> Result<bool, ExtractError> {
        let modules = self.job.scanner().scan(
            &self.path,
            Category::Header,
            ScanOptions::default(),
            self.scratch_path(),
        )?;
        let filesize = fs::metadata(&self.path)?.len();

        for module in &modules {
            for finding in &module.results {
                match classify(&finding.description) {
                    FindingKind::UImageKernel { size } if !self.kernel_done => {
                        let offset = finding.offset + UIMAGE_HEADER_LEN;
                        let fits = size != 0
                            && offset.checked_add(size).is_some_and(|end| end <= filesize);
                        if !fits {
                            continue;
                        }

                        self.trace(&format!(">>>> {}", finding.description));
                        let carved = self.scratch_path().join("uimage.kernel");
                        carve_region(&self.path, offset, size, &carved)?;
                        let Some(mut child) = self.child(carved, self.depth) else {
                            continue;
                        };
                        return Ok(child.process());
                    }
                    FindingKind::TrxDual {
                        kernel_offset,
                        kernel_len,
                        rootfs_offset,
                        rootfs_len,
                    } if !self.kernel_done && !self.rootfs_done => {
                        let mut kernel_size = kernel_len.unwrap_or(0);
                        let mut rootfs_size = rootfs_len.unwrap_or(0);
                        // lengths are usually absent; infer them from the
                        // offsets and the file size
                        if kernel_size == 0 && rootfs_size == 0 && kernel_offset != rootfs_offset
                        {
                            kernel_size = rootfs_offset.saturating_sub(kernel_offset);
                            rootfs_size = filesize.saturating_sub(rootfs_offset);
                        }

                        let kernel_fits = kernel_size > 0
                            && kernel_offset
                                .checked_add(kernel_size)
                                .is_some_and(|end| end <= filesize);
                        let rootfs_fits = rootfs_size != 0
                            && rootfs_offset
                                .checked_add(rootfs_size)
                                .is_some_and(|end| end <= filesize);
                        if !kernel_fits || !rootfs_fits {
                            continue;
                        }

                        self.trace(&format!(">>>> {}", finding.description));
                        let kernel_part = self.scratch_path().join("trx.kernel");
                        carve_region(&self.path, kernel_offset, kernel_size, &kernel_part)?;
                        if let Some(mut child) = self.child(kernel_part, self.depth) {
                            child.process();
                        }

                        let rootfs_part = self.scratch_path().join("trx.rootfs");
                        carve_region(&self.path, rootfs_offset, rootfs_size, &rootfs_part)?;
                        if let Some(mut child) = self.child(rootfs_part, self.depth) {
                            child.process();
                        }

                        return Ok(self.update_status());
                    }
                    _ => {}
                }
            }
        }
        Ok(false)
    }

    /// A Linux kernel version string marks the whole file as the kernel;
    /// any other OS string rejects the candidate outright.
    fn check_kernel(&mut self) -> Result<bool, ExtractError> {
        if self.kernel_done {
            return Ok(false);
        }
        let modules = self.job.scanner().scan(
            &self.path,
            Category::Kernel,
            ScanOptions::default(),
            self.scratch_path(),
        )?;
        let Some(module) = modules.first() else {
            return Ok(false);
        };

        for finding in &module.results {
            if let FindingKind::KernelVersion { linux } = classify(&finding.description) {
                if !linux {
                    self.trace(&format!(">>>> Ignoring: {}", finding.description));
                    return Ok(false);
                }
                match self.job.kernel_path(self.tag) {
                    Some(out) => {
                        fs::copy(&self.path, out)?;
                    }
                    None => self.job.clear_want_kernel(),
                }
                self.trace(&format!(">>>> {}", finding.description));
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Extract filesystem signatures and archive the first UNIX root.
    fn check_rootfs(&mut self) -> Result<bool, ExtractError> {
        if self.rootfs_done {
            return Ok(false);
        }
        let modules = self.job.scanner().scan(
            &self.path,
            Category::Filesystem,
            ScanOptions {
                extract: true,
                recurse: true,
            },
            self.scratch_path(),
        )?;

        for module in &modules {
            if let Some(finding) = module.results.first() {
                self.trace(&format!(">>>> {}", finding.description));
            }
            let Some(dir) = module.extracted_directory.as_deref() else {
                continue;
            };

            // the first module that extracted anything decides
            let Some(root) = rootfs::find_unix_root(dir, true) else {
                return Ok(false);
            };
            self.trace(&format!(">>>> Found UNIX filesystem in {}", root.display()));
            self.emit_rootfs(&root)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Construct a child node, or log and skip it when the candidate
    /// cannot be read; one bad candidate never aborts the parent.
    fn child(&self, path: PathBuf, depth: usize) -> Option<ExtractionNode<'a>> {
        match ExtractionNode::new(self.job, path.clone(), depth) {
            Ok(node) => Some(node),
            Err(e) => {
                log::warn!("Cannot read candidate {:?}: {e}", path);
                None
            }
        }
    }

    /// Archive the root, or when there is nowhere to put it, stop wanting
    /// one.
    fn emit_rootfs(&mut self, root: &Path) -> Result<(), ExtractError> {
        match self.job.rootfs_path(self.tag) {
            Some(out) => archive::tar_gz_dir(root, &out)?,
            None => self.job.clear_want_rootfs(),
        }
        Ok(())
    }
}

impl Drop for ExtractionNode<'_> {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                // decoders produce files with odd permissions; leftover
                // scratch is not worth failing over
                log::warn!("Cannot delete {:?}: {e}", path);
            }
        }
    }
}

/// Flatten every regular file below `dir`.
fn child_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Shortest names first, ties broken lexicographically; a restored
/// original file name jumps the queue.
fn order_children(mut files: Vec<PathBuf>, hint: Option<String>) -> Vec<PathBuf> {
    files.sort_by(|a, b| {
        let a = file_name(a);
        let b = file_name(b);
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });
    if let Some(name) = hint {
        if let Some(at) = files.iter().position(|path| file_name(path) == name) {
            let hinted = files.remove(at);
            files.insert(0, hinted);
        }
    }
    files
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}

fn original_name_hint(module: &ScanModule) -> Option<String> {
    module
        .results
        .iter()
        .find_map(|finding| match classify(&finding.description) {
            FindingKind::OriginalName { name } => Some(name),
            _ => None,
        })
}
