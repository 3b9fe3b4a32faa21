//! File-type probes feeding the analysis blacklist.
//!
//! libmagic is reached through file(1) rather than bindings; the probe
//! runs once per candidate and the two output flavors mirror what the
//! blacklist needs.

use std::io;
use std::path::Path;
use std::process::Command;

/// MIME categories that never contain extractable firmware.
pub const MIME_BLACKLIST: &[&str] = &[
    "application/x-executable",
    "application/x-dosexec",
    "application/x-object",
    "application/pdf",
    "application/msword",
    "image/",
    "text/",
    "video/",
];

/// Free-form type fragments for files whose MIME type is just
/// application/octet-stream.
pub const TYPE_BLACKLIST: &[&str] = &[
    "executable",
    "universal binary",
    "relocatable",
    "bytecode",
    "applet",
];

pub fn mime_type(path: &Path) -> io::Result<String> {
    probe(path, true)
}

pub fn type_string(path: &Path) -> io::Result<String> {
    probe(path, false)
}

fn probe(path: &Path, mime: bool) -> io::Result<String> {
    let mut cmd = Command::new("file");
    cmd.arg("--brief");
    if mime {
        cmd.arg("--mime-type");
    }
    let output = cmd.arg(path).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "file(1) exited with {} probing {:?}",
            output.status, path
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Returns the reported type when `path` should be skipped outright.
/// Probe failures are logged and treated as unclassified.
pub fn blacklisted(path: &Path) -> Option<String> {
    match mime_type(path) {
        Ok(mime) if MIME_BLACKLIST.iter().any(|s| mime.contains(s)) => return Some(mime),
        Ok(_) => {}
        Err(e) => log::warn!("MIME probe failed for {:?}: {e}", path),
    }

    match type_string(path) {
        Ok(freeform) if TYPE_BLACKLIST.iter().any(|s| freeform.contains(s)) => {
            return Some(freeform)
        }
        Ok(_) => {}
        Err(e) => log::warn!("Type probe failed for {:?}: {e}", path),
    }

    // Disk images get misidentified wholesale; the suffix is the only
    // reliable signal.
    if path.extension().is_some_and(|ext| ext == "dmg") {
        return Some(path.display().to_string());
    }

    None
}
