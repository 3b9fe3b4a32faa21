//! Scanner implementation backed by the binwalk executable.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::{Category, Finding, ScanError, ScanModule, ScanOptions, Scanner};

/// Shells out to binwalk for signature scans and extraction.
pub struct Binwalk {
    program: String,
    timeout: Duration,
}

impl Binwalk {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Scanner for Binwalk {
    fn scan(
        &self,
        target: &Path,
        category: Category,
        options: ScanOptions,
        work_dir: &Path,
    ) -> Result<Vec<ScanModule>, ScanError> {
        // Capture through an unlinked temp file; a pipe could fill up and
        // deadlock against wait_timeout.
        let mut stdout = tempfile::tempfile()?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--signature")
            .arg(format!("--include={}", category.filter()));
        if options.extract {
            cmd.arg("--extract")
                .arg("--rm")
                .arg("--directory")
                .arg(work_dir);
            if options.recurse {
                cmd.arg("--matryoshka");
            }
        }
        cmd.arg(target)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|source| ScanError::SpawnFail {
            program: self.program.clone(),
            source,
        })?;

        match child.wait_timeout(self.timeout)? {
            Some(status) if status.success() => {}
            Some(status) => {
                return Err(ScanError::ScanFail {
                    program: self.program.clone(),
                    status,
                    target: target.to_path_buf(),
                });
            }
            None => {
                child.kill().ok();
                child.wait().ok();
                return Err(ScanError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        }

        stdout.seek(SeekFrom::Start(0))?;
        let mut raw = String::new();
        stdout.read_to_string(&mut raw)?;

        let results = parse_results(&raw);
        let extracted_directory = options
            .extract
            .then(|| extraction_dir(target, work_dir))
            .flatten();

        Ok(vec![ScanModule {
            results,
            extracted_directory,
        }])
    }
}

/// Parse binwalk's DECIMAL / HEXADECIMAL / DESCRIPTION result table.
/// Anything that is not a result row (banner, separators) is dropped.
fn parse_results(raw: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for line in raw.lines() {
        let mut fields = line.split_whitespace();
        let (Some(decimal), Some(hex)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(offset) = decimal.parse::<u64>() else {
            continue;
        };
        if !hex.starts_with("0x") {
            continue;
        }
        let description = match line.find(hex) {
            Some(at) => line[at + hex.len()..].trim(),
            None => continue,
        };
        if description.is_empty() {
            continue;
        }
        findings.push(Finding {
            description: description.to_string(),
            offset,
        });
    }
    findings
}

/// Binwalk drops extraction products in `_<name>.extracted` under the
/// requested directory.
fn extraction_dir(target: &Path, work_dir: &Path) -> Option<PathBuf> {
    let name = target.file_name()?.to_str()?;
    let dir = work_dir.join(format!("_{name}.extracted"));
    dir.is_dir().then_some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_rows_and_skips_decoration() {
        let raw = "\
DECIMAL       HEXADECIMAL     DESCRIPTION
--------------------------------------------------------------------------------
0             0x0             TP-Link firmware header, kernel offset: 0x4040
13140         0x3354          U-Boot version string, \"U-Boot 1.1.4\"

";
        let findings = parse_results(raw);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].offset, 0);
        assert!(findings[0]
            .description
            .starts_with("TP-Link firmware header"));
        assert_eq!(findings[1].offset, 13140);
        assert!(findings[1].description.contains("U-Boot 1.1.4"));
    }

    #[test]
    fn ignores_rows_without_hex_column() {
        assert!(parse_results("12345 not-hex something").is_empty());
    }
}
