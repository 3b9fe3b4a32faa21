//! Typed views over the scanner's free-text finding descriptions.
//!
//! The descriptions are the only interop surface with the signature
//! decoders, so all parsing lives here; the analysis cascade consumes
//! typed records only.

/// What a finding description says, in a shape the cascade can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingKind {
    /// U-Boot legacy image wrapping an OS kernel. `size` is the declared
    /// payload length in bytes; the payload starts 64 bytes past the
    /// finding offset.
    UImageKernel { size: u64 },
    /// TP-Link/TRX dual image. Lengths are frequently absent and must be
    /// inferred from the offsets and the file size.
    TrxDual {
        kernel_offset: u64,
        kernel_len: Option<u64>,
        rootfs_offset: u64,
        rootfs_len: Option<u64>,
    },
    /// A kernel version string; `linux` distinguishes Linux from VxWorks
    /// and friends.
    KernelVersion { linux: bool },
    /// A compressed stream carrying the name it was created from.
    OriginalName { name: String },
    Other,
}

pub fn classify(description: &str) -> FindingKind {
    if description.contains("uImage header") {
        if description.contains("OS Kernel Image") {
            return FindingKind::UImageKernel {
                size: decimal_field(description, "image size:").unwrap_or(0),
            };
        }
        return FindingKind::Other;
    }

    if description.contains("kernel offset:") && description.contains("rootfs offset:") {
        if let (Some(kernel_offset), Some(rootfs_offset)) = (
            hex_field(description, "kernel offset:"),
            hex_field(description, "rootfs offset:"),
        ) {
            return FindingKind::TrxDual {
                kernel_offset,
                kernel_len: hex_field(description, "kernel length:"),
                rootfs_offset,
                rootfs_len: hex_field(description, "rootfs length:"),
            };
        }
        return FindingKind::Other;
    }

    if description.contains("kernel version") {
        return FindingKind::KernelVersion {
            linux: description.contains("Linux"),
        };
    }

    if let Some(name) = quoted_field(description, "original file name:") {
        return FindingKind::OriginalName { name };
    }

    FindingKind::Other
}

/// Decimal digits of the comma-separated field containing `key`.
fn decimal_field(description: &str, key: &str) -> Option<u64> {
    let stmt = description.split(',').find(|stmt| stmt.contains(key))?;
    let digits: String = stmt.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Hex value after the colon of the field containing `key`.
fn hex_field(description: &str, key: &str) -> Option<u64> {
    let stmt = description.split(',').find(|stmt| stmt.contains(key))?;
    let value = stmt.split(':').nth(1)?.split_whitespace().next()?;
    let value = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(value, 16).ok()
}

/// First double-quoted string of the field containing `key`.
fn quoted_field(description: &str, key: &str) -> Option<String> {
    let stmt = description.split(',').find(|stmt| stmt.contains(key))?;
    stmt.split('"').nth(1).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uimage_kernel_description() {
        let desc = "uImage header, header size: 64 bytes, header CRC: 0x5A1AC79, \
                    created: 2016-04-12 06:15:24, image size: 1048576 bytes, \
                    Data Address: 0x80000000, Entry Point: 0x8000C310, \
                    data CRC: 0x45F51F0F, OS: Linux, CPU: MIPS, \
                    image type: OS Kernel Image, compression type: lzma, \
                    image name: \"Linux Kernel Image\"";
        assert_eq!(classify(desc), FindingKind::UImageKernel { size: 1048576 });
    }

    #[test]
    fn uimage_without_kernel_payload_is_other() {
        let desc = "uImage header, header size: 64 bytes, image size: 64 bytes, \
                    image type: Firmware Image";
        assert_eq!(classify(desc), FindingKind::Other);
    }

    #[test]
    fn trx_offsets_without_lengths() {
        let desc = "TP-Link firmware header, firmware version: 0.0.3, \
                    image version: \"\", kernel load address: 0x80000000, \
                    kernel entry point: 0x80000000, kernel offset: 0x40, \
                    rootfs offset: 0x100000";
        assert_eq!(
            classify(desc),
            FindingKind::TrxDual {
                kernel_offset: 0x40,
                kernel_len: None,
                rootfs_offset: 0x100000,
                rootfs_len: None,
            }
        );
    }

    #[test]
    fn trx_offsets_with_lengths() {
        let desc = "TP-Link firmware header, kernel offset: 0x4040, \
                    kernel length: 0x20000, rootfs offset: 0x100000, \
                    rootfs length: 0x80000";
        assert_eq!(
            classify(desc),
            FindingKind::TrxDual {
                kernel_offset: 0x4040,
                kernel_len: Some(0x20000),
                rootfs_offset: 0x100000,
                rootfs_len: Some(0x80000),
            }
        );
    }

    #[test]
    fn linux_kernel_version() {
        assert_eq!(
            classify("Linux kernel version 2.6.36"),
            FindingKind::KernelVersion { linux: true }
        );
    }

    #[test]
    fn foreign_kernel_version() {
        assert_eq!(
            classify("VxWorks kernel version \"5.4.2\""),
            FindingKind::KernelVersion { linux: false }
        );
    }

    #[test]
    fn original_file_name() {
        let desc = "gzip compressed data, has original file name: \"rootfs.bin\", \
                    from Unix, last modified: 2014-07-31 03:43:52";
        assert_eq!(
            classify(desc),
            FindingKind::OriginalName {
                name: "rootfs.bin".to_string()
            }
        );
    }

    #[test]
    fn unrelated_description_is_other() {
        assert_eq!(
            classify("Squashfs filesystem, little endian, version 4.0"),
            FindingKind::Other
        );
    }
}
