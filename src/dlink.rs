//! D-Link SHRS image decryption.
//!
//! SHRS update blobs prepend a 1756-byte header to an AES-128-CBC payload
//! encrypted with a key and IV shared by the whole product line.

use std::fs;
use std::path::Path;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};

use crate::error::ExtractError;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const MAGIC: &[u8; 4] = b"SHRS";

const HEADER_LEN: usize = 1756;

const KEY: [u8; 16] = [
    0xc0, 0x5f, 0xbf, 0x19, 0x36, 0xc9, 0x94, 0x29, 0xce, 0x2a, 0x07, 0x81, 0xf0, 0x8d, 0x6a,
    0xd8,
];
const IV: [u8; 16] = [
    0x67, 0xc6, 0x69, 0x73, 0x51, 0xff, 0x4a, 0xec, 0x29, 0xcd, 0xba, 0xab, 0xf2, 0xfb, 0xe3,
    0x46,
];

/// Decrypt the payload of `src` into `dest`.
///
/// Trailing bytes short of a full cipher block are discarded, matching
/// what an unpadded CBC pipeline does with a truncated stream.
pub fn decrypt_shrs(src: &Path, dest: &Path) -> Result<(), ExtractError> {
    let data = fs::read(src)?;
    let payload = data.get(HEADER_LEN..).unwrap_or_default();
    let mut buf = payload[..payload.len() - payload.len() % 16].to_vec();

    let cipher = Aes128CbcDec::new(&KEY.into(), &IV.into());
    let plain = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| ExtractError::Unaligned)?;

    fs::write(dest, plain)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    fn shrs_blob(plain: &[u8]) -> Vec<u8> {
        let mut buf = plain.to_vec();
        let len = buf.len();
        let cipher = Aes128CbcEnc::new(&KEY.into(), &IV.into());
        let encrypted = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .unwrap()
            .to_vec();

        let mut blob = vec![0u8; HEADER_LEN];
        blob[..4].copy_from_slice(MAGIC);
        blob.extend_from_slice(&encrypted);
        blob
    }

    #[test]
    fn round_trips_block_aligned_payloads() {
        let plain = b"0123456789abcdefFEDCBA9876543210";
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fw.bin");
        let dest = dir.path().join("dlink_decrypt");
        std::fs::write(&src, shrs_blob(plain)).unwrap();

        decrypt_shrs(&src, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), plain);
    }

    #[test]
    fn truncated_input_decrypts_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fw.bin");
        let dest = dir.path().join("dlink_decrypt");
        std::fs::write(&src, b"SHRS too short").unwrap();

        decrypt_shrs(&src, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"");
    }

    #[test]
    fn partial_trailing_block_is_dropped() {
        let plain = b"0123456789abcdef";
        let mut blob = shrs_blob(plain);
        blob.extend_from_slice(b"stray");

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fw.bin");
        let dest = dir.path().join("dlink_decrypt");
        std::fs::write(&src, blob).unwrap();

        decrypt_shrs(&src, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), plain);
    }
}
