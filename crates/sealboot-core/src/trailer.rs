//! Locator for the TEE configuration blob embedded at the tail of a raw
//! block device.
//!
//! Layout of the last [`TRAILER_LEN`] bytes of the device:
//! `[4-byte magic][8-byte little-endian blob length]`, with the blob itself
//! stored immediately before the trailer. A missing magic is not an error:
//! it signals a deployment without an embedded config, and the caller falls
//! back to the local secret source.

use crate::error::{SealbootError, SealbootResult};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub const TRAILER_LEN: u64 = 12;
pub const TRAILER_MAGIC: [u8; 4] = *b"KRUN";

/// Upper bound for an embedded config blob. A length field above this is
/// treated as a corrupt trailer rather than an allocation request.
pub const MAX_BLOB_LEN: u64 = 1 << 20;

/// Outcome of probing the config device for an embedded TEE config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigBlob {
    Found(Vec<u8>),
    NotPresent,
}

/// Read the trailer of `device` and return the embedded config blob, if any.
///
/// The device is opened read-only and never mutated. Open/seek/read failures
/// surface as [`SealbootError::Device`]; the caller decides whether that is
/// fatal or merely forces the fallback secret source.
pub fn locate_config_blob(device: &Path) -> SealbootResult<ConfigBlob> {
    let mut dev = File::open(device).map_err(|err| device_error(device, "open", &err))?;

    let device_size = dev
        .seek(SeekFrom::End(0))
        .map_err(|err| device_error(device, "seek(end)", &err))?;
    if device_size < TRAILER_LEN {
        return Err(SealbootError::Device(format!(
            "{} is smaller ({device_size} bytes) than the {TRAILER_LEN}-byte trailer",
            device.display()
        )));
    }

    dev.seek(SeekFrom::Start(device_size - TRAILER_LEN))
        .map_err(|err| device_error(device, "seek(trailer)", &err))?;
    let mut trailer = [0u8; TRAILER_LEN as usize];
    dev.read_exact(&mut trailer)
        .map_err(|err| device_error(device, "read(trailer)", &err))?;

    if trailer[..4] != TRAILER_MAGIC {
        return Ok(ConfigBlob::NotPresent);
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&trailer[4..]);
    let blob_len = u64::from_le_bytes(len_bytes);

    if blob_len > MAX_BLOB_LEN {
        return Err(SealbootError::Device(format!(
            "trailer claims a {blob_len}-byte config blob, over the {MAX_BLOB_LEN}-byte cap"
        )));
    }
    let Some(offset) = device_size.checked_sub(blob_len + TRAILER_LEN) else {
        return Err(SealbootError::Device(format!(
            "trailer claims a {blob_len}-byte config blob but {} holds only {device_size} bytes",
            device.display()
        )));
    };

    dev.seek(SeekFrom::Start(offset))
        .map_err(|err| device_error(device, "seek(blob)", &err))?;
    let mut blob = vec![0u8; blob_len as usize];
    dev.read_exact(&mut blob)
        .map_err(|err| device_error(device, "read(blob)", &err))?;

    Ok(ConfigBlob::Found(blob))
}

fn device_error(device: &Path, op: &str, err: &std::io::Error) -> SealbootError {
    SealbootError::Device(format!("{op} on {} failed: {err}", device.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn trailer_bytes(magic: &[u8; 4], blob_len: u64) -> Vec<u8> {
        let mut out = magic.to_vec();
        out.extend_from_slice(&blob_len.to_le_bytes());
        out
    }

    fn device_with(payload: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp device");
        file.write_all(payload).expect("write temp device");
        file
    }

    #[test]
    fn finds_blob_behind_valid_trailer() {
        let blob = br#"{"tee":"sev"}"#;
        let mut image = b"some leading disk contents".to_vec();
        image.extend_from_slice(blob);
        image.extend_from_slice(&trailer_bytes(&TRAILER_MAGIC, blob.len() as u64));
        let device = device_with(&image);

        let found = locate_config_blob(device.path()).expect("locate should succeed");
        assert_eq!(found, ConfigBlob::Found(blob.to_vec()));
    }

    #[test]
    fn magic_mismatch_is_not_present_even_with_bogus_length() {
        // The length field claims far more than the file holds; a mismatched
        // magic must short-circuit before the locator ever trusts it.
        let image = trailer_bytes(b"NOPE", u64::MAX);
        let device = device_with(&image);

        let found = locate_config_blob(device.path()).expect("mismatch is not an error");
        assert_eq!(found, ConfigBlob::NotPresent);
    }

    #[test]
    fn blob_length_past_device_start_is_a_device_error() {
        let mut image = b"short".to_vec();
        image.extend_from_slice(&trailer_bytes(&TRAILER_MAGIC, 1000));
        let device = device_with(&image);

        let err = locate_config_blob(device.path()).expect_err("length must not underflow");
        assert!(matches!(err, SealbootError::Device(_)), "got {err:?}");
    }

    #[test]
    fn blob_length_over_cap_is_a_device_error() {
        let image = trailer_bytes(&TRAILER_MAGIC, MAX_BLOB_LEN + 1);
        let device = device_with(&image);

        let err = locate_config_blob(device.path()).expect_err("cap must hold");
        assert!(matches!(err, SealbootError::Device(_)), "got {err:?}");
    }

    #[test]
    fn device_shorter_than_trailer_is_a_device_error() {
        let device = device_with(b"tiny");
        let err = locate_config_blob(device.path()).expect_err("too small for a trailer");
        assert!(matches!(err, SealbootError::Device(_)), "got {err:?}");
    }

    #[test]
    fn unreadable_device_is_a_device_error() {
        let err = locate_config_blob(Path::new("/nonexistent/sealboot-config-disk"))
            .expect_err("open must fail");
        assert!(matches!(err, SealbootError::Device(_)), "got {err:?}");
    }

    #[test]
    fn empty_blob_is_found_as_empty() {
        let image = trailer_bytes(&TRAILER_MAGIC, 0);
        let device = device_with(&image);
        let found = locate_config_blob(device.path()).expect("locate should succeed");
        assert_eq!(found, ConfigBlob::Found(Vec::new()));
    }
}
