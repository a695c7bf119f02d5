//! Mounting the decrypted volume and switching the process root into it.
//!
//! Everything here is an irreversible OS-level operation: a failure past
//! the decryptor step leaves the device-mapper node for the kernel to
//! manage and terminates boot.

use log::info;
use nix::mount::{mount, MsFlags};
use nix::unistd::{chdir, chroot};
use sealboot_core::{SealbootError, SealbootResult};
use std::fs;
use std::path::Path;

/// Mount `device` at `target` with the given filesystem type.
pub fn mount_volume(device: &Path, target: &Path, fstype: &str) -> SealbootResult<()> {
    fs::create_dir_all(target).map_err(|err| {
        SealbootError::Mount(format!("mkdir on {} failed: {err}", target.display()))
    })?;
    mount(
        Some(device),
        target,
        Some(fstype),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|err| {
        SealbootError::Mount(format!(
            "mount of {} on {} failed: {err}",
            device.display(),
            target.display()
        ))
    })?;
    info!("mounted {} at {}", device.display(), target.display());
    Ok(())
}

/// Move the volume mounted at `target` over `/` and chroot into it.
///
/// Both sub-steps must succeed in order; there is no way to continue boot
/// without a root filesystem, so either failure is terminal.
pub fn switch_root(target: &Path) -> SealbootResult<()> {
    chdir(target).map_err(|err| {
        SealbootError::RootSwitch(format!("chdir to {} failed: {err}", target.display()))
    })?;
    mount(Some("."), "/", None::<&str>, MsFlags::MS_MOVE, None::<&str>)
        .map_err(|err| SealbootError::RootSwitch(format!("move-mount onto / failed: {err}")))?;
    chroot(".").map_err(|err| SealbootError::RootSwitch(format!("chroot failed: {err}")))?;
    info!("root switched to {}", target.display());
    Ok(())
}
