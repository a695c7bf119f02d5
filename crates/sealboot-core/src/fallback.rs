//! Local fallback secret source.
//!
//! Two probes, in order: an environment override for developer and
//! non-attestation setups, then the kernel-provisioned secret exposed
//! through a securityfs mount. The securityfs secret is read exactly once
//! and deleted so it cannot be re-extracted later in boot.

use crate::error::{SealbootError, SealbootResult};
use crate::secret::{Passphrase, MAX_PASSPHRASE_LEN};
use log::{debug, warn};
use nix::mount::{mount, umount, MsFlags};
use std::fs;
use std::io::{ErrorKind, Read};
use std::env;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

/// Environment override holding a literal passphrase.
pub const PASS_ENV: &str = "SEALBOOT_PASS";

const SECURITYFS_MOUNTPOINT: &str = "/sfs";
const CMDLINE_SECRET_PATH: &str = "/sfs/secret_values/luks";

/// Probes the environment override and the one-time kernel secret.
///
/// The default instance targets the real boot paths; [`with_paths`] points
/// the probe at arbitrary files so the one-time-read contract is testable
/// without root or a securityfs mount.
///
/// [`with_paths`]: LocalSecretSource::with_paths
#[derive(Debug, Clone)]
pub struct LocalSecretSource {
    env_var: String,
    secret_path: PathBuf,
    probe_mountpoint: Option<PathBuf>,
}

impl Default for LocalSecretSource {
    fn default() -> Self {
        Self {
            env_var: PASS_ENV.to_string(),
            secret_path: CMDLINE_SECRET_PATH.into(),
            probe_mountpoint: Some(SECURITYFS_MOUNTPOINT.into()),
        }
    }
}

impl LocalSecretSource {
    /// Build a source that reads `secret_path` directly, skipping the
    /// securityfs probe mount.
    pub fn with_paths(env_var: impl Into<String>, secret_path: impl Into<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            secret_path: secret_path.into(),
            probe_mountpoint: None,
        }
    }

    /// Try each local probe in order.
    ///
    /// `Ok(None)` means this source has nothing to offer; the caller decides
    /// whether that is fatal. Mount/directory state created for the probe is
    /// released in reverse order whatever the outcome.
    pub fn acquire(&self) -> SealbootResult<Option<Passphrase>> {
        if let Some(pass) = self.env_override() {
            debug!("using passphrase from ${}", self.env_var);
            return Ok(Some(pass));
        }

        let _probe = match &self.probe_mountpoint {
            Some(mountpoint) => Some(SecurityfsProbe::mount(mountpoint)?),
            None => None,
        };
        read_one_time_secret(&self.secret_path)
    }

    fn env_override(&self) -> Option<Passphrase> {
        let value = env::var_os(&self.env_var)?;
        let bytes = value.into_vec();
        if bytes.is_empty() {
            return None;
        }
        Some(Passphrase::capped(bytes))
    }
}

/// Read the kernel-provisioned secret at `path` and unlink it.
///
/// The unlink happens only after a successful read, so a transient read
/// failure does not burn the secret. A missing file is the normal "nothing
/// provisioned" signal, not an error.
pub fn read_one_time_secret(path: &Path) -> SealbootResult<Option<Passphrase>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(SealbootError::Device(format!(
                "open on {} failed: {err}",
                path.display()
            )))
        }
    };

    let mut bytes = Vec::new();
    file.take(MAX_PASSPHRASE_LEN as u64)
        .read_to_end(&mut bytes)
        .map_err(SealbootError::from)?;

    if let Err(err) = fs::remove_file(path) {
        warn!("failed to remove one-time secret {}: {err}", path.display());
    }

    if bytes.is_empty() {
        debug!("one-time secret at {} was empty", path.display());
        return Ok(None);
    }
    Ok(Some(Passphrase::new(bytes)))
}

/// Scoped securityfs mount used to expose the kernel secret path.
///
/// Acquisition order is mkdir then mount; drop releases in reverse order,
/// and only what was actually acquired.
struct SecurityfsProbe {
    mountpoint: PathBuf,
    created_dir: bool,
    mounted: bool,
}

impl SecurityfsProbe {
    fn mount(mountpoint: &Path) -> SealbootResult<Self> {
        let created_dir = match fs::create_dir(mountpoint) {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => false,
            Err(err) => {
                return Err(SealbootError::Mount(format!(
                    "mkdir on {} failed: {err}",
                    mountpoint.display()
                )))
            }
        };

        let mut probe = Self {
            mountpoint: mountpoint.to_path_buf(),
            created_dir,
            mounted: false,
        };
        mount(
            Some("securityfs"),
            mountpoint,
            Some("securityfs"),
            MsFlags::MS_NODEV | MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_RELATIME,
            None::<&str>,
        )
        .map_err(|err| SealbootError::Mount(format!("mount(securityfs) failed: {err}")))?;
        probe.mounted = true;
        Ok(probe)
    }
}

impl Drop for SecurityfsProbe {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(err) = umount(&self.mountpoint) {
                warn!("umount({}) failed: {err}", self.mountpoint.display());
            }
        }
        if self.created_dir {
            if let Err(err) = fs::remove_dir(&self.mountpoint) {
                if err.kind() != ErrorKind::NotFound {
                    warn!("rmdir({}) failed: {err}", self.mountpoint.display());
                }
            }
        }
    }
}
