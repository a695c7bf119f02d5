//! End-to-end unlock sequence.
//!
//! Strictly forward: acquire a passphrase, hand it to the decryption tool,
//! mount the decrypted volume, switch root. Nothing before the decryptor
//! step leaves resources behind; everything after it is irreversible, so
//! failures simply terminate boot with the step that sank it.

use crate::command::{DecryptorCommand, DEFAULT_CRYPTSETUP_PATH};
use crate::rootfs::{mount_volume, switch_root};
use log::info;
use sealboot_core::attest::AttestationClient;
use sealboot_core::fallback::LocalSecretSource;
use sealboot_core::secret::obtain_passphrase;
use sealboot_core::SealbootResult;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Progress marker through the unlock sequence, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockStep {
    AcquiringSecret,
    SpawningDecryptor,
    MountingVolume,
    SwitchingRoot,
}

impl fmt::Display for UnlockStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnlockStep::AcquiringSecret => "acquiring unlock passphrase",
            UnlockStep::SpawningDecryptor => "handing passphrase to the decryption tool",
            UnlockStep::MountingVolume => "mounting the decrypted volume",
            UnlockStep::SwitchingRoot => "switching root into the decrypted volume",
        };
        f.write_str(text)
    }
}

/// Fixed parameters of one unlock run.
#[derive(Debug, Clone)]
pub struct UnlockPlan {
    /// Device carrying both the encrypted root and the optional TEE config
    /// trailer.
    pub device: PathBuf,
    /// Name assigned to the decrypted device-mapper node.
    pub mapping_name: String,
    /// Where the decrypted volume is mounted before the root switch.
    pub mount_target: PathBuf,
    pub fstype: String,
    pub cryptsetup: PathBuf,
    /// Optional bound on the decryptor wait; `None` blocks forever, which
    /// matches the init-stage contract (a hung unlock hangs boot).
    pub decrypt_timeout: Option<Duration>,
}

impl Default for UnlockPlan {
    fn default() -> Self {
        Self {
            device: "/dev/vda".into(),
            mapping_name: "luksroot".into(),
            mount_target: "/luksroot".into(),
            fstype: "ext4".into(),
            cryptsetup: DEFAULT_CRYPTSETUP_PATH.into(),
            decrypt_timeout: None,
        }
    }
}

impl UnlockPlan {
    /// Device node the decryption tool attaches the cleartext mapping to.
    pub fn mapper_device(&self) -> PathBuf {
        Path::new("/dev/mapper").join(&self.mapping_name)
    }
}

/// Drives the unlock sequence against a fixed plan.
pub struct UnlockSequence<A> {
    plan: UnlockPlan,
    attester: A,
    local: LocalSecretSource,
}

impl<A: AttestationClient> UnlockSequence<A> {
    pub fn new(plan: UnlockPlan, attester: A, local: LocalSecretSource) -> Self {
        Self {
            plan,
            attester,
            local,
        }
    }

    /// Run the sequence to completion.
    ///
    /// On success the process root is the decrypted volume. On failure the
    /// error class names the failing step; the passphrase buffer is wiped
    /// by the decryptor wrapper in either case.
    pub fn run(&self) -> SealbootResult<()> {
        info!("{}", UnlockStep::AcquiringSecret);
        let mut passphrase = obtain_passphrase(&self.plan.device, &self.attester, &self.local)?;

        info!("{}", UnlockStep::SpawningDecryptor);
        let mut decryptor = DecryptorCommand::new(&self.plan.cryptsetup);
        if let Some(timeout) = self.plan.decrypt_timeout {
            decryptor = decryptor.with_timeout(timeout);
        }
        decryptor.unlock(&self.plan.device, &self.plan.mapping_name, &mut passphrase)?;

        info!("{}", UnlockStep::MountingVolume);
        mount_volume(
            &self.plan.mapper_device(),
            &self.plan.mount_target,
            &self.plan.fstype,
        )?;

        info!("{}", UnlockStep::SwitchingRoot);
        switch_root(&self.plan.mount_target)?;

        Ok(())
    }
}
