//! Early-boot unlock binary for confidential VM guests.
//!
//! Obtains the volume passphrase (remote attestation or local secret
//! channel), unlocks the encrypted root, pivots into it, and execs the next
//! stage. Once the exec succeeds no further code runs in this process; a
//! failure anywhere terminates boot with an exit code naming the failure
//! class.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use sealboot_core::attest::HelperAttestationClient;
use sealboot_core::fallback::LocalSecretSource;
use sealboot_core::{logging, SealbootError};
use sealboot_unlock::{UnlockPlan, UnlockSequence, DEFAULT_CRYPTSETUP_PATH};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

const EXIT_GENERIC: i32 = 1;
const EXIT_NO_SECRET: i32 = 2;
const EXIT_DECRYPTION: i32 = 3;
const EXIT_MOUNT: i32 = 4;
const EXIT_ROOT_SWITCH: i32 = 5;
const EXIT_BAD_CONFIG: i32 = 6;

#[derive(Parser, Debug)]
#[command(
    name = "sealboot-init",
    version,
    about = "Unlock the encrypted root volume of a confidential VM guest and switch into it."
)]
struct Cli {
    /// Block device carrying the encrypted root and, optionally, the TEE
    /// config trailer.
    #[arg(long, default_value = "/dev/vda")]
    device: PathBuf,

    /// Name assigned to the decrypted device-mapper node.
    #[arg(long, default_value = "luksroot")]
    mapping_name: String,

    /// Mountpoint for the decrypted volume before the root switch.
    #[arg(long, default_value = "/luksroot")]
    mount_target: PathBuf,

    /// Filesystem type of the decrypted volume.
    #[arg(long, default_value = "ext4")]
    fs_type: String,

    /// Path to the decryption tool.
    #[arg(long, default_value = DEFAULT_CRYPTSETUP_PATH)]
    cryptsetup: PathBuf,

    /// Attestation helper invoked when the TEE config requests remote
    /// secret release.
    #[arg(long, default_value = "/sbin/snp-attest")]
    attest_helper: PathBuf,

    /// Bound the wait on the decryption tool, in seconds (unbounded when
    /// omitted).
    #[arg(long)]
    decrypt_timeout: Option<u64>,

    /// Program to exec once the root switch is complete.
    #[arg(long, default_value = "/bin/sh")]
    next: PathBuf,
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        error!("{err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let plan = UnlockPlan {
        device: cli.device.clone(),
        mapping_name: cli.mapping_name.clone(),
        mount_target: cli.mount_target.clone(),
        fstype: cli.fs_type.clone(),
        cryptsetup: cli.cryptsetup.clone(),
        decrypt_timeout: cli.decrypt_timeout.map(Duration::from_secs),
    };
    let sequence = UnlockSequence::new(
        plan,
        HelperAttestationClient::new(&cli.attest_helper),
        LocalSecretSource::default(),
    );
    sequence.run()?;

    info!("handing off to {}", cli.next.display());
    // Terminal action: on success this process image is replaced and
    // nothing below ever runs.
    let err = Command::new(&cli.next).exec();
    Err(anyhow::Error::new(err).context(format!("exec of {} failed", cli.next.display())))
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SealbootError>() {
        Some(SealbootError::SecretUnavailable) | Some(SealbootError::Attestation(_)) => {
            EXIT_NO_SECRET
        }
        Some(SealbootError::Decryption(_)) => EXIT_DECRYPTION,
        Some(SealbootError::Mount(_)) => EXIT_MOUNT,
        Some(SealbootError::RootSwitch(_)) => EXIT_ROOT_SWITCH,
        Some(SealbootError::MalformedConfig(_)) | Some(SealbootError::InvalidConfig(_)) => {
            EXIT_BAD_CONFIG
        }
        _ => EXIT_GENERIC,
    }
}
