#![forbid(unsafe_code)]

//! Side-effecting half of the sealboot unlock stage.
//!
//! Integrates with the system via:
//! - the external decryption tool (`cryptsetup open`, passphrase on stdin)
//! - `mount(2)` for the decrypted volume
//! - the chdir / move-mount / chroot root switch

pub mod command;
pub mod orchestrator;
pub mod rootfs;

pub use command::{DecryptorCommand, DEFAULT_CRYPTSETUP_PATH};
pub use orchestrator::{UnlockPlan, UnlockSequence, UnlockStep};
