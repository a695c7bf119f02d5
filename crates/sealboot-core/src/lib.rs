#![forbid(unsafe_code)]

//! Secret acquisition for the sealboot unlock stage.
//!
//! Everything in this crate is a pure transform or a contained probe: locate
//! the TEE configuration blob at the tail of the config device, parse it,
//! and decide which secret source yields the volume passphrase. The
//! side-effecting half of boot (decryptor invocation, mounts, root switch)
//! lives in `sealboot-unlock`.

pub mod attest;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod secret;
pub mod teeconfig;
pub mod trailer;

pub use error::{SealbootError, SealbootResult};
pub use secret::{obtain_passphrase, Passphrase, MAX_PASSPHRASE_LEN};
pub use teeconfig::{parse_tee_config, TeeConfig, TeeKind};
pub use trailer::{locate_config_blob, ConfigBlob};
