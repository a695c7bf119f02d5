//! Error taxonomy shared across the sealboot crates.

use thiserror::Error;

pub type SealbootResult<T> = Result<T, SealbootError>;

/// Failure classes of the boot-unlock stage.
///
/// `Device` and `MalformedConfig` are recoverable through the local secret
/// source; everything from `Decryption` onward is fatal to boot.
#[derive(Debug, Error)]
pub enum SealbootError {
    /// Open/seek/read failure on the raw config device.
    #[error("device error: {0}")]
    Device(String),

    /// The embedded TEE config could not be parsed or lacks a required field.
    #[error("malformed TEE config: {0}")]
    MalformedConfig(String),

    /// The TEE config parsed cleanly but asks for something unsupported.
    #[error("invalid TEE config: {0}")]
    InvalidConfig(String),

    /// The remote attestation client reported a failure.
    #[error("attestation failed: {0}")]
    Attestation(String),

    /// No secret source yielded a passphrase.
    #[error("no unlock passphrase available from any secret source")]
    SecretUnavailable,

    /// The external decryption tool could not be spawned or exited non-zero.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("mount failed: {0}")]
    Mount(String),

    #[error("root switch failed: {0}")]
    RootSwitch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
