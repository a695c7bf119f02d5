//! Passphrase type and the secret-source strategy.
//!
//! The strategy decides, in priority order, how the unlock passphrase is
//! obtained: embedded TEE config dispatching to remote attestation or the
//! local source, with the local source also covering the no-config,
//! unreadable-device, and malformed-config cases.

use crate::attest::AttestationClient;
use crate::error::{SealbootError, SealbootResult};
use crate::fallback::LocalSecretSource;
use crate::teeconfig::{parse_tee_config, TeeKind};
use crate::trailer::{locate_config_blob, ConfigBlob};
use log::{info, warn};
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, Zeroizing};

/// Hard cap on passphrase length across every source.
pub const MAX_PASSPHRASE_LEN: usize = 512;

/// Raw passphrase bytes with explicit length; arbitrary bytes are allowed,
/// no terminator is assumed.
///
/// Wiped on drop. The decryptor wrapper additionally calls [`wipe`] the
/// moment delivery has been attempted, so the secret never outlives its
/// single use even while the value itself is still alive.
///
/// [`wipe`]: Passphrase::wipe
pub struct Passphrase(Zeroizing<Vec<u8>>);

impl Passphrase {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Build from bytes, keeping at most [`MAX_PASSPHRASE_LEN`].
    pub fn capped(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(MAX_PASSPHRASE_LEN);
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite the buffer with zeros and empty it.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }
}

// The contents must never reach a log line or panic message.
impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase({} bytes)", self.0.len())
    }
}

/// Resolve the unlock passphrase for this boot.
///
/// Priority order:
/// 1. Embedded TEE config found and parsed: dispatch on the `tee` tag —
///    `snp` goes to the attestation client, `sev` to the local source, and
///    an unrecognized tag is a hard error with no fallback.
/// 2. No config trailer on the device: local source directly.
/// 3. Unreadable device or malformed config: log the problem, still try the
///    local source. An optional config disk must not brick the boot.
///
/// A failed remote attestation does NOT fall back to the local source: once
/// the config demands remote release, serving a locally-provisioned secret
/// instead would downgrade the trust model.
pub fn obtain_passphrase<A>(
    config_device: &Path,
    attester: &A,
    local: &LocalSecretSource,
) -> SealbootResult<Passphrase>
where
    A: AttestationClient,
{
    match locate_config_blob(config_device) {
        Ok(ConfigBlob::Found(blob)) => match parse_tee_config(&blob) {
            Ok(config) => match config.tee_kind()? {
                TeeKind::Snp => {
                    info!(
                        "TEE config requests SNP attestation against {}",
                        config.attestation_url
                    );
                    let tee_data = config.tee_data.as_deref().ok_or_else(|| {
                        SealbootError::MalformedConfig("missing field `tee_data`".into())
                    })?;
                    attester.attest(&config.attestation_url, &config.workload_id, tee_data)
                }
                TeeKind::Sev => {
                    info!("TEE config selects the local secret source");
                    local_or_unavailable(local)
                }
            },
            Err(err @ SealbootError::MalformedConfig(_)) => {
                warn!("embedded TEE config unusable ({err}); trying local secret source");
                local_or_unavailable(local)
            }
            Err(err) => Err(err),
        },
        Ok(ConfigBlob::NotPresent) => {
            info!("no embedded TEE config; using local secret source");
            local_or_unavailable(local)
        }
        Err(err @ SealbootError::Device(_)) => {
            warn!("config device unreadable ({err}); trying local secret source");
            local_or_unavailable(local)
        }
        Err(err) => Err(err),
    }
}

fn local_or_unavailable(local: &LocalSecretSource) -> SealbootResult<Passphrase> {
    local.acquire()?.ok_or(SealbootError::SecretUnavailable)
}
