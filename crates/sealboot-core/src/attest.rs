//! Attestation-client boundary.
//!
//! The attestation protocol itself is an external collaborator: given a
//! server URL, workload id, and TEE evidence, something either releases
//! passphrase bytes or fails. This module pins down that contract and ships
//! one implementation that defers to a helper binary, keeping the
//! cryptography out of this crate entirely.

use crate::error::{SealbootError, SealbootResult};
use crate::secret::{Passphrase, MAX_PASSPHRASE_LEN};
use log::debug;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Contract for the remote secret source.
///
/// One shot: a failed attestation is fatal to the remote path, and retries
/// (if any) belong inside the client, not here.
pub trait AttestationClient {
    fn attest(&self, url: &str, workload_id: &str, tee_data: &str) -> SealbootResult<Passphrase>;
}

/// Invokes an external attestation helper that prints the released
/// passphrase on stdout.
#[derive(Debug, Clone)]
pub struct HelperAttestationClient {
    helper: PathBuf,
}

impl HelperAttestationClient {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }
}

impl AttestationClient for HelperAttestationClient {
    fn attest(&self, url: &str, workload_id: &str, tee_data: &str) -> SealbootResult<Passphrase> {
        debug!("requesting secret release from {url} for workload {workload_id}");
        let output = Command::new(&self.helper)
            .arg("--url")
            .arg(url)
            .arg("--workload-id")
            .arg(workload_id)
            .arg("--tee-data")
            .arg(tee_data)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                SealbootError::Attestation(format!(
                    "failed to spawn {}: {err}",
                    self.helper.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = stderr.trim();
            return Err(SealbootError::Attestation(if diagnostic.is_empty() {
                format!("{} exited with {}", self.helper.display(), output.status)
            } else {
                format!(
                    "{} exited with {}: {diagnostic}",
                    self.helper.display(),
                    output.status
                )
            }));
        }

        if output.stdout.is_empty() {
            return Err(SealbootError::Attestation(
                "attestation helper released no passphrase".into(),
            ));
        }
        if output.stdout.len() > MAX_PASSPHRASE_LEN {
            return Err(SealbootError::Attestation(format!(
                "attestation helper released {} bytes, over the {MAX_PASSPHRASE_LEN}-byte limit",
                output.stdout.len()
            )));
        }
        Ok(Passphrase::new(output.stdout))
    }
}
