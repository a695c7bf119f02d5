//! Execution wrapper for the external volume-decryption tool.
//!
//! The passphrase travels over a private stdin pipe: never argv, never the
//! environment, never a file. The in-memory buffer is wiped as soon as
//! delivery has been attempted, on every path, spawn failures included.
//! Shell integration stays isolated here so the orchestrator remains
//! testable with fake binaries.

use log::debug;
use sealboot_core::{Passphrase, SealbootError, SealbootResult};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_CRYPTSETUP_PATH: &str = "/sbin/cryptsetup";

/// Wraps one invocation style: `open --type luks --batch-mode --key-file -`.
#[derive(Debug, Clone)]
pub struct DecryptorCommand {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl DecryptorCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Bound the wait on the decryption tool. Unbounded by default: a hung
    /// unlock hangs boot, which is fatal either way.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Deliver `passphrase` to the decryption tool and wait for it to
    /// finish. The passphrase buffer is wiped before this returns, whatever
    /// the outcome.
    pub fn unlock(
        &self,
        source: &Path,
        mapping_name: &str,
        passphrase: &mut Passphrase,
    ) -> SealbootResult<()> {
        let result = self.deliver(source, mapping_name, passphrase.as_bytes());
        passphrase.wipe();
        result
    }

    fn deliver(&self, source: &Path, mapping_name: &str, passphrase: &[u8]) -> SealbootResult<()> {
        let mut child = Command::new(&self.binary)
            .arg("open")
            .arg("--type")
            .arg("luks")
            .arg("--batch-mode")
            .arg("--key-file")
            .arg("-")
            .arg(source)
            .arg(mapping_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                SealbootError::Decryption(format!(
                    "failed to spawn {}: {err}",
                    self.binary.display()
                ))
            })?;

        // Exact length, no terminator; drop closes the write end so the
        // child sees EOF.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => {
                let res = stdin.write_all(passphrase).and_then(|()| stdin.flush());
                drop(stdin);
                res
            }
            None => Ok(()),
        };

        let stderr_handle = spawn_output_reader(child.stderr.take());
        let status = self.wait(child)?;
        let stderr = stderr_handle.join().unwrap_or_default();

        if status != 0 {
            let diagnostic = stderr.trim();
            return Err(SealbootError::Decryption(if diagnostic.is_empty() {
                format!("{} exited with code {status}", self.binary.display())
            } else {
                format!(
                    "{} exited with code {status}: {diagnostic}",
                    self.binary.display()
                )
            }));
        }

        // A zero exit with an early-closed pipe means the tool read all the
        // key bytes it wanted; not a failure.
        if let Err(err) = write_result {
            debug!("passphrase pipe closed early: {err}");
        }
        Ok(())
    }

    fn wait(&self, mut child: Child) -> SealbootResult<i32> {
        let Some(timeout) = self.timeout else {
            let status = child.wait()?;
            return Ok(status.code().unwrap_or(-1));
        };

        let start = Instant::now();
        while start.elapsed() <= timeout {
            if let Some(status) = child.try_wait()? {
                return Ok(status.code().unwrap_or(-1));
            }
            thread::sleep(Duration::from_millis(25));
        }

        let _ = child.kill();
        let _ = child.wait();
        Err(SealbootError::Decryption(format!(
            "{} timed out after {timeout:?}",
            self.binary.display()
        )))
    }
}

fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = pipe {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
