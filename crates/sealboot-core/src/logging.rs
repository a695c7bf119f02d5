//! Logger setup shared by the sealboot binaries.

use env_logger::{Builder, Env};
use std::io::Write;

/// Environment variable controlling log verbosity, e.g. `SEALBOOT_LOG=debug`.
pub const LOG_ENV: &str = "SEALBOOT_LOG";

/// Initialise the process-wide logger.
///
/// Defaults to `info`; early-boot environments can raise verbosity through
/// `SEALBOOT_LOG` without rebuilding. Passphrase material is never logged
/// at any level.
pub fn init() {
    let env = Env::new().filter_or(LOG_ENV, "info");
    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .try_init()
        .ok();
}
