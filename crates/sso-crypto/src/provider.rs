//! Process-wide cryptographic settings.
//!
//! Settings are installed once at process start with [`init`] and are
//! read-only afterwards. Code that runs before `init` sees the defaults.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

static SETTINGS: OnceLock<CryptoSettings> = OnceLock::new();

/// Cryptographic provider settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSettings {
    /// Accept SHA-1 based signatures and digests during verification.
    pub allow_legacy_sha1: bool,
}

/// Error returned when settings are initialised twice with different values.
#[derive(Debug, Error)]
#[error("crypto settings already initialised as {0:?}")]
pub struct AlreadyInitialised(pub CryptoSettings);

/// Installs the process-wide settings.
///
/// The first call wins. Repeating the call with identical settings succeeds;
/// a call with different settings is rejected.
///
/// # Errors
///
/// Returns [`AlreadyInitialised`] carrying the installed settings if they
/// differ from `settings`.
pub fn init(settings: CryptoSettings) -> Result<(), AlreadyInitialised> {
    let installed = SETTINGS.get_or_init(|| {
        tracing::debug!(
            allow_legacy_sha1 = settings.allow_legacy_sha1,
            "Installing crypto settings"
        );
        settings
    });

    if *installed == settings {
        Ok(())
    } else {
        Err(AlreadyInitialised(*installed))
    }
}

/// Returns the installed settings, or the defaults if [`init`] was never called.
#[must_use]
pub fn settings() -> CryptoSettings {
    SETTINGS.get().copied().unwrap_or_default()
}
