//! Corrupted-session cleanup.
//!
//! The driver persists credentials, cookies and caches in a storage
//! directory this crate treats as opaque, with one exception: when the
//! session breaks (crashed automation driver, stale browser locks), the
//! lock/log/cookie-cache files it leaves behind block the next attempt.
//! [`SessionRecovery::clean_corrupted`] tears the broken driver down,
//! waits for file handles to release, and deletes only files matching the
//! known transient name patterns. Credential and identity files are never
//! touched here.
//!
//! [`SessionRecovery::wipe`] is the stronger, operator-only action: it
//! empties the whole storage directory and forces a fresh pairing.
//!
//! Everything in this module is best-effort. Failures are logged and
//! swallowed; a failed cleanup must never prevent the next connect attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::driver::MessagingDriver;

/// Name fragments of files that are safe to delete during recovery.
/// Chromium-profile lock files, write-ahead logs and cookie caches; never
/// credential or identity files.
const TRANSIENT_MARKERS: &[&str] = &["Cookies", "LOCK", "LOG"];

/// Best-effort cleanup of the driver's session storage.
pub struct SessionRecovery {
    session_dir: PathBuf,
    recovery_grace: Duration,
    wipe_grace: Duration,
}

impl SessionRecovery {
    /// Create a recovery helper for `session_dir`.
    #[must_use]
    pub fn new(session_dir: PathBuf, recovery_grace: Duration, wipe_grace: Duration) -> Self {
        Self {
            session_dir,
            recovery_grace,
            wipe_grace,
        }
    }

    /// The storage directory being managed.
    #[must_use]
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Tear down a possibly-broken driver and purge transient session files.
    ///
    /// Run before every connect attempt and after corruption-signature
    /// errors. No-op when the session directory does not exist yet.
    pub async fn clean_corrupted(&self, driver: &dyn MessagingDriver) {
        if !self.session_dir.exists() {
            return;
        }
        debug!(dir = %self.session_dir.display(), "cleaning possibly corrupted session state");
        if let Err(e) = driver.destroy().await {
            // a broken driver often cannot be torn down cleanly
            debug!(error = %e, "teardown of broken driver failed");
        }
        tokio::time::sleep(self.recovery_grace).await;
        match self.purge_transient_files() {
            Ok(0) => {}
            Ok(purged) => info!(purged, "purged transient session files"),
            Err(e) => warn!(error = %e, "session purge failed"),
        }
    }

    /// Delete the entire contents of the session storage directory.
    ///
    /// Destructive: the next connect requires a fresh pairing. Only ever
    /// invoked through the operator-facing `clear_session` path, never
    /// automatically.
    pub async fn wipe(&self) {
        if !self.session_dir.exists() {
            return;
        }
        tokio::time::sleep(self.wipe_grace).await;
        match self.remove_all_contents() {
            Ok(()) => info!(dir = %self.session_dir.display(), "session storage wiped"),
            Err(e) => warn!(error = %e, "session wipe failed"),
        }
    }

    fn purge_transient_files(&self) -> std::io::Result<usize> {
        let mut purged = 0usize;
        for entry in WalkDir::new(&self.session_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !TRANSIENT_MARKERS.iter().any(|m| name.contains(m)) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => purged += 1,
                Err(e) => {
                    // still held by a dying browser process; skip it
                    debug!(path = %entry.path().display(), error = %e, "could not remove file");
                }
            }
        }
        Ok(purged)
    }

    fn remove_all_contents(&self) -> std::io::Result<()> {
        for entry in std::fs::read_dir(&self.session_dir)? {
            let entry = entry?;
            let path = entry.path();
            let removed = if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = removed {
                debug!(path = %path.display(), error = %e, "could not remove entry");
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
