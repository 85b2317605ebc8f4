//! Pairing artifact rendering and publication.
//!
//! When the driver issues a pairing code the supervisor hands the raw
//! payload here. The publisher renders a scannable QR (SVG, wrapped as a
//! base64 data URL), stamps it, keeps it in memory for fast polling, and
//! writes it to disk so a restarted process inspecting the same session can
//! still serve the last artifact. The durable write is temp-file + rename,
//! so a polling reader never sees a half-written artifact.
//!
//! While the process is alive the in-memory value is authoritative; the
//! file is only consulted when memory holds nothing.

use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use qrcode::QrCode;
use qrcode::render::svg;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Rendered QR edge length in pixels.
const QR_DIMENSIONS: u32 = 300;

/// The latest pairing artifact. Overwritten on every issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingArtifact {
    /// Opaque payload from the driver.
    pub raw_code: String,
    /// Scannable rendering as a `data:image/svg+xml;base64,…` URL.
    pub rendered_image: Option<String>,
    /// When the code was issued.
    pub issued_at: DateTime<Utc>,
}

/// Failures while rendering or persisting an artifact. Callers log these;
/// a failed publish never interrupts the connection lifecycle.
#[derive(Debug, Error)]
pub enum PairingError {
    /// QR rendering failed (payload too large for any QR version).
    #[error("QR render failed: {0}")]
    Render(String),
    /// Durable write failed.
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Artifact (de)serialization failed.
    #[error("artifact serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Publishes the latest pairing artifact to polling operators.
pub struct PairingPublisher {
    path: PathBuf,
    current: RwLock<Option<PairingArtifact>>,
}

impl PairingPublisher {
    /// Create a publisher persisting to `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: RwLock::new(None),
        }
    }

    /// Render `raw_code`, stamp it, and overwrite the current artifact both
    /// in memory and on disk.
    pub fn publish(&self, raw_code: &str) -> Result<PairingArtifact, PairingError> {
        let artifact = PairingArtifact {
            raw_code: raw_code.to_string(),
            rendered_image: Some(render_qr_data_url(raw_code)?),
            issued_at: Utc::now(),
        };
        *self.current.write() = Some(artifact.clone());
        self.persist(&artifact)?;
        debug!("pairing artifact published");
        Ok(artifact)
    }

    /// The latest artifact, or `None` if cleared. In-memory wins; the
    /// durable copy only serves a process that has not published yet.
    #[must_use]
    pub fn current(&self) -> Option<PairingArtifact> {
        if let Some(artifact) = self.current.read().as_ref() {
            return Some(artifact.clone());
        }
        self.read_durable()
    }

    /// Drop the current artifact, in memory and on disk.
    pub fn clear(&self) {
        *self.current.write() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to remove durable pairing artifact"),
        }
    }

    fn persist(&self, artifact: &PairingArtifact) -> Result<(), PairingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(artifact)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_durable(&self) -> Option<PairingArtifact> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "failed to read durable pairing artifact");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(error = %e, "durable pairing artifact is unparseable");
                None
            }
        }
    }
}

/// Render `raw` as an SVG QR code wrapped in a base64 data URL.
fn render_qr_data_url(raw: &str) -> Result<String, PairingError> {
    let code = QrCode::new(raw.as_bytes()).map_err(|e| PairingError::Render(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_DIMENSIONS, QR_DIMENSIONS)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        BASE64.encode(image)
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
