//! Application configuration
//!
//! Central location for viewer constants, upload limits and the
//! environment-driven server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

// ===== Viewer Zoom =====

/// Smallest allowed render scale
pub const MIN_SCALE: f64 = 0.5;
/// Largest allowed render scale
pub const MAX_SCALE: f64 = 3.0;
/// Scale a freshly opened document renders at
pub const DEFAULT_SCALE: f64 = 1.0;
/// Increment used by zoom in / zoom out
pub const ZOOM_STEP: f64 = 0.25;

// ===== Annotations =====

/// Text used when a note is placed without any entered text
pub const DEFAULT_NOTE_TEXT: &str = "Note";

/// Relative coordinates are percentages of the page box
pub const PERCENT: f64 = 100.0;

/// Vertical distance in pixels between a selection and its highlight popover
pub const POPOVER_OFFSET_PX: f64 = 40.0;

// ===== Uploads =====

/// Maximum accepted PDF size (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Category assigned when an upload does not name one
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Every PDF file starts with this header
pub const PDF_MAGIC: &[u8] = b"%PDF-";

// ===== Server =====

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "folio-data";

/// Runtime configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    /// Read configuration from `FOLIO_ADDR` and `FOLIO_DATA_DIR`
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("FOLIO_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()?;
        let data_dir = std::env::var("FOLIO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self { addr, data_dir })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("folio.db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}
