use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Defines how often a block flushes data to the physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
  /// Call `fsync` after every single `append` operation.
  /// Safest, but highest latency.
  Strict,

  /// Never call `fsync` automatically. Each append is handed to the OS
  /// buffer and the OS background flush does the rest.
  Async,
}

/// Compression codec applied to every page of a block.
///
/// The keyword form (`Display`/`FromStr`) is what appears in block filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
  None,
  Gzip,
  Lz4Max64Kb,
  Lz4Max256Kb,
  Lz4Max1Mb,
  /// LZ4 frame with 4 MB blocks.
  Lz4,
  Snappy,
  Zstd,
}

impl Encoding {
  /// Every encoding a block can be written with.
  pub const ALL: [Encoding; 8] = [
    Encoding::None,
    Encoding::Gzip,
    Encoding::Lz4Max64Kb,
    Encoding::Lz4Max256Kb,
    Encoding::Lz4Max1Mb,
    Encoding::Lz4,
    Encoding::Snappy,
    Encoding::Zstd,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Encoding::None => "none",
      Encoding::Gzip => "gzip",
      Encoding::Lz4Max64Kb => "lz4-64k",
      Encoding::Lz4Max256Kb => "lz4-256k",
      Encoding::Lz4Max1Mb => "lz4-1M",
      Encoding::Lz4 => "lz4",
      Encoding::Snappy => "snappy",
      Encoding::Zstd => "zstd",
    }
  }

  /// Stable on-disk tag stored in every page header.
  pub(crate) fn tag(&self) -> u8 {
    match self {
      Encoding::None => 0x00,
      Encoding::Gzip => 0x01,
      Encoding::Lz4Max64Kb => 0x02,
      Encoding::Lz4Max256Kb => 0x03,
      Encoding::Lz4Max1Mb => 0x04,
      Encoding::Lz4 => 0x05,
      Encoding::Snappy => 0x06,
      Encoding::Zstd => 0x07,
    }
  }
}

impl TryFrom<u8> for Encoding {
  type Error = Error;
  fn try_from(v: u8) -> Result<Self> {
    Encoding::ALL
      .into_iter()
      .find(|e| e.tag() == v)
      .ok_or_else(|| Error::Corruption(format!("Unknown page encoding: {}", v)))
  }
}

impl fmt::Display for Encoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Encoding {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Encoding::ALL
      .into_iter()
      .find(|e| e.as_str() == s)
      .ok_or_else(|| Error::Config(format!("Unsupported encoding: {}", s)))
  }
}

#[derive(Debug, Clone)]
pub struct WalOptions {
  /// Directory holding the block files. A `completed` subdirectory
  /// beneath it is reserved for the compaction hand-off and purged on start.
  pub root_path: PathBuf,

  /// Encoding used for blocks created by `Wal::new_block`.
  /// Default: Snappy.
  pub encoding: Encoding,

  /// Tolerance around "now" within which caller supplied start/end
  /// times are trusted as-is.
  /// Default: 2 minutes.
  pub ingestion_slack: Duration,

  // --- Resources ---
  /// Initial capacity of the buffer each page is assembled in before it
  /// is written. Larger pages grow it.
  /// Default: 64 KB.
  pub write_buffer_size: usize,

  /// Size of the buffer used for replaying block files.
  /// Default: 128 KB.
  pub read_buffer_size: usize,

  // --- Behavior ---
  pub sync_mode: SyncMode,
}

impl Default for WalOptions {
  fn default() -> Self {
    Self {
      root_path: PathBuf::from("./wal_data"),
      encoding: Encoding::Snappy,
      ingestion_slack: Duration::from_secs(2 * 60),
      write_buffer_size: 64 * 1024, // 64 KB
      read_buffer_size: 128 * 1024, // 128 KB
      sync_mode: SyncMode::Async,
    }
  }
}

impl WalOptions {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      root_path: path.into(),
      ..Default::default()
    }
  }
}
