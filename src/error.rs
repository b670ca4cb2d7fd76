use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O Error: {0}")]
  Io(#[from] io::Error),

  #[error("Data Corruption: {0}")]
  Corruption(String),

  #[error("CRC32 Checksum Mismatch: expected {expected:#x}, got {actual:#x} at offset {offset}")]
  CrcMismatch { expected: u32, actual: u32, offset: u64 },

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Invalid block filename {filename:?}: {reason}")]
  InvalidFilename { filename: String, reason: String },

  #[error("Unable to combine {count} objects for id {id}")]
  Combine { id: String, count: usize },

  #[error("Iteration cancelled")]
  Cancelled,
}

impl Error {
  pub(crate) fn invalid_filename(filename: &str, reason: impl Into<String>) -> Self {
    Error::InvalidFilename {
      filename: filename.to_string(),
      reason: reason.into(),
    }
  }
}
