use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::block::AppendBlock;
use crate::config::WalOptions;
use crate::error::{Error, Result};
use crate::filename::{BlockDescriptor, parse_filename};
use crate::segment::PageReader;

/// Staging directory of the compaction hand-off. Never replayed.
pub const COMPLETED_DIR: &str = "completed";

/// Owns the WAL directory: creates new blocks and recovers existing ones.
#[derive(Debug, Clone)]
pub struct Wal {
  options: WalOptions,
}

impl Wal {
  /// Prepares the root directory and purges the `completed` staging directory.
  pub fn new(options: WalOptions) -> Result<Self> {
    if options.root_path.as_os_str().is_empty() {
      return Err(Error::Config("WAL root path cannot be empty".into()));
    }

    fs::create_dir_all(&options.root_path)?;

    // Anything left here by an interrupted hand-off is unusable
    let completed = options.root_path.join(COMPLETED_DIR);
    match fs::remove_dir_all(&completed) {
      Ok(()) => info!(target: "tracewal", path = %completed.display(), "Removed completed staging directory"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }

    Ok(Self { options })
  }

  pub fn root_path(&self) -> &Path {
    &self.options.root_path
  }

  pub fn options(&self) -> &WalOptions {
    &self.options
  }

  /// Creates an empty block written with the configured encoding.
  /// The tenant must be non-empty, and neither it nor the data encoding may
  /// contain ':' or a path separator.
  pub fn new_block(&self, block_id: Uuid, tenant: &str, data_encoding: &str) -> Result<AppendBlock> {
    let descriptor = BlockDescriptor::new(block_id, tenant, self.options.encoding, data_encoding)?;
    AppendBlock::create(descriptor, &self.options.root_path, &self.options)
  }

  /// Replays every block file in the root directory.
  ///
  /// Files with unparseable names and files without a single readable
  /// record are deleted. Files that cannot be read because of an I/O error
  /// are skipped and left on disk. A damaged tail is cut off and the rest of
  /// the block is kept. `derive` is called once per recovered block with the
  /// id of its first record and the block's data encoding; the returned
  /// unix-second range is checked against the ingestion slack, widened at
  /// the start by `additional_start_slack`.
  pub fn rescan_blocks<F, E>(&self, mut derive: F, additional_start_slack: Duration) -> Result<Vec<AppendBlock>>
  where
    F: FnMut(&[u8], &str) -> std::result::Result<(u32, u32), E>,
    E: Display,
  {
    let mut blocks = Vec::new();

    for entry in fs::read_dir(&self.options.root_path)? {
      let entry = entry?;
      if entry.file_type()?.is_dir() {
        continue;
      }

      let filename = entry.file_name().to_string_lossy().to_string();
      let path = entry.path();
      let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
      let started = Instant::now();
      info!(target: "tracewal", file = %filename, size, "Beginning replay");

      match self.replay_block(&filename, path.clone(), &mut derive, additional_start_slack) {
        Ok(Some(block)) => {
          info!(
            target: "tracewal",
            file = %filename,
            records = block.length(),
            duration = ?started.elapsed(),
            "Replay complete"
          );
          blocks.push(block);
        }
        Ok(None) => {
          warn!(target: "tracewal", file = %filename, "Empty WAL file. Removing.");
          remove_block_file(&path);
        }
        // The file may be fine; it is left in place for the next rescan
        Err(Error::Io(e)) => {
          warn!(target: "tracewal", file = %filename, error = %e, "Unable to read block. Skipping.");
        }
        Err(e) => {
          warn!(target: "tracewal", file = %filename, error = %e, "Failed to replay block. Removing.");
          remove_block_file(&path);
        }
      }
    }

    Ok(blocks)
  }

  /// `Ok(None)` means the file holds no readable records.
  fn replay_block<F, E>(
    &self,
    filename: &str,
    path: PathBuf,
    derive: &mut F,
    additional_start_slack: Duration,
  ) -> Result<Option<AppendBlock>>
  where
    F: FnMut(&[u8], &str) -> std::result::Result<(u32, u32), E>,
    E: Display,
  {
    let descriptor = parse_filename(filename)?;

    let replay = PageReader::open(&path, descriptor.encoding, self.options.read_buffer_size)?.replay()?;
    if replay.records.is_empty() {
      return Ok(None);
    }

    if let Some(warning) = &replay.warning {
      warn!(
        target: "tracewal",
        file = %filename,
        records = replay.records.len(),
        warning = %warning,
        "Damaged tail while replaying block. Partial replay likely."
      );
    }

    let id_hint = replay.records[0].id.clone();
    let (start, end) = derive(&id_hint, &descriptor.data_encoding)
      .map_err(|e| Error::Corruption(format!("Unable to derive time range: {}", e)))?;

    let block = AppendBlock::from_replay(descriptor, path, replay, &self.options)?;
    let (start, end) = block.adjust_time_range_for_slack(start, end, additional_start_slack);
    block.set_time_range(start, end);

    Ok(Some(block))
  }
}

fn remove_block_file(path: &Path) {
  if let Err(e) = fs::remove_file(path) {
    warn!(target: "tracewal", path = %path.display(), error = %e, "Failed to remove block file");
  }
}
