use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::combiner::{Combiner, combine_group};
use crate::config::WalOptions;
use crate::error::Result;
use crate::filename::BlockDescriptor;
use crate::index::{Record, RecordIndex};
use crate::iter::BlockIterator;
use crate::meta::BlockMeta;
use crate::segment::{PageReader, PageWriter, Replay};

/// A block file open for appends, together with its record index.
///
/// Appends are serialized by an internal lock; lookups and iterators read
/// through their own handles and may run alongside the writer.
pub struct AppendBlock {
  descriptor: BlockDescriptor,
  path: PathBuf,
  options: WalOptions,
  writer: Mutex<PageWriter>,
  index: RecordIndex,
  meta: Mutex<BlockMeta>,
  /// Lazily opened read handle used by `find`.
  reader: Mutex<Option<PageReader>>,
}

impl AppendBlock {
  /// Creates a fresh, empty block file under `root`.
  pub(crate) fn create(descriptor: BlockDescriptor, root: &Path, options: &WalOptions) -> Result<Self> {
    let path = root.join(descriptor.filename());
    let writer = PageWriter::create(path.clone(), descriptor.encoding, options)?;
    let meta = BlockMeta::new(
      descriptor.block_id,
      descriptor.tenant.clone(),
      descriptor.encoding,
      descriptor.data_encoding.clone(),
    );

    Ok(Self {
      descriptor,
      path,
      options: options.clone(),
      writer: Mutex::new(writer),
      index: RecordIndex::new(),
      meta: Mutex::new(meta),
      reader: Mutex::new(None),
    })
  }

  /// Rebuilds a block from a replayed file. The time range is left unset.
  pub(crate) fn from_replay(descriptor: BlockDescriptor, path: PathBuf, replay: Replay, options: &WalOptions) -> Result<Self> {
    let writer = PageWriter::reopen(path.clone(), descriptor.encoding, replay.valid_end, options)?;

    let mut meta = BlockMeta::new(
      descriptor.block_id,
      descriptor.tenant.clone(),
      descriptor.encoding,
      descriptor.data_encoding.clone(),
    );
    meta.size = replay.valid_end;
    meta.total_objects = replay.records.len() as u64;

    Ok(Self {
      descriptor,
      path,
      options: options.clone(),
      writer: Mutex::new(writer),
      index: RecordIndex::from_records(replay.records),
      meta: Mutex::new(meta),
      reader: Mutex::new(None),
    })
  }

  /// Appends one object. `start` and `end` are unix-second hints for the
  /// object's time range and are checked against the ingestion slack.
  pub fn append(&self, id: &[u8], object: &[u8], start: u32, end: u32) -> Result<()> {
    let record = {
      let mut writer = self.writer.lock();
      let record = writer.append(id, object)?;

      // Pushed under the writer lock so index order matches file order
      self.index.push(record.clone());
      record
    };

    let (start, end) = self.adjust_time_range_for_slack(start, end, Duration::ZERO);
    self.meta.lock().object_added(start, end, record.length as u64);
    Ok(())
  }

  /// Looks up every object stored under `id` and merges duplicates with
  /// `combiner`. Returns `Ok(None)` when the id is not in this block.
  pub fn find<C: Combiner + ?Sized>(&self, id: &[u8], combiner: &C) -> Result<Option<Vec<u8>>> {
    let records = self.index.for_id(id);
    if records.is_empty() {
      return Ok(None);
    }

    let objects = self.with_reader(|reader| {
      records
        .iter()
        .map(|record| reader.read_at(record).map(|(_, object)| object))
        .collect::<Result<Vec<_>>>()
    })?;

    combine_group(combiner, &self.descriptor.data_encoding, id, objects).map(Some)
  }

  /// Returns an iterator over every distinct id in the block, duplicates merged.
  pub fn iter<C: Combiner>(&self, combiner: C) -> Result<BlockIterator<C>> {
    let reader = PageReader::open(&self.path, self.descriptor.encoding, self.options.read_buffer_size)?;
    Ok(BlockIterator::new(
      reader,
      self.index.grouped(),
      combiner,
      self.descriptor.data_encoding.clone(),
    ))
  }

  /// Deletes the block file. Called once the block has been handed off.
  pub fn clear(self) -> Result<()> {
    let Self { path, writer, reader, .. } = self;
    drop(reader);
    drop(writer);

    match fs::remove_file(&path) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
      _ => Ok(()),
    }
  }

  /// Clamps caller supplied times to the ingestion slack window around now.
  /// A start older than the window or an end beyond it is replaced with now.
  pub fn adjust_time_range_for_slack(&self, start: u32, end: u32, additional_start_slack: Duration) -> (u32, u32) {
    let (adj_start, adj_end) =
      adjust_for_slack(unix_now(), self.options.ingestion_slack, additional_start_slack, start, end);

    if adj_start != start || adj_end != end {
      warn!(
        target: "tracewal",
        tenant = %self.descriptor.tenant,
        block = %self.descriptor.block_id,
        start, end, "Time range outside ingestion slack, reset to now"
      );
    }
    (adj_start, adj_end)
  }

  pub(crate) fn set_time_range(&self, start: u32, end: u32) {
    let mut meta = self.meta.lock();
    meta.start_time = Some(start);
    meta.end_time = Some(end);
  }

  fn with_reader<T>(&self, f: impl FnOnce(&mut PageReader) -> Result<T>) -> Result<T> {
    let mut slot = self.reader.lock();
    let mut reader = match slot.take() {
      Some(reader) => reader,
      None => PageReader::open(&self.path, self.descriptor.encoding, self.options.read_buffer_size)?,
    };
    let result = f(&mut reader);
    *slot = Some(reader);
    result
  }

  pub fn block_id(&self) -> Uuid {
    self.descriptor.block_id
  }

  pub fn descriptor(&self) -> &BlockDescriptor {
    &self.descriptor
  }

  pub fn meta(&self) -> BlockMeta {
    self.meta.lock().clone()
  }

  /// Number of records, duplicates included.
  pub fn length(&self) -> usize {
    self.index.len()
  }

  /// Bytes written to the block file.
  pub fn data_length(&self) -> u64 {
    self.writer.lock().size()
  }

  pub fn records(&self) -> Vec<Record> {
    self.index.snapshot()
  }

  pub fn full_filename(&self) -> &Path {
    &self.path
  }
}

fn unix_now() -> u32 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as u32)
    .unwrap_or(0)
}

/// Window is `[now - slack - additional_start_slack, now + slack]`.
pub(crate) fn adjust_for_slack(
  now: u32,
  slack: Duration,
  additional_start_slack: Duration,
  start: u32,
  end: u32,
) -> (u32, u32) {
  let lower = (now as u64).saturating_sub(slack.as_secs() + additional_start_slack.as_secs());
  let upper = now as u64 + slack.as_secs();

  let start = if (start as u64) < lower { now } else { start };
  let end = if (end as u64) > upper { now } else { end };
  (start, end)
}

#[cfg(test)]
mod tests {
  use super::*;

  const NOW: u32 = 1_700_000_000;
  const SLACK: Duration = Duration::from_secs(120);
  const HOUR: u32 = 3600;

  #[test]
  fn test_in_range_hints_pass_through() {
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW, NOW), (NOW, NOW));
    assert_eq!(
      adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW - 120, NOW + 120),
      (NOW - 120, NOW + 120)
    );
  }

  #[test]
  fn test_old_start_resets_to_now() {
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW - HOUR, NOW), (NOW, NOW));
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW - 121, NOW), (NOW, NOW));
  }

  #[test]
  fn test_future_end_resets_to_now() {
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW, NOW + HOUR), (NOW, NOW));
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, NOW, NOW + 121), (NOW, NOW));
  }

  #[test]
  fn test_additional_start_slack_widens_lower_bound_only() {
    let hour = Duration::from_secs(HOUR as u64);
    assert_eq!(adjust_for_slack(NOW, SLACK, hour, NOW - HOUR, NOW), (NOW - HOUR, NOW));
    assert_eq!(adjust_for_slack(NOW, SLACK, hour, NOW, NOW + HOUR), (NOW, NOW));
  }

  #[test]
  fn test_zero_hints() {
    // An unset start looks impossibly old, an unset end is never in the future.
    assert_eq!(adjust_for_slack(NOW, SLACK, Duration::ZERO, 0, 0), (NOW, 0));
  }
}
