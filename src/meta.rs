use uuid::Uuid;

use crate::config::Encoding;

/// Bookkeeping for one block. Lives only in memory: on rescan it is rebuilt
/// from the filename and the caller supplied time range, never from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
  pub block_id: Uuid,
  pub tenant: String,
  pub encoding: Encoding,
  pub data_encoding: String,
  /// Unix seconds. `None` until the first object is added.
  pub start_time: Option<u32>,
  /// Unix seconds. `None` until the first object is added.
  pub end_time: Option<u32>,
  /// Bytes written to the block file.
  pub size: u64,
  pub total_objects: u64,
}

impl BlockMeta {
  pub fn new(block_id: Uuid, tenant: impl Into<String>, encoding: Encoding, data_encoding: impl Into<String>) -> Self {
    Self {
      block_id,
      tenant: tenant.into(),
      encoding,
      data_encoding: data_encoding.into(),
      start_time: None,
      end_time: None,
      size: 0,
      total_objects: 0,
    }
  }

  /// Widens the time range to cover `[start, end]`.
  pub fn extend_range(&mut self, start: u32, end: u32) {
    self.start_time = Some(self.start_time.map_or(start, |s| s.min(start)));
    self.end_time = Some(self.end_time.map_or(end, |e| e.max(end)));
  }

  pub fn object_added(&mut self, start: u32, end: u32, page_len: u64) {
    self.extend_range(start, end);
    self.size += page_len;
    self.total_objects += 1;
  }
}
