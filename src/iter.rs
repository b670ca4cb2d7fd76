use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::combiner::{Combiner, combine_group};
use crate::error::{Error, Result};
use crate::index::Record;
use crate::segment::PageReader;

/// Requests that a running `BlockIterator` stop before its next object.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
  stopped: Arc<AtomicBool>,
}

impl StopHandle {
  pub fn stop(&self) {
    self.stopped.store(true, Ordering::Release);
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped.load(Ordering::Acquire)
  }
}

/// Yields every distinct id of a block exactly once, as `(id, object)`.
///
/// Records are grouped by id up front; pages are only read as the iterator
/// advances. Groups with more than one record are merged by the combiner.
/// The iterator is one-shot and holds its own file handle until it is
/// exhausted, closed, or dropped.
pub struct BlockIterator<C> {
  reader: Option<PageReader>,
  groups: VecDeque<Vec<Record>>,
  combiner: C,
  data_encoding: String,
  stop: StopHandle,
}

impl<C: Combiner> BlockIterator<C> {
  pub(crate) fn new(reader: PageReader, groups: Vec<Vec<Record>>, combiner: C, data_encoding: String) -> Self {
    Self {
      reader: Some(reader),
      groups: groups.into(),
      combiner,
      data_encoding,
      stop: StopHandle::default(),
    }
  }

  /// A handle other threads can use to end this iteration early.
  pub fn stop_handle(&self) -> StopHandle {
    self.stop.clone()
  }

  /// Releases the file handle. Further calls to `next` return `None`.
  pub fn close(&mut self) {
    self.reader = None;
    self.groups.clear();
  }

  /// Number of ids not yet yielded.
  pub fn remaining(&self) -> usize {
    self.groups.len()
  }

  fn next_object(&mut self, reader: &mut PageReader, group: Vec<Record>) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut objects = Vec::with_capacity(group.len());
    for record in &group {
      let (_, object) = reader.read_at(record)?;
      objects.push(object);
    }

    let id = group.into_iter().next().map(|r| r.id).unwrap_or_default();
    let merged = combine_group(&self.combiner, &self.data_encoding, &id, objects)?;
    Ok((id, merged))
  }
}

impl<C: Combiner> Iterator for BlockIterator<C> {
  type Item = Result<(Vec<u8>, Vec<u8>)>;

  fn next(&mut self) -> Option<Self::Item> {
    let mut reader = self.reader.take()?;

    if self.stop.is_stopped() {
      self.groups.clear();
      return Some(Err(Error::Cancelled));
    }

    let Some(group) = self.groups.pop_front() else {
      // Exhausted: reader is dropped here
      return None;
    };

    let item = self.next_object(&mut reader, group);
    self.reader = Some(reader);
    Some(item)
  }
}
