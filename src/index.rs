use parking_lot::RwLock;

/// Locates one stored object inside a block file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  pub id: Vec<u8>,
  /// Byte offset of the page header within the block file.
  pub start: u64,
  /// Length of the whole page on disk, header included.
  pub length: u32,
}

/// The in-memory record list of one block, in append order.
///
/// Appends take the write lock only long enough to push; readers work on
/// snapshots so a long lookup never blocks the writer.
#[derive(Debug, Default)]
pub struct RecordIndex {
  records: RwLock<Vec<Record>>,
}

impl RecordIndex {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_records(records: Vec<Record>) -> Self {
    Self {
      records: RwLock::new(records),
    }
  }

  pub fn push(&self, record: Record) {
    self.records.write().push(record);
  }

  pub fn len(&self) -> usize {
    self.records.read().len()
  }

  pub fn snapshot(&self) -> Vec<Record> {
    self.records.read().clone()
  }

  /// All records stored under `id`, in append order. Linear scan.
  pub fn for_id(&self, id: &[u8]) -> Vec<Record> {
    self.records.read().iter().filter(|r| r.id == id).cloned().collect()
  }

  /// Groups a snapshot of the index by id.
  /// Groups are ordered by id; records inside a group keep append order.
  pub fn grouped(&self) -> Vec<Vec<Record>> {
    group_by_id(self.snapshot())
  }
}

pub(crate) fn group_by_id(mut records: Vec<Record>) -> Vec<Vec<Record>> {
  // Stable sort keeps duplicates in append order.
  records.sort_by(|a, b| a.id.cmp(&b.id));

  let mut groups: Vec<Vec<Record>> = Vec::new();
  for record in records {
    match groups.last_mut() {
      Some(group) if group[0].id == record.id => group.push(record),
      _ => groups.push(vec![record]),
    }
  }
  groups
}
