#![allow(dead_code)]

use std::cell::Cell;
use std::time::Duration;

use tempfile::TempDir;
use tracewal::{AppendBlock, Combiner, Wal, WalOptions};

pub const TENANT: &str = "fake";

pub struct TestEnv {
  pub wal: Wal,
  // The TempDir guard must be kept alive to prevent premature deletion of the directory.
  pub _dir: TempDir,
  pub root: std::path::PathBuf,
}

impl TestEnv {
  pub fn new(mut options: WalOptions) -> Self {
    let dir = tempfile::tempdir().unwrap();
    options.root_path = dir.path().to_path_buf();
    let root = options.root_path.clone();

    let wal = Wal::new(options).unwrap();

    Self { wal, _dir: dir, root }
  }

  pub fn with_default() -> Self {
    Self::new(WalOptions::default())
  }

  /// Rescans with a deriver that reports an unknown time range.
  pub fn rescan(&self) -> Vec<AppendBlock> {
    self
      .wal
      .rescan_blocks(|_, _| Ok::<_, String>((0, 0)), Duration::ZERO)
      .unwrap()
  }
}

/// Keeps the longer of exactly two objects; refuses anything else.
pub struct LongestOfTwo;

impl Combiner for LongestOfTwo {
  fn combine(&self, _data_encoding: &str, objects: &[&[u8]]) -> tracewal::Result<Option<Vec<u8>>> {
    if objects.len() != 2 {
      return Ok(None);
    }
    if objects[0].len() > objects[1].len() {
      return Ok(Some(objects[0].to_vec()));
    }
    Ok(Some(objects[1].to_vec()))
  }
}

/// Joins objects with `|` and counts how often it was asked to.
#[derive(Default)]
pub struct Joiner {
  pub calls: Cell<usize>,
}

impl Combiner for Joiner {
  fn combine(&self, _data_encoding: &str, objects: &[&[u8]]) -> tracewal::Result<Option<Vec<u8>>> {
    self.calls.set(self.calls.get() + 1);
    Ok(Some(objects.join(&b'|')))
  }
}

/// Fresh random 16-byte ids, like trace ids.
pub fn random_ids(count: usize) -> Vec<Vec<u8>> {
  use rand::RngCore;
  let mut rng = rand::rng();
  (0..count)
    .map(|_| {
      let mut id = vec![0u8; 16];
      rng.fill_bytes(&mut id);
      id
    })
    .collect()
}

pub fn append_garbage(path: &std::path::Path) {
  use std::io::Write;
  let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
  file.write_all(&[0x01; 11]).unwrap();
}
