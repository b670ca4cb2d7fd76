mod common;
use common::{Joiner, LongestOfTwo, TENANT, TestEnv, random_ids};
use tracewal::{Encoding, Error, WalOptions, parse_filename};
use uuid::Uuid;

#[test]
fn test_append_and_find() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();

  let ids = random_ids(100);
  let objs: Vec<Vec<u8>> = (0..100).map(|i| format!("trace_{}", i).into_bytes()).collect();

  for (id, obj) in ids.iter().zip(&objs) {
    block.append(id, obj, 0, 0).unwrap();
  }

  assert_eq!(block.length(), 100);
  assert_eq!(block.meta().total_objects, 100);

  for (id, obj) in ids.iter().zip(&objs) {
    let found = block.find(id, &LongestOfTwo).unwrap();
    assert_eq!(found.as_ref(), Some(obj));
  }
}

#[test]
fn test_find_missing_is_none() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();

  assert_eq!(block.find(b"nothing", &LongestOfTwo).unwrap(), None);

  block.append(b"present", b"data", 0, 0).unwrap();
  assert_eq!(block.find(b"absent", &LongestOfTwo).unwrap(), None);
}

#[test]
fn test_new_block_filename() {
  let mut opts = WalOptions::default();
  opts.encoding = Encoding::Zstd;
  let env = TestEnv::new(opts);

  let id = Uuid::new_v4();
  let block = env.wal.new_block(id, TENANT, "v2").unwrap();

  let path = block.full_filename();
  assert!(path.exists());
  assert_eq!(path.parent().unwrap(), env.root.as_path());

  let desc = parse_filename(path.file_name().unwrap().to_str().unwrap()).unwrap();
  assert_eq!(desc.block_id, id);
  assert_eq!(desc.tenant, TENANT);
  assert_eq!(desc.encoding, Encoding::Zstd);
  assert_eq!(desc.data_encoding, "v2");
  assert_eq!(block.descriptor(), &desc);
  assert_eq!(block.block_id(), id);
  assert_eq!(block.data_length(), 0);
}

#[test]
fn test_new_block_rejects_empty_tenant() {
  let env = TestEnv::with_default();
  assert!(matches!(env.wal.new_block(Uuid::new_v4(), "", ""), Err(Error::Config(_))));
}

#[test]
fn test_new_block_rejects_fields_that_break_the_filename() {
  let env = TestEnv::with_default();

  for (tenant, data_encoding) in [("team:a", ""), ("team/a", ""), (TENANT, "v2:proto"), (TENANT, "../v2")] {
    let result = env.wal.new_block(Uuid::new_v4(), tenant, data_encoding);
    assert!(
      matches!(result, Err(Error::Config(_))),
      "expected ({:?}, {:?}) to be rejected",
      tenant,
      data_encoding
    );
  }

  // Nothing was created, inside or outside the root
  assert_eq!(std::fs::read_dir(&env.root).unwrap().count(), 0);
  assert!(!env.root.parent().unwrap().join("v2").exists());

  // A block that was accepted always comes back from a rescan
  let block = env.wal.new_block(Uuid::new_v4(), "team-a.b_c", "v2.proto").unwrap();
  block.append(b"id", b"payload", 0, 0).unwrap();
  drop(block);

  let blocks = env.rescan();
  assert_eq!(blocks.len(), 1);
  assert_eq!(blocks[0].descriptor().tenant, "team-a.b_c");
  assert_eq!(blocks[0].descriptor().data_encoding, "v2.proto");
  assert_eq!(blocks[0].find(b"id", &LongestOfTwo).unwrap(), Some(b"payload".to_vec()));
}

#[test]
fn test_duplicates_are_combined() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();

  block.append(b"dup", b"short", 0, 0).unwrap();
  block.append(b"other", b"x", 0, 0).unwrap();
  block.append(b"dup", b"much longer", 0, 0).unwrap();

  // Every append stays on disk as its own record
  assert_eq!(block.length(), 3);

  let found = block.find(b"dup", &LongestOfTwo).unwrap();
  assert_eq!(found, Some(b"much longer".to_vec()));

  let joiner = Joiner::default();
  assert_eq!(block.find(b"dup", &joiner).unwrap(), Some(b"short|much longer".to_vec()));
  assert_eq!(joiner.calls.get(), 1);

  // Singletons never reach the combiner
  assert_eq!(block.find(b"other", &joiner).unwrap(), Some(b"x".to_vec()));
  assert_eq!(joiner.calls.get(), 1);
}

#[test]
fn test_unreconcilable_duplicates_error() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();

  for obj in [&b"a"[..], &b"bb"[..], &b"ccc"[..]] {
    block.append(b"triple", obj, 0, 0).unwrap();
  }

  let err = block.find(b"triple", &LongestOfTwo).unwrap_err();
  assert!(matches!(err, Error::Combine { count: 3, .. }), "unexpected error: {}", err);
}

#[test]
fn test_records_track_file_layout() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();

  for i in 0..5u8 {
    block.append(&[i], &vec![i; 64], 0, 0).unwrap();
  }

  let records = block.records();
  assert_eq!(records.len(), 5);
  assert_eq!(records[0].start, 0);
  for pair in records.windows(2) {
    assert_eq!(pair[1].start, pair[0].start + pair[0].length as u64);
  }

  let last = records.last().unwrap();
  let end = last.start + last.length as u64;
  assert_eq!(block.data_length(), end);
  assert_eq!(block.meta().size, end);
  assert_eq!(std::fs::metadata(block.full_filename()).unwrap().len(), end);
}

#[test]
fn test_clear_removes_file() {
  let env = TestEnv::with_default();
  let block = env.wal.new_block(Uuid::new_v4(), TENANT, "").unwrap();
  block.append(b"id", b"obj", 0, 0).unwrap();
  block.find(b"id", &LongestOfTwo).unwrap();

  let path = block.full_filename().to_path_buf();
  assert!(path.exists());

  block.clear().unwrap();
  assert!(!path.exists());
}
