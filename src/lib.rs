//! # TraceWal
//!
//! `tracewal` is the write-ahead log of a trace-storage backend: crash
//! tolerant local staging for trace objects before they are compacted and
//! shipped to long-term storage.
//!
//! ## Key Features
//!
//! * **Self-describing blocks**: block id, tenant, version and encoding live in the filename.
//! * **Independent pages**: every object is its own compressed, checksummed page.
//! * **Tail tolerance**: replay keeps everything before the first damaged page.
//! * **Duplicate merging**: repeated ids are reconciled by a caller supplied `Combiner`.
//!
//! ## Example
//!
//! ```no_run
//! use tracewal::{Combiner, Wal, WalOptions};
//! use uuid::Uuid;
//!
//! struct KeepLast;
//!
//! impl Combiner for KeepLast {
//!   fn combine(&self, _: &str, objs: &[&[u8]]) -> tracewal::Result<Option<Vec<u8>>> {
//!     Ok(objs.last().map(|o| o.to_vec()))
//!   }
//! }
//!
//! # fn main() -> tracewal::Result<()> {
//! let wal = Wal::new(WalOptions::new("/var/wal"))?;
//! let block = wal.new_block(Uuid::new_v4(), "tenant-1", "")?;
//!
//! block.append(b"trace-id", b"trace bytes", 0, 0)?;
//! let found = block.find(b"trace-id", &KeepLast)?;
//!
//! // After a restart
//! let blocks = wal.rescan_blocks(|_, _| Ok::<_, String>((0, 0)), std::time::Duration::ZERO)?;
//! # Ok(())
//! # }
//! ```

mod block;
mod codec;
mod combiner;
mod config;
mod error;
mod filename;
mod frame;
mod index;
mod iter;
mod meta;
mod segment;
mod wal;

// Re-exports for the flat public API
pub use block::AppendBlock;
pub use codec::Codec;
pub use combiner::Combiner;
pub use config::{Encoding, SyncMode, WalOptions};
pub use error::{Error, Result};
pub use filename::{BlockDescriptor, VERSION, parse_filename};
pub use index::Record;
pub use iter::{BlockIterator, StopHandle};
pub use meta::BlockMeta;
pub use wal::{COMPLETED_DIR, Wal};
