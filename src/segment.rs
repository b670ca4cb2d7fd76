use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::Codec;
use crate::config::{Encoding, SyncMode, WalOptions};
use crate::error::{Error, Result};
use crate::frame::{PageHeader, calculate_checksum, checked_len, decode_object, encode_object};
use crate::index::Record;

/// Destination of committed pages. `File` in production.
pub trait PageSink: Write {
  /// Cuts the destination back to `len` bytes.
  fn truncate(&mut self, len: u64) -> io::Result<()>;

  /// Waits until written bytes are on the physical disk.
  fn sync(&mut self) -> io::Result<()>;
}

impl PageSink for File {
  fn truncate(&mut self, len: u64) -> io::Result<()> {
    self.set_len(len)
  }

  fn sync(&mut self) -> io::Result<()> {
    self.sync_data()
  }
}

/// Owns the write handle of one block file.
/// Every object becomes one independently compressed page, written with a
/// single call. A failed write is cut back off the file so offsets stay exact.
pub struct PageWriter<S: PageSink = File> {
  sink: S,
  encoding: Encoding,
  codec: Box<dyn Codec>,
  sync_mode: SyncMode,
  /// Scratch space for the page being written.
  page: Vec<u8>,
  current_size: u64,
  /// Set when a rollback itself failed; the file end is unknown.
  poisoned: bool,
}

impl PageWriter<File> {
  /// Opens `path` for appending, creating it if needed.
  pub fn create(path: PathBuf, encoding: Encoding, options: &WalOptions) -> Result<Self> {
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let current_size = file.metadata()?.len();
    Ok(Self::with_sink(file, current_size, encoding, options))
  }

  /// Reopens a replayed block file for appending, cutting off anything
  /// past `valid_end` so new pages never land behind a damaged tail.
  pub fn reopen(path: PathBuf, encoding: Encoding, valid_end: u64, options: &WalOptions) -> Result<Self> {
    let mut writer = Self::create(path, encoding, options)?;
    if writer.current_size != valid_end {
      writer.sink.truncate(valid_end)?;
      writer.current_size = valid_end;
    }
    Ok(writer)
  }
}

impl<S: PageSink> PageWriter<S> {
  /// `current_size` is where the next page starts in `sink`.
  pub fn with_sink(sink: S, current_size: u64, encoding: Encoding, options: &WalOptions) -> Self {
    Self {
      sink,
      encoding,
      codec: encoding.codec(),
      sync_mode: options.sync_mode,
      page: Vec::with_capacity(options.write_buffer_size),
      current_size,
      poisoned: false,
    }
  }

  /// Compresses and writes a single object, returning its record.
  /// The page has reached the OS (and the disk under `SyncMode::Strict`)
  /// when this returns `Ok`. On error nothing of the page remains.
  pub fn append(&mut self, id: &[u8], object: &[u8]) -> Result<Record> {
    if self.poisoned {
      return Err(Error::Corruption("Block writer is unusable after a failed rollback".into()));
    }

    // 1. Serialize id + object into the page body
    let raw = encode_object(id, object)?;
    let uncompressed_size = checked_len(raw.len(), "Object")?;

    // 2. Compress
    let payload = self.codec.compress(&raw)?;
    let disk_size = checked_len(payload.len(), "Compressed object")?;

    // 3. Prepare Header
    let header = PageHeader {
      crc: calculate_checksum(self.encoding, uncompressed_size, &payload),
      encoding: self.encoding,
      disk_size,
      uncompressed_size,
    };
    let length = checked_len(header.page_len() as usize, "Page")?;

    // 4. Assemble Header + Payload and commit them in one write
    self.page.clear();
    header.write(&mut self.page)?;
    self.page.extend_from_slice(&payload);

    if let Err(e) = self.commit() {
      self.rollback();
      return Err(e.into());
    }

    let record = Record {
      id: id.to_vec(),
      start: self.current_size,
      length,
    };
    self.current_size += header.page_len();

    Ok(record)
  }

  fn commit(&mut self) -> io::Result<()> {
    self.sink.write_all(&self.page)?;
    self.sink.flush()?;
    if self.sync_mode == SyncMode::Strict {
      self.sink.sync()?;
    }
    Ok(())
  }

  // Drops whatever part of the page made it out
  fn rollback(&mut self) {
    if let Err(e) = self.sink.truncate(self.current_size) {
      warn!(target: "tracewal", error = %e, size = self.current_size, "Failed to roll back partial page");
      self.poisoned = true;
    }
  }

  pub fn size(&self) -> u64 {
    self.current_size
  }
}

/// Outcome of replaying a block file from the start.
#[derive(Debug)]
pub struct Replay {
  pub records: Vec<Record>,
  /// Offset just past the last page that decoded cleanly.
  pub valid_end: u64,
  /// Why replay stopped before the end of the file, if it did.
  pub warning: Option<Error>,
}

/// Reads pages of one block file.
pub struct PageReader {
  reader: BufReader<File>,
  encoding: Encoding,
  codec: Box<dyn Codec>,
}

impl PageReader {
  pub fn open(path: &Path, encoding: Encoding, buffer_size: usize) -> Result<Self> {
    let file = File::open(path)?;
    Ok(Self {
      reader: BufReader::with_capacity(buffer_size, file),
      encoding,
      codec: encoding.codec(),
    })
  }

  /// Reads, validates, and decompresses the page a record points at.
  pub fn read_at(&mut self, record: &Record) -> Result<(Vec<u8>, Vec<u8>)> {
    self.reader.seek(SeekFrom::Start(record.start))?;
    let (header, id, object) = self.next_page(record.start, None)?;

    if header.page_len() != record.length as u64 {
      return Err(Error::Corruption(format!(
        "Page at offset {} is {} bytes, index says {}",
        record.start,
        header.page_len(),
        record.length
      )));
    }
    if id != record.id {
      return Err(Error::Corruption(format!(
        "Page at offset {} holds a different id than indexed",
        record.start
      )));
    }

    Ok((id, object))
  }

  /// Decodes pages from offset 0 until the end of the file or the first
  /// page that fails to decode. A damaged tail ends the replay but is not
  /// an error: everything decoded before it is kept.
  pub fn replay(&mut self) -> Result<Replay> {
    let file_len = self.reader.get_ref().metadata()?.len();
    self.reader.seek(SeekFrom::Start(0))?;

    let mut records = Vec::new();
    let mut offset = 0u64;
    let mut warning = None;

    loop {
      // Clean EOF exactly at a page boundary
      if self.reader.fill_buf()?.is_empty() {
        break;
      }

      match self.next_page(offset, Some(file_len)) {
        Ok((header, id, _)) => {
          records.push(Record {
            id,
            start: offset,
            length: header.page_len() as u32,
          });
          offset += header.page_len();
        }
        Err(e) => {
          warning = Some(e);
          break;
        }
      }
    }

    Ok(Replay {
      records,
      valid_end: offset,
      warning,
    })
  }

  /// Reads one page at the current cursor, which must sit at `offset`.
  fn next_page(&mut self, offset: u64, file_len: Option<u64>) -> Result<(PageHeader, Vec<u8>, Vec<u8>)> {
    let header = PageHeader::read(&mut self.reader)?;

    if header.encoding != self.encoding {
      return Err(Error::Corruption(format!(
        "Page at offset {} is {}, block is {}",
        offset, header.encoding, self.encoding
      )));
    }

    // Never trust a header-supplied size past the physical end of file
    if let Some(len) = file_len {
      if offset + header.page_len() > len {
        return Err(Error::Corruption(format!("Page at offset {} truncated", offset)));
      }
    }

    let mut payload = vec![0u8; header.disk_size as usize];
    self.reader.read_exact(&mut payload)?;

    let calc_crc = calculate_checksum(header.encoding, header.uncompressed_size, &payload);
    if calc_crc != header.crc {
      return Err(Error::CrcMismatch {
        expected: header.crc,
        actual: calc_crc,
        offset,
      });
    }

    let raw = self.codec.decompress(&payload)?;
    if raw.len() != header.uncompressed_size as usize {
      return Err(Error::Corruption(format!(
        "Page at offset {} decompressed to {} bytes, expected {}",
        offset,
        raw.len(),
        header.uncompressed_size
      )));
    }

    let (id, object) = decode_object(&raw)?;
    Ok((header, id, object))
  }
}
