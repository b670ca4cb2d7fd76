use crate::config::Encoding;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Cursor, Read, Write};

pub const PAGE_MAGIC: u32 = 0x4C415754; // "TWAL"

/// The exact binary layout of a Page Header on disk (20 bytes).
///
/// [Magic: 4]
/// [CRC32: 4]
/// [Encoding: 1]
/// [Reserved: 3]
/// [Disk Size: 4]
/// [Uncompressed Size: 4]
///
/// The header is followed by `disk_size` bytes of compressed object data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
  pub crc: u32,
  pub encoding: Encoding,
  pub disk_size: u32,
  pub uncompressed_size: u32,
}

impl PageHeader {
  pub const SIZE: usize = 4 + 4 + 1 + 3 + 4 + 4; // 20 bytes

  pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(PAGE_MAGIC)?;
    writer.write_u32::<LittleEndian>(self.crc)?;
    writer.write_u8(self.encoding.tag())?;
    writer.write_all(&[0u8; 3])?; // Padding
    writer.write_u32::<LittleEndian>(self.disk_size)?;
    writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
    Ok(())
  }

  pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != PAGE_MAGIC {
      return Err(Error::Corruption(format!("Invalid Page Magic: {:#x}", magic)));
    }

    let crc = reader.read_u32::<LittleEndian>()?;
    let encoding = Encoding::try_from(reader.read_u8()?)?;

    let mut pad = [0u8; 3];
    reader.read_exact(&mut pad)?;

    let disk_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;

    Ok(Self {
      crc,
      encoding,
      disk_size,
      uncompressed_size,
    })
  }

  /// Full length of the page on disk, header included.
  pub fn page_len(&self) -> u64 {
    Self::SIZE as u64 + self.disk_size as u64
  }
}

/// Serializes one identified object into the uncompressed page body.
/// Format: [Id Len: 4][Id: N][Object: rest]
pub fn encode_object(id: &[u8], object: &[u8]) -> Result<Vec<u8>> {
  let id_len = checked_len(id.len(), "Object id")?;
  let mut buffer = Vec::with_capacity(4 + id.len() + object.len());
  buffer.write_u32::<LittleEndian>(id_len)?;
  buffer.write_all(id)?;
  buffer.write_all(object)?;
  Ok(buffer)
}

/// Every size on disk is a u32; anything larger cannot be framed.
pub fn checked_len(len: usize, what: &str) -> Result<u32> {
  u32::try_from(len).map_err(|_| Error::Config(format!("{} of {} bytes exceeds the 4 GiB page limit", what, len)))
}

/// Splits an uncompressed page body back into `(id, object)`.
pub fn decode_object(buffer: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
  let mut cursor = Cursor::new(buffer);
  let id_len = cursor.read_u32::<LittleEndian>()? as usize;

  let body = &buffer[4..];
  if id_len > body.len() {
    return Err(Error::Corruption(format!(
      "Object id length {} exceeds page body of {} bytes",
      id_len,
      body.len()
    )));
  }

  let (id, object) = body.split_at(id_len);
  Ok((id.to_vec(), object.to_vec()))
}

/// Calculates CRC32 for the page content (excluding the Magic and CRC field itself).
pub fn calculate_checksum(encoding: Encoding, uncompressed_size: u32, payload: &[u8]) -> u32 {
  let mut hasher = Hasher::new();
  hasher.update(&[encoding.tag()]);
  hasher.update(&(payload.len() as u32).to_le_bytes());
  hasher.update(&uncompressed_size.to_le_bytes());
  hasher.update(payload);
  hasher.finalize()
}
