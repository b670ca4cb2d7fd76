use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lz4_flex::frame::{BlockSize, FrameDecoder, FrameEncoder, FrameInfo};

use crate::config::Encoding;

/// A compression transform applied to each page payload independently.
pub trait Codec: Send + Sync {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>>;
  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

impl Encoding {
  /// Returns the codec that reads and writes pages of this encoding.
  pub fn codec(&self) -> Box<dyn Codec> {
    match self {
      Encoding::None => Box::new(NoneCodec),
      Encoding::Gzip => Box::new(GzipCodec),
      Encoding::Lz4Max64Kb => Box::new(Lz4Codec(BlockSize::Max64KB)),
      Encoding::Lz4Max256Kb => Box::new(Lz4Codec(BlockSize::Max256KB)),
      Encoding::Lz4Max1Mb => Box::new(Lz4Codec(BlockSize::Max1MB)),
      Encoding::Lz4 => Box::new(Lz4Codec(BlockSize::Max4MB)),
      Encoding::Snappy => Box::new(SnappyCodec),
      Encoding::Zstd => Box::new(ZstdCodec),
    }
  }
}

fn other(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, e)
}

struct NoneCodec;

impl Codec for NoneCodec {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
    Ok(raw.to_vec())
  }

  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
    Ok(data.to_vec())
  }
}

struct GzipCodec;

impl Codec for GzipCodec {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len()), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
  }

  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
  }
}

/// LZ4 frame format; the block size only affects the encoder's memory use.
struct Lz4Codec(BlockSize);

impl Codec for Lz4Codec {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
    let info = FrameInfo::new().block_size(self.0);
    let mut encoder = FrameEncoder::with_frame_info(info, Vec::new());
    encoder.write_all(raw)?;
    encoder.finish().map_err(other)
  }

  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = FrameDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
  }
}

struct SnappyCodec;

impl Codec for SnappyCodec {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
    snap::raw::Encoder::new().compress_vec(raw).map_err(other)
  }

  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
    snap::raw::Decoder::new().decompress_vec(data).map_err(other)
  }
}

struct ZstdCodec;

impl Codec for ZstdCodec {
  fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
    zstd::encode_all(raw, zstd::DEFAULT_COMPRESSION_LEVEL)
  }

  fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(data)
  }
}
