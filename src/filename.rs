use std::path::is_separator;

use uuid::Uuid;

use crate::config::Encoding;
use crate::error::{Error, Result};

/// The only block format version this crate reads and writes.
pub const VERSION: &str = "v2";

/// Everything that identifies a block. Persisted solely as the block's filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
  pub block_id: Uuid,
  pub tenant: String,
  pub version: String,
  pub encoding: Encoding,
  pub data_encoding: String,
}

impl BlockDescriptor {
  /// Fails when a field would not survive the trip through a filename.
  pub fn new(
    block_id: Uuid,
    tenant: impl Into<String>,
    encoding: Encoding,
    data_encoding: impl Into<String>,
  ) -> Result<Self> {
    let tenant = tenant.into();
    let data_encoding = data_encoding.into();

    if tenant.is_empty() {
      return Err(Error::Config("Tenant cannot be empty".into()));
    }
    check_field("Tenant", &tenant)?;
    check_field("Data encoding", &data_encoding)?;

    Ok(Self {
      block_id,
      tenant,
      version: VERSION.to_string(),
      encoding,
      data_encoding,
    })
  }

  /// Format: `<uuid>:<tenant>:<version>:<encoding>[:<dataEncoding>]`.
  /// The data encoding field is omitted when empty.
  pub fn filename(&self) -> String {
    let mut name = format!("{}:{}:{}:{}", self.block_id, self.tenant, self.version, self.encoding);
    if !self.data_encoding.is_empty() {
      name.push(':');
      name.push_str(&self.data_encoding);
    }
    name
  }
}

// Fields are ':' separated and the name must stay inside the root directory
fn check_field(name: &str, value: &str) -> Result<()> {
  if value.contains(':') || value.chars().any(is_separator) {
    return Err(Error::Config(format!(
      "{} {:?} cannot contain ':' or a path separator",
      name, value
    )));
  }
  Ok(())
}

/// Parses a bare block filename back into its descriptor.
pub fn parse_filename(filename: &str) -> Result<BlockDescriptor> {
  if filename.chars().any(is_separator) {
    return Err(Error::invalid_filename(filename, "filename contains a path separator"));
  }

  let splits: Vec<&str> = filename.split(':').collect();
  if splits.len() != 4 && splits.len() != 5 {
    return Err(Error::invalid_filename(
      filename,
      format!("unexpected number of fields: {}", splits.len()),
    ));
  }

  let block_id = Uuid::parse_str(splits[0]).map_err(|e| Error::invalid_filename(filename, e.to_string()))?;

  let tenant = splits[1];
  if tenant.is_empty() {
    return Err(Error::invalid_filename(filename, "missing tenant"));
  }

  let version = splits[2];
  if version != VERSION {
    return Err(Error::invalid_filename(filename, format!("unexpected version {:?}", version)));
  }

  let encoding = splits[3]
    .parse::<Encoding>()
    .map_err(|_| Error::invalid_filename(filename, format!("unknown encoding {:?}", splits[3])))?;

  let data_encoding = splits.get(4).copied().unwrap_or_default();

  Ok(BlockDescriptor {
    block_id,
    tenant: tenant.to_string(),
    version: version.to_string(),
    encoding,
    data_encoding: data_encoding.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const ID: &str = "123e4567-e89b-12d3-a456-426614174000";

  fn id() -> Uuid {
    Uuid::parse_str(ID).unwrap()
  }

  #[test]
  fn test_parse_valid_filenames() {
    let cases = [
      (format!("{ID}:foo:v2:snappy:dataencoding"), Encoding::Snappy, "dataencoding"),
      (format!("{ID}:foo:v2:none:dataencoding"), Encoding::None, "dataencoding"),
      (format!("{ID}:foo:v2:snappy"), Encoding::Snappy, ""),
      (format!("{ID}:foo:v2:snappy:"), Encoding::Snappy, ""),
      (format!("{ID}:foo:v2:lz4-1M"), Encoding::Lz4Max1Mb, ""),
    ];

    for (name, encoding, data_encoding) in cases {
      let desc = parse_filename(&name).unwrap_or_else(|e| panic!("{}: {}", name, e));
      assert_eq!(desc.block_id, id());
      assert_eq!(desc.tenant, "foo");
      assert_eq!(desc.version, "v2");
      assert_eq!(desc.encoding, encoding, "{}", name);
      assert_eq!(desc.data_encoding, data_encoding, "{}", name);
    }
  }

  #[test]
  fn test_parse_invalid_filenames() {
    let cases = [
      format!("/blerg/{ID}:foo"),
      format!("/blerg/{ID}:foo:v2:snappy"),
      ID.to_string(),
      String::new(),
      "123e4:foo".to_string(),
      "123e4:foo:v2:snappy".to_string(),
      format!("{ID}:"),
      format!("{ID}::v2:none"),
      format!("{ID}:test::none"),
      format!("{ID}:test:test:test:test:test"),
      format!("{ID}:test:test"),
      format!("{ID}:test:v2:asdf"),
      format!("{ID}:test:v1:asdf"),
      format!("{ID}:foo"),
      format!("{ID}:foo:v1:snappy"),
    ];

    for name in cases {
      assert!(
        matches!(parse_filename(&name), Err(Error::InvalidFilename { .. })),
        "expected {:?} to be rejected",
        name
      );
    }
  }

  #[test]
  fn test_filename_round_trip() {
    let with_data = BlockDescriptor::new(id(), "tenant-1", Encoding::Zstd, "v2-trace").unwrap();
    assert_eq!(with_data.filename(), format!("{ID}:tenant-1:v2:zstd:v2-trace"));
    assert_eq!(parse_filename(&with_data.filename()).unwrap(), with_data);

    let without_data = BlockDescriptor::new(id(), "tenant-1", Encoding::Gzip, "").unwrap();
    assert_eq!(without_data.filename(), format!("{ID}:tenant-1:v2:gzip"));
    assert_eq!(parse_filename(&without_data.filename()).unwrap(), without_data);
  }

  #[test]
  fn test_descriptor_rejects_unencodable_fields() {
    let cases = [
      ("", ""),
      ("team:a", ""),
      ("team/a", ""),
      ("tenant", "v2:proto"),
      ("tenant", "../escape"),
      ("tenant", ":"),
    ];

    for (tenant, data_encoding) in cases {
      assert!(
        matches!(
          BlockDescriptor::new(id(), tenant, Encoding::Snappy, data_encoding),
          Err(Error::Config(_))
        ),
        "expected ({:?}, {:?}) to be rejected",
        tenant,
        data_encoding
      );
    }
  }
}
