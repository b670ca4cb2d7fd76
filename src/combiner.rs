use crate::error::{Error, Result};

/// Reconciles several objects stored under the same id.
///
/// Only called with two or more objects, in the order they were appended.
/// `Ok(None)` means the objects cannot be reconciled.
pub trait Combiner {
  fn combine(&self, data_encoding: &str, objects: &[&[u8]]) -> Result<Option<Vec<u8>>>;
}

impl<C: Combiner + ?Sized> Combiner for &C {
  fn combine(&self, data_encoding: &str, objects: &[&[u8]]) -> Result<Option<Vec<u8>>> {
    (**self).combine(data_encoding, objects)
  }
}

/// Folds one id group into a single object. Singletons bypass the combiner.
pub(crate) fn combine_group<C: Combiner + ?Sized>(
  combiner: &C,
  data_encoding: &str,
  id: &[u8],
  mut objects: Vec<Vec<u8>>,
) -> Result<Vec<u8>> {
  match objects.len() {
    0 => Err(Error::Corruption(format!("No objects for id {}", hex(id)))),
    1 => Ok(objects.swap_remove(0)),
    count => {
      let refs: Vec<&[u8]> = objects.iter().map(|o| o.as_slice()).collect();
      combiner
        .combine(data_encoding, &refs)?
        .ok_or_else(|| Error::Combine { id: hex(id), count })
    }
  }
}

pub(crate) fn hex(id: &[u8]) -> String {
  id.iter().map(|b| format!("{:02x}", b)).collect()
}
