//! Minimal `.npy` (NumPy format v1.0) encoder
//!
//! Only what the recorder needs: C-order arrays of little-endian scalars and
//! the packed DVS event record. Files load with `numpy.load` unchanged.

use std::fs;
use std::path::Path;

use contracts::DvsEvent;

use crate::error::{RecorderError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Element type that can be stored in an `.npy` array
pub trait NpyElement {
    /// NumPy dtype descriptor, e.g. `'<f8'`
    const DESCR: &'static str;

    /// Append the little-endian encoding of `self`
    fn write_le(&self, out: &mut Vec<u8>);
}

impl NpyElement for f64 {
    const DESCR: &'static str = "'<f8'";

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl NpyElement for u8 {
    const DESCR: &'static str = "'|u1'";

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

/// Packed 13-byte record, same layout as CARLA's `DVSEvent` array dtype
impl NpyElement for DvsEvent {
    const DESCR: &'static str = "[('x', '<u2'), ('y', '<u2'), ('t', '<i8'), ('pol', '?')]";

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.t.to_le_bytes());
        out.push(u8::from(self.pol));
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({n},)"),
        dims => {
            let inner: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", inner.join(", "))
        }
    }
}

/// Magic, version and the padded header dictionary
pub fn header(descr: &str, shape: &[usize]) -> Vec<u8> {
    let mut dict = format!(
        "{{'descr': {descr}, 'fortran_order': False, 'shape': {}, }}",
        shape_literal(shape)
    );
    // magic(6) + version(2) + header_len(2) + dict + '\n' must be 64-aligned
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out
}

/// Encode a C-order array
///
/// `data.len()` must equal the product of `shape`.
pub fn encode<T: NpyElement>(shape: &[usize], data: &[T]) -> Vec<u8> {
    debug_assert_eq!(shape.iter().product::<usize>(), data.len());
    let mut out = header(T::DESCR, shape);
    for value in data {
        value.write_le(&mut out);
    }
    out
}

/// Encode and write an array to `path`
pub fn write_npy<T: NpyElement>(path: &Path, shape: &[usize], data: &[T]) -> Result<()> {
    fs::write(path, encode(shape, data)).map_err(|e| RecorderError::io(path, e))
}
