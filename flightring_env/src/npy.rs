//! Minimal NumPy `.npy` codec for 2-D `f64` arrays.
//!
//! Writes format version 1.0 (little-endian `<f8`, C order). Reads versions
//! 1.0 through 3.0 in either memory order, as long as the dtype is `<f8`.
//!
//! ```text
//! \x93NUMPY | major | minor | header_len (u16 LE, u32 for v2+) | header dict | data
//! ```

use crate::EnvError;
use nalgebra::DMatrix;
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header block (magic + version + length + dict) is padded to this many bytes.
const HEADER_ALIGN: usize = 64;

/// Encodes a matrix as `.npy` bytes.
pub fn encode(matrix: &DMatrix<f64>) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.nrows(),
        matrix.ncols()
    );

    // magic(6) + version(2) + header_len(2) + dict + '\n', rounded up
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding + matrix.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');

    for row in matrix.row_iter() {
        for value in row.iter() {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    out
}

/// Decodes `.npy` bytes into a matrix. `path` is only used for error messages.
///
/// A 1-D array of length `n` becomes an `n×1` column, except that an empty
/// 1-D array becomes `0×0`.
pub fn decode(bytes: &[u8], path: &Path) -> Result<DMatrix<f64>, EnvError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(EnvError::malformed_array(path, "missing NUMPY magic"));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(EnvError::malformed_array(path, "truncated header"));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => {
            return Err(EnvError::malformed_array(
                path,
                format!("unsupported format version {}", v),
            ))
        }
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(EnvError::malformed_array(path, "truncated header"));
    }

    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| EnvError::malformed_array(path, "header is not valid text"))?;
    let header = ArrayHeader::parse(header)
        .map_err(|reason| EnvError::malformed_array(path, reason))?;

    if header.descr != "<f8" {
        return Err(EnvError::malformed_array(
            path,
            format!("unsupported dtype '{}', expected '<f8'", header.descr),
        ));
    }

    let (rows, cols) = match header.shape.as_slice() {
        [] => (1, 1),
        [0] => (0, 0),
        [n] => (*n, 1),
        [r, c] => (*r, *c),
        other => {
            return Err(EnvError::malformed_array(
                path,
                format!("expected a 1-D or 2-D array, got {} dimensions", other.len()),
            ))
        }
    };

    let payload = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(|| {
            EnvError::malformed_array(path, format!("shape ({}, {}) overflows", rows, cols))
        })?;
    if payload.len() != expected {
        return Err(EnvError::malformed_array(
            path,
            format!(
                "shape ({}, {}) needs {} data bytes, found {}",
                rows,
                cols,
                expected,
                payload.len()
            ),
        ));
    }

    let values: Vec<f64> = payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect();

    Ok(if header.fortran_order {
        DMatrix::from_column_slice(rows, cols, &values)
    } else {
        DMatrix::from_row_slice(rows, cols, &values)
    })
}

/// Writes a matrix to `path`.
pub fn write(path: &Path, matrix: &DMatrix<f64>) -> Result<(), EnvError> {
    fs::write(path, encode(matrix)).map_err(|e| EnvError::io(path, e))
}

/// Reads a matrix from `path`.
pub fn read(path: &Path) -> Result<DMatrix<f64>, EnvError> {
    let bytes = fs::read(path).map_err(|e| EnvError::io(path, e))?;
    decode(&bytes, path)
}

/// The parts of the header dict we care about.
#[derive(Debug, PartialEq)]
struct ArrayHeader {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl ArrayHeader {
    fn parse(text: &str) -> Result<Self, String> {
        let descr = quoted_value(text, "descr").ok_or("header has no 'descr'")?;

        let fortran_order = match raw_value(text, "fortran_order") {
            Some(v) if v.starts_with("True") => true,
            Some(v) if v.starts_with("False") => false,
            _ => return Err("header has no 'fortran_order'".to_string()),
        };

        let shape_text = raw_value(text, "shape").ok_or("header has no 'shape'")?;
        let open = shape_text.find('(').ok_or("shape is not a tuple")?;
        let close = shape_text.find(')').ok_or("shape is not a tuple")?;
        let shape = shape_text[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|dim| !dim.is_empty())
            .map(|dim| {
                dim.trim_end_matches('L')
                    .parse::<usize>()
                    .map_err(|_| format!("invalid shape dimension '{}'", dim))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            descr: descr.to_string(),
            fortran_order,
            shape,
        })
    }
}

/// Returns the text right after `'key':`.
fn raw_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    ["'", "\""].iter().find_map(|q| {
        let needle = format!("{q}{key}{q}");
        let at = text.find(&needle)?;
        let rest = &text[at + needle.len()..];
        let colon = rest.find(':')?;
        Some(rest[colon + 1..].trim_start())
    })
}

/// Returns the quoted string value of `key`.
fn quoted_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let rest = raw_value(text, key)?;
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(&body[..end])
}
