use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::Error;

/// A dense `f32` array in C order, as stored in a NumPy array file.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NpyArray {
    /// The magic string.
    pub const MAGIC: &'static [u8; 6] = b"\x93NUMPY";

    /// The header block alignment.
    const ALIGNMENT: usize = 64;

    /// Create a new array, checking that the data fills the shape.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, Error> {
        if element_count(&shape) != Some(data.len()) {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: vec![data.len()],
            });
        }

        Ok(Self { shape, data })
    }

    /// Create a zero filled array.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Get the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of elements per entry of the first axis.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Reinterpret the data with a new shape of the same size.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, Error> {
        Self::new(shape, self.data)
    }

    /// Open an array file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Save to an array file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read an array.
    ///
    /// Little endian `f4` and `f8` arrays are supported, `f8` is narrowed to `f32`.
    pub fn read(reader: &mut impl Read) -> Result<Self, Error> {
        let mut magic = [0u8; 6];
        reader.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(Error::NotNpy);
        }

        let mut version = [0u8; 2];
        reader.read_exact(&mut version)?;
        let header_len = match version[0] {
            1 => {
                let mut len = [0u8; 2];
                reader.read_exact(&mut len)?;
                u16::from_le_bytes(len) as usize
            }
            2 | 3 => {
                let mut len = [0u8; 4];
                reader.read_exact(&mut len)?;
                u32::from_le_bytes(len) as usize
            }
            major => {
                return Err(Error::NpyHeaderInvalid(format!(
                    "unsupported version {major}.{}",
                    version[1]
                )));
            }
        };

        let mut header = vec![0u8; header_len];
        reader.read_exact(&mut header)?;
        let header = String::from_utf8_lossy(&header);

        let descr = header_value(&header, "descr")
            .map(|value| value.trim_matches(|c| c == '\'' || c == '"'))
            .ok_or_else(|| Error::NpyHeaderInvalid("missing descr".to_string()))?;

        if header_value(&header, "fortran_order").is_some_and(|value| value.starts_with("True")) {
            return Err(Error::NpyFortranOrder);
        }

        let shape = header_value(&header, "shape")
            .ok_or_else(|| Error::NpyHeaderInvalid("missing shape".to_string()))
            .and_then(parse_shape)?;

        let len = element_count(&shape)
            .ok_or_else(|| Error::NpyHeaderInvalid(format!("shape too large: {shape:?}")))?;
        let data = match descr {
            "<f4" | "=f4" => {
                let bytes = read_payload(reader, len, size_of::<f32>())?;
                bytemuck::pod_collect_to_vec::<u8, f32>(&bytes)
            }
            "<f8" | "=f8" => {
                let bytes = read_payload(reader, len, size_of::<f64>())?;
                bytemuck::pod_collect_to_vec::<u8, f64>(&bytes)
                    .into_iter()
                    .map(|x| x as f32)
                    .collect()
            }
            _ => return Err(Error::NpyUnsupportedDtype(descr.to_string())),
        };

        Ok(Self { shape, data })
    }

    /// Write the array as a version 1.0 little endian `f4` array.
    pub fn write(&self, writer: &mut impl Write) -> Result<(), Error> {
        let shape = match self.shape.as_slice() {
            [len] => format!("({len},)"),
            shape => format!(
                "({})",
                shape
                    .iter()
                    .map(|len| len.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape}, }}");

        let preamble = Self::MAGIC.len() + 2 + 2;
        let padding = Self::ALIGNMENT - (preamble + header.len() + 1) % Self::ALIGNMENT;
        header.extend(std::iter::repeat_n(' ', padding % Self::ALIGNMENT));
        header.push('\n');

        let header_len = u16::try_from(header.len())
            .map_err(|_| Error::NpyHeaderInvalid(format!("header too long: {}", header.len())))?;

        writer.write_all(Self::MAGIC)?;
        writer.write_all(&[1, 0])?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(header.as_bytes())?;
        writer.write_all(bytemuck::cast_slice(&self.data))?;

        Ok(())
    }
}

/// Get the number of elements of a shape, [`None`] on overflow.
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |count, len| count.checked_mul(*len))
}

/// Read exactly `len` elements of `size` bytes.
///
/// The buffer grows with the bytes actually read, so a header claiming more data than the
/// file holds fails with [`Error::Io`] instead of allocating up front.
fn read_payload(reader: &mut impl Read, len: usize, size: usize) -> Result<Vec<u8>, Error> {
    let byte_len = len
        .checked_mul(size)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| Error::NpyHeaderInvalid(format!("payload too large: {len} elements")))?;

    let mut bytes = Vec::new();
    reader.by_ref().take(byte_len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != byte_len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    Ok(bytes)
}

/// Find the raw value text of a key in the header dictionary.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header
        .find(&format!("'{key}'"))
        .or_else(|| header.find(&format!("\"{key}\"")))?;
    let rest = &header[start + key.len() + 2..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').or_else(|| rest.find('}'))?
    };

    Some(rest[..end].trim())
}

fn parse_shape(value: &str) -> Result<Vec<usize>, Error> {
    value
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| Error::NpyHeaderInvalid(format!("invalid shape {value}")))
        })
        .collect()
}
