use prost::bytes::Bytes;

use crate::{DataType, Error, Result};

/// Borrowed view of where a tensor keeps its elements
///
/// Exactly one storage is reported per tensor: `raw_data` wins when it is
/// non-empty, otherwise the typed field matching the element type.
#[derive(Debug, Clone, Copy)]
pub enum TensorData<'a> {
    /// Fixed-width little-endian bytes from the raw_data field
    Raw(&'a [u8]),
    Float(&'a [f32]),
    Double(&'a [f64]),
    /// int32_data, which also backs every integer type narrower than 32 bits
    Int32(&'a [i32]),
    Int64(&'a [i64]),
    Uint64(&'a [u64]),
    Strings(&'a [Bytes]),
    /// Stored outside the protobuf, not loaded
    External,
    /// No elements in any field
    Empty,
}

impl<'a> TensorData<'a> {
    /// Number of stored items: bytes for `Raw`, entries for typed fields
    pub fn len(&self) -> usize {
        match self {
            TensorData::Raw(b) => b.len(),
            TensorData::Float(v) => v.len(),
            TensorData::Double(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Uint64(v) => v.len(),
            TensorData::Strings(v) => v.len(),
            TensorData::External | TensorData::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable storage name for error messages
    pub fn field_name(&self) -> &'static str {
        match self {
            TensorData::Raw(_) => "raw_data",
            TensorData::Float(_) => "float_data",
            TensorData::Double(_) => "double_data",
            TensorData::Int32(_) => "int32_data",
            TensorData::Int64(_) => "int64_data",
            TensorData::Uint64(_) => "uint64_data",
            TensorData::Strings(_) => "string_data",
            TensorData::External => "external_data",
            TensorData::Empty => "<none>",
        }
    }

    /// Decode the elements of an INT64 tensor
    pub fn decode_i64(&self, tensor: &str) -> Result<Vec<i64>> {
        match self {
            TensorData::Raw(bytes) => {
                if bytes.len() % 8 != 0 {
                    return Err(Error::InvalidModel(format!(
                        "raw_data of INT64 tensor '{}' is {} bytes, not a multiple of 8",
                        tensor,
                        bytes.len()
                    )));
                }
                Ok(bytes
                    .chunks_exact(8)
                    .map(|chunk| {
                        let mut le = [0u8; 8];
                        le.copy_from_slice(chunk);
                        i64::from_le_bytes(le)
                    })
                    .collect())
            }
            TensorData::Int64(values) => Ok(values.to_vec()),
            TensorData::Empty => Ok(Vec::new()),
            TensorData::External => Err(Error::Unsupported(format!(
                "tensor '{}' references external data that was not loaded",
                tensor
            ))),
            other => Err(Error::InvalidModel(format!(
                "INT64 tensor '{}' stores its elements in {}",
                tensor,
                other.field_name()
            ))),
        }
    }
}

/// Number of elements described by `dims`; a scalar (no dims) has one
pub fn element_count(dims: &[i64]) -> Result<usize> {
    dims.iter().try_fold(1usize, |acc, &d| {
        let d = usize::try_from(d)
            .map_err(|_| Error::InvalidModel(format!("negative tensor dimension {}", d)))?;
        acc.checked_mul(d)
            .ok_or_else(|| Error::InvalidModel("tensor element count overflows".to_string()))
    })
}

/// Check that stored data agrees with `dims` for the given element type.
///
/// Returns the expected and actual item counts on mismatch. Types without a
/// fixed width (strings, packed 4-bit, unknown tags) only have their typed
/// entry count checked where the mapping is one per element.
pub fn data_matches_shape(
    data: &TensorData<'_>,
    data_type: DataType,
    elements: usize,
) -> std::result::Result<(), (usize, usize)> {
    let expected = match data {
        TensorData::External => return Ok(()),
        TensorData::Empty => 0,
        TensorData::Raw(_) => match data_type.size_in_bytes() {
            Some(width) => elements.saturating_mul(width),
            None => return Ok(()),
        },
        // complex values are stored as (real, imaginary) pairs
        TensorData::Float(_) | TensorData::Double(_)
            if matches!(data_type, DataType::Complex64 | DataType::Complex128) =>
        {
            elements.saturating_mul(2)
        }
        TensorData::Int32(_) if matches!(
            data_type,
            DataType::Int4 | DataType::Uint4 | DataType::Float4E2M1
        ) =>
        {
            elements.div_ceil(2)
        }
        _ => elements,
    };

    let actual = data.len();
    if actual == expected {
        Ok(())
    } else {
        Err((expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_raw_little_endian() {
        let mut raw = Vec::new();
        for v in [1i64, -2, 300] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let values = TensorData::Raw(&raw).decode_i64("t").unwrap();
        assert_eq!(values, vec![1, -2, 300]);
    }

    #[test]
    fn rejects_misaligned_raw() {
        let raw = [0u8; 12];
        assert!(matches!(
            TensorData::Raw(&raw).decode_i64("t"),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn rejects_wrong_typed_field() {
        let floats = [1.0f32];
        assert!(TensorData::Float(&floats).decode_i64("t").is_err());
        assert!(matches!(
            TensorData::External.decode_i64("t"),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn element_counts() {
        assert_eq!(element_count(&[]).unwrap(), 1);
        assert_eq!(element_count(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(element_count(&[5, 0]).unwrap(), 0);
        assert!(element_count(&[2, -1]).is_err());
    }

    #[test]
    fn shape_consistency() {
        let raw = [0u8; 16];
        assert!(data_matches_shape(&TensorData::Raw(&raw), DataType::Int64, 2).is_ok());
        assert_eq!(
            data_matches_shape(&TensorData::Raw(&raw), DataType::Int32, 2),
            Err((8, 16))
        );
        let ints = [1i64, 2, 3];
        assert_eq!(
            data_matches_shape(&TensorData::Int64(&ints), DataType::Int64, 2),
            Err((2, 3))
        );
        let packed = [0i32; 2];
        assert!(data_matches_shape(&TensorData::Int32(&packed), DataType::Int4, 3).is_ok());
        assert!(data_matches_shape(&TensorData::External, DataType::Int64, 10).is_ok());
    }
}
