use std::fmt;

/// ONNX tensor element types
///
/// Tags outside the known set are kept as `Unknown` and handled opaquely:
/// they are never converted and never size-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Undefined,
    Float32,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Int32,
    Int64,
    String,
    Bool,
    Float16,
    Float64,
    Uint32,
    Uint64,
    Complex64,
    Complex128,
    BFloat16,
    Float8E4M3Fn,
    Float8E4M3Fnuz,
    Float8E5M2,
    Float8E5M2Fnuz,
    Uint4,
    Int4,
    Float4E2M1,
    Float8E8M0,
    Unknown(i32),
}

impl DataType {
    /// Create DataType from ONNX type integer
    pub fn from_onnx_type(data_type: i32) -> Self {
        match data_type {
            0 => DataType::Undefined,
            1 => DataType::Float32,
            2 => DataType::Uint8,
            3 => DataType::Int8,
            4 => DataType::Uint16,
            5 => DataType::Int16,
            6 => DataType::Int32,
            7 => DataType::Int64,
            8 => DataType::String,
            9 => DataType::Bool,
            10 => DataType::Float16,
            11 => DataType::Float64,
            12 => DataType::Uint32,
            13 => DataType::Uint64,
            14 => DataType::Complex64,
            15 => DataType::Complex128,
            16 => DataType::BFloat16,
            17 => DataType::Float8E4M3Fn,
            18 => DataType::Float8E4M3Fnuz,
            19 => DataType::Float8E5M2,
            20 => DataType::Float8E5M2Fnuz,
            21 => DataType::Uint4,
            22 => DataType::Int4,
            23 => DataType::Float4E2M1,
            24 => DataType::Float8E8M0,
            _ => DataType::Unknown(data_type),
        }
    }

    /// ONNX type integer for this DataType
    pub fn to_onnx_type(self) -> i32 {
        match self {
            DataType::Undefined => 0,
            DataType::Float32 => 1,
            DataType::Uint8 => 2,
            DataType::Int8 => 3,
            DataType::Uint16 => 4,
            DataType::Int16 => 5,
            DataType::Int32 => 6,
            DataType::Int64 => 7,
            DataType::String => 8,
            DataType::Bool => 9,
            DataType::Float16 => 10,
            DataType::Float64 => 11,
            DataType::Uint32 => 12,
            DataType::Uint64 => 13,
            DataType::Complex64 => 14,
            DataType::Complex128 => 15,
            DataType::BFloat16 => 16,
            DataType::Float8E4M3Fn => 17,
            DataType::Float8E4M3Fnuz => 18,
            DataType::Float8E5M2 => 19,
            DataType::Float8E5M2Fnuz => 20,
            DataType::Uint4 => 21,
            DataType::Int4 => 22,
            DataType::Float4E2M1 => 23,
            DataType::Float8E8M0 => 24,
            DataType::Unknown(tag) => tag,
        }
    }

    /// Get the size in bytes of one element stored in `raw_data`
    ///
    /// Returns `None` for strings, packed 4-bit types and unknown tags.
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => Some(4),
            DataType::Float64 | DataType::Int64 | DataType::Uint64 => Some(8),
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int8
            | DataType::Uint8
            | DataType::Bool
            | DataType::Float8E4M3Fn
            | DataType::Float8E4M3Fnuz
            | DataType::Float8E5M2
            | DataType::Float8E5M2Fnuz
            | DataType::Float8E8M0 => Some(1),
            DataType::Complex64 => Some(8),
            DataType::Complex128 => Some(16),
            DataType::Uint4
            | DataType::Int4
            | DataType::Float4E2M1
            | DataType::String
            | DataType::Undefined
            | DataType::Unknown(_) => None,
        }
    }

    /// Short lowercase name, as used in graph names and log lines
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Undefined => "undefined",
            DataType::Float32 => "float32",
            DataType::Uint8 => "uint8",
            DataType::Int8 => "int8",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Float16 => "float16",
            DataType::Float64 => "float64",
            DataType::Uint32 => "uint32",
            DataType::Uint64 => "uint64",
            DataType::Complex64 => "complex64",
            DataType::Complex128 => "complex128",
            DataType::BFloat16 => "bfloat16",
            DataType::Float8E4M3Fn => "float8e4m3fn",
            DataType::Float8E4M3Fnuz => "float8e4m3fnuz",
            DataType::Float8E5M2 => "float8e5m2",
            DataType::Float8E5M2Fnuz => "float8e5m2fnuz",
            DataType::Uint4 => "uint4",
            DataType::Int4 => "int4",
            DataType::Float4E2M1 => "float4e2m1",
            DataType::Float8E8M0 => "float8e8m0",
            DataType::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown(tag) => write!(f, "unknown({})", tag),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onnx_tags_map_both_ways() {
        for tag in 0..=24 {
            assert_eq!(DataType::from_onnx_type(tag).to_onnx_type(), tag);
        }
        assert_eq!(DataType::from_onnx_type(99), DataType::Unknown(99));
        assert_eq!(DataType::Unknown(99).to_onnx_type(), 99);
    }

    #[test]
    fn packed_and_variable_types_have_no_fixed_width() {
        assert_eq!(DataType::Int64.size_in_bytes(), Some(8));
        assert_eq!(DataType::Int8.size_in_bytes(), Some(1));
        assert_eq!(DataType::Int4.size_in_bytes(), None);
        assert_eq!(DataType::String.size_in_bytes(), None);
        assert_eq!(DataType::Unknown(42).size_in_bytes(), None);
    }
}
