//! Target widths and the narrowing rule.
//!
//! Narrowing is a two's-complement wrapping cast: the low `width` bits of
//! each i64 are kept and reinterpreted as signed. Values outside the target
//! range are not detected unless [`OverflowPolicy::Strict`] is selected.

use std::fmt;
use std::str::FromStr;

use crate::{DataType, Error, Result};

/// Signed integer width an INT64 tensor is narrowed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Int32,
    Int16,
    Int8,
}

impl Precision {
    /// Every supported precision, widest first
    pub const ALL: [Precision; 3] = [Precision::Int32, Precision::Int16, Precision::Int8];

    pub fn bits(self) -> u32 {
        match self {
            Precision::Int32 => 32,
            Precision::Int16 => 16,
            Precision::Int8 => 8,
        }
    }

    /// Element type a narrowed tensor is tagged with
    pub fn data_type(self) -> DataType {
        match self {
            Precision::Int32 => DataType::Int32,
            Precision::Int16 => DataType::Int16,
            Precision::Int8 => DataType::Int8,
        }
    }

    /// Suffix appended to the converted graph name
    pub fn label(self) -> &'static str {
        self.data_type().label()
    }

    /// Narrow `values` and encode them as little-endian bytes.
    ///
    /// `tensor` only names the source in an overflow error.
    pub fn narrow_to_bytes(
        self,
        tensor: &str,
        values: &[i64],
        policy: OverflowPolicy,
    ) -> Result<Vec<u8>> {
        match self {
            Precision::Int32 => narrow::<i32>(self, tensor, values, policy),
            Precision::Int16 => narrow::<i16>(self, tensor, values, policy),
            Precision::Int8 => narrow::<i8>(self, tensor, values, policy),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u32> for Precision {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(Precision::Int32),
            16 => Ok(Precision::Int16),
            8 => Ok(Precision::Int8),
            other => Err(Error::Configuration(format!(
                "unsupported precision {} (expected one of 8, 16, 32)",
                other
            ))),
        }
    }
}

impl FromStr for Precision {
    type Err = Error;

    /// Accepts a bit count (`"16"`) or a type label (`"int16"`)
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bits = s.strip_prefix("int").unwrap_or(s);
        let bits: u32 = bits.parse().map_err(|_| {
            Error::Configuration(format!(
                "unsupported precision '{}' (expected one of 8, 16, 32)",
                s
            ))
        })?;
        Precision::try_from(bits)
    }
}

/// What to do with an element that does not fit the target width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep the low bits (two's-complement wraparound), no error
    #[default]
    Wrap,
    /// Fail the conversion with [`Error::Overflow`]
    Strict,
}

/// Explicit conversion configuration, passed to every stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub precision: Precision,
    pub overflow: OverflowPolicy,
}

impl ConvertOptions {
    pub fn new(precision: Precision) -> Self {
        ConvertOptions {
            precision,
            overflow: OverflowPolicy::Wrap,
        }
    }

    pub fn strict(mut self) -> Self {
        self.overflow = OverflowPolicy::Strict;
        self
    }
}

/// Signed target integer a 64-bit value can be narrowed into
pub(crate) trait NarrowInt: Copy + TryFrom<i64> {
    const WIDTH: usize;

    fn wrap(value: i64) -> Self;

    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! narrow_int {
    ($($ty:ty),*) => {
        $(
            impl NarrowInt for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn wrap(value: i64) -> Self {
                    value as $ty
                }

                #[inline]
                fn extend_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

narrow_int!(i32, i16, i8);

fn narrow<T: NarrowInt>(
    precision: Precision,
    tensor: &str,
    values: &[i64],
    policy: OverflowPolicy,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * T::WIDTH);
    for (index, &value) in values.iter().enumerate() {
        let narrowed = match policy {
            OverflowPolicy::Wrap => T::wrap(value),
            OverflowPolicy::Strict => T::try_from(value).map_err(|_| Error::Overflow {
                tensor: tensor.to_string(),
                index,
                value,
                precision,
            })?,
        };
        narrowed.extend_le(&mut out);
    }
    Ok(out)
}
