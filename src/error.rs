use std::fmt;

use crate::precision::Precision;
use crate::validator::ValidationError;

/// Which side of the rewrite a structural check ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// The source model, before any rewriting
    Pre,
    /// The rebuilt model, before it is handed back or saved
    Post,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Pre => write!(f, "source model"),
            ValidationStage::Post => write!(f, "converted model"),
        }
    }
}

/// Custom error type for onnx-typecast
#[derive(Debug)]
pub enum Error {
    /// I/O error when reading or writing files
    Io(std::io::Error),
    /// Protobuf decoding error
    Decode(prost::DecodeError),
    /// Requested precision or option is not supported
    Configuration(String),
    /// Model failed structural validation
    StructuralValidation {
        stage: ValidationStage,
        source: ValidationError,
    },
    /// Element does not fit the target width (strict mode only)
    Overflow {
        tensor: String,
        index: usize,
        value: i64,
        precision: Precision,
    },
    /// Model structure error
    InvalidModel(String),
    /// Missing required field
    MissingField(String),
    /// Unsupported feature
    Unsupported(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Decode(e) => write!(f, "Protobuf decode error: {}", e),
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::StructuralValidation { stage, source } => {
                write!(f, "Structural validation of {} failed: {}", stage, source)
            }
            Error::Overflow {
                tensor,
                index,
                value,
                precision,
            } => write!(
                f,
                "Value {} at index {} of tensor '{}' does not fit in {}",
                value, index, tensor, precision
            ),
            Error::InvalidModel(msg) => write!(f, "Invalid model: {}", msg),
            Error::MissingField(field) => write!(f, "Missing required field: {}", field),
            Error::Unsupported(feature) => write!(f, "Unsupported feature: {}", feature),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::StructuralValidation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(err: std::num::TryFromIntError) -> Self {
        Error::InvalidModel(format!("Integer conversion error: {}", err))
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
