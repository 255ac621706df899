//! # onnx-typecast
//!
//! Downcasts INT64 tensors in ONNX models to INT32, INT16 or INT8.
//!
//! Both graph initializers and tensors embedded in `Constant` nodes are
//! rewritten. Everything else passes through untouched:
//! - graph inputs and outputs keep their declared types
//! - node order, names and opset declarations are preserved
//! - the result is structurally validated before it is returned or saved
//!
//! Narrowing wraps: each value keeps its low bits, so values outside the
//! target range change silently unless strict mode is selected.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use onnx_typecast::{ConvertOptions, Precision, convert_file};
//!
//! let options = ConvertOptions::new(Precision::Int32);
//! let report = convert_file("model.onnx", "model-int32.onnx", &options)?;
//! println!("{} initializers converted", report.initializers_converted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// include generated protobuf code inside a small module so we can silence
// lints and doc warnings originating from the generated file only.
#[allow(clippy::all)]
#[allow(rustdoc::all)]
mod onnx_generated {
    include!(concat!(env!("OUT_DIR"), "/onnx.rs"));
}

pub use onnx_generated::*;

pub mod catalog;
pub mod convert;
pub mod error;
mod external_data;
pub mod logger;
pub mod model;
pub mod pipeline;
pub mod precision;
pub mod proto_adapter;
pub mod rebuild;
pub mod tensor;
pub mod types;
pub mod validator;

pub use catalog::TensorCatalog;
pub use error::{Error, Result, ValidationStage};
pub use model::{ModelSummary, load_model, load_model_from_bytes, save_model};
pub use pipeline::{
    Conversion, ConversionReport, Stage, convert_file, convert_file_with_bits, convert_model,
};
pub use precision::{ConvertOptions, OverflowPolicy, Precision};
pub use tensor::TensorData;
pub use types::DataType;
pub use validator::{ValidationError, validate_model};
