use log::{debug, info};
use prost::Message;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::external_data::inline_external_data;
use crate::proto_adapter::{CONSTANT_OP, tensor_data_type};
use crate::{DataType, Error, ModelProto, Result};

/// Load an ONNX model from a file path
///
/// Tensors stored as external data are resolved relative to the model's
/// directory and inlined, so the returned model is self-contained.
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelProto> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let mut model = load_model_from_bytes(&buffer)?;

    let model_dir = path.parent().unwrap_or_else(|| Path::new("."));
    if let Some(graph) = model.graph.as_mut() {
        let inlined = inline_external_data(graph, model_dir)?;
        if inlined > 0 {
            debug!("inlined {} external tensors", inlined);
        }
    }

    Ok(model)
}

/// Decode an ONNX model from a byte slice
pub fn load_model_from_bytes(data: &[u8]) -> Result<ModelProto> {
    Ok(ModelProto::decode(data)?)
}

/// Encode a model and write it to `path`.
///
/// The bytes go to a sibling temporary file that is renamed over `path`, so
/// a failed write never leaves a truncated model or clobbers a prior one.
pub fn save_model(model: &ModelProto, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidModel(format!("'{}' is not a file path", path.display())))?;

    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let bytes = model.encode_to_vec();
    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Counts used for the one-line model summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSummary {
    pub nodes: usize,
    pub constants: usize,
    pub initializers: usize,
    pub int64_initializers: usize,
    pub inputs: usize,
    pub outputs: usize,
    pub opset_version: Option<i64>,
}

impl ModelSummary {
    pub fn of(model: &ModelProto) -> Self {
        let opset_version = model
            .opset_import
            .iter()
            .find(|o| o.domain.as_deref().unwrap_or("").is_empty())
            .or_else(|| model.opset_import.first())
            .and_then(|o| o.version);

        let Some(graph) = model.graph.as_ref() else {
            return ModelSummary {
                opset_version,
                ..Default::default()
            };
        };

        ModelSummary {
            nodes: graph.node.len(),
            constants: graph
                .node
                .iter()
                .filter(|n| n.op_type.as_deref() == Some(CONSTANT_OP))
                .count(),
            initializers: graph.initializer.len(),
            int64_initializers: graph
                .initializer
                .iter()
                .filter(|t| tensor_data_type(t) == DataType::Int64)
                .count(),
            inputs: graph.input.len(),
            outputs: graph.output.len(),
            opset_version,
        }
    }

    /// Log the summary at info level under `label`
    pub fn log(&self, label: &str) {
        info!(
            "{}: inputs {} | outputs {} | nodes {} ({} constant) | initializers {} ({} int64) | opset {}",
            label,
            self.inputs,
            self.outputs,
            self.nodes,
            self.constants,
            self.initializers,
            self.int64_initializers,
            self.opset_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphProto, NodeProto, OperatorSetIdProto, TensorProto};

    fn sample() -> ModelProto {
        ModelProto {
            ir_version: Some(8),
            opset_import: vec![
                OperatorSetIdProto {
                    domain: Some("ai.onnx.ml".to_string()),
                    version: Some(3),
                },
                OperatorSetIdProto {
                    domain: None,
                    version: Some(17),
                },
            ],
            graph: Some(GraphProto {
                node: vec![NodeProto {
                    op_type: Some("Constant".to_string()),
                    output: vec!["c".to_string()],
                    ..Default::default()
                }],
                initializer: vec![TensorProto {
                    name: Some("w".to_string()),
                    data_type: Some(DataType::Int64.to_onnx_type()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let model = sample();

        save_model(&model, &path).unwrap();
        assert!(!dir.path().join("model.onnx.tmp").exists());
        assert_eq!(load_model(&path).unwrap(), model);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_model(dir.path().join("absent.onnx")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            load_model_from_bytes(&[0xff, 0xff, 0xff]),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn summary_prefers_default_domain_opset() {
        let summary = ModelSummary::of(&sample());
        assert_eq!(summary.opset_version, Some(17));
        assert_eq!(summary.constants, 1);
        assert_eq!(summary.int64_initializers, 1);
    }
}
