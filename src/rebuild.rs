use std::collections::HashSet;

use log::debug;

use crate::precision::ConvertOptions;
use crate::proto_adapter::{set_value_elem_type, value_name};
use crate::{GraphProto, ModelProto, NodeProto, TensorProto};

/// Producer name stamped on every converted model
pub const PRODUCER_NAME: &str = "onnx-typecast";

/// Assemble a fresh graph from the rewritten nodes and initializers.
///
/// Inputs and outputs are copied as-is; their declared types are the
/// model's external contract. `value_info` entries naming a value in
/// `rewritten` are retagged to the target element type.
pub fn rebuild_graph(
    source: &GraphProto,
    nodes: Vec<NodeProto>,
    initializers: Vec<TensorProto>,
    rewritten: &[String],
    options: &ConvertOptions,
) -> GraphProto {
    let name = format!(
        "{}-{}",
        source.name.as_deref().unwrap_or_default(),
        options.precision.label()
    );

    let rewritten: HashSet<&str> = rewritten.iter().map(String::as_str).collect();
    let target = options.precision.data_type();
    let value_info = source
        .value_info
        .iter()
        .cloned()
        .map(|mut value| {
            if rewritten.contains(value_name(&value)) && set_value_elem_type(&mut value, target) {
                debug!("value_info '{}' retagged to {}", value_name(&value), target);
            }
            value
        })
        .collect();

    GraphProto {
        node: nodes,
        name: Some(name),
        initializer: initializers,
        sparse_initializer: source.sparse_initializer.clone(),
        doc_string: source.doc_string.clone(),
        input: source.input.clone(),
        output: source.output.clone(),
        value_info,
        quantization_annotation: source.quantization_annotation.clone(),
        metadata_props: source.metadata_props.clone(),
    }
}

/// Wrap a rebuilt graph in a model carrying the source's versioning
///
/// Opset declarations are copied after assembly so the converted model
/// binds to exactly the operator sets the source did.
pub fn rebuild_model(source: &ModelProto, graph: GraphProto) -> ModelProto {
    let mut model = ModelProto {
        graph: Some(graph),
        producer_name: Some(PRODUCER_NAME.to_string()),
        producer_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        ..Default::default()
    };

    model.opset_import = source.opset_import.clone();
    model.ir_version = source.ir_version;
    model.domain = source.domain.clone();
    model.model_version = source.model_version;
    model.doc_string = source.doc_string.clone();
    model.metadata_props = source.metadata_props.clone();
    model.functions = source.functions.clone();
    model.training_info = source.training_info.clone();
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precision::Precision;
    use crate::{
        DataType, OperatorSetIdProto, TrainingInfoProto, TypeProto, ValueInfoProto, type_proto,
    };

    fn tensor_value(name: &str, data_type: DataType) -> ValueInfoProto {
        ValueInfoProto {
            name: Some(name.to_string()),
            r#type: Some(TypeProto {
                value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                    elem_type: Some(data_type.to_onnx_type()),
                    shape: None,
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn elem_type(value: &ValueInfoProto) -> Option<i32> {
        match value.r#type.as_ref()?.value.as_ref()? {
            type_proto::Value::TensorType(t) => t.elem_type,
            _ => None,
        }
    }

    #[test]
    fn graph_name_gets_precision_suffix_and_io_is_untouched() {
        let source = GraphProto {
            name: Some("main".to_string()),
            input: vec![tensor_value("x", DataType::Int64)],
            output: vec![tensor_value("y", DataType::Int64)],
            value_info: vec![
                tensor_value("shape_out", DataType::Int64),
                tensor_value("other", DataType::Int64),
            ],
            ..Default::default()
        };
        let graph = rebuild_graph(
            &source,
            Vec::new(),
            Vec::new(),
            &["shape_out".to_string()],
            &ConvertOptions::new(Precision::Int16),
        );

        assert_eq!(graph.name.as_deref(), Some("main-int16"));
        assert_eq!(graph.input, source.input);
        assert_eq!(graph.output, source.output);
        assert_eq!(elem_type(&graph.value_info[0]), Some(DataType::Int16.to_onnx_type()));
        assert_eq!(elem_type(&graph.value_info[1]), Some(DataType::Int64.to_onnx_type()));
    }

    #[test]
    fn model_keeps_opsets_ir_version_and_training_info() {
        let source = ModelProto {
            ir_version: Some(8),
            opset_import: vec![
                OperatorSetIdProto {
                    domain: Some(String::new()),
                    version: Some(13),
                },
                OperatorSetIdProto {
                    domain: Some("com.microsoft".to_string()),
                    version: Some(1),
                },
            ],
            producer_name: Some("pytorch".to_string()),
            model_version: Some(3),
            training_info: vec![TrainingInfoProto::default()],
            ..Default::default()
        };
        let model = rebuild_model(&source, GraphProto::default());

        assert_eq!(model.opset_import, source.opset_import);
        assert_eq!(model.ir_version, Some(8));
        assert_eq!(model.model_version, Some(3));
        assert_eq!(model.training_info, source.training_info);
        assert_eq!(model.producer_name.as_deref(), Some(PRODUCER_NAME));
        assert!(model.graph.is_some());
    }
}
