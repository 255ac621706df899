//! Structural model checks.
//!
//! These are graph-consistency checks only: names, single producers,
//! definition-before-use, tensor payload sizes and Constant node shape.
//! Nothing here looks at numeric values, and subgraph attributes (If/Loop
//! bodies) are not descended into.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::proto_adapter::{
    attribute_name, attribute_tensors, carries_tensor_payload, is_constant, tensor_data,
    tensor_data_type, tensor_name, value_name, value_static_dims, value_tensor_type,
};
use crate::tensor::{data_matches_shape, element_count};
use crate::{DataType, GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto};

/// Reason a model failed structural validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingIrVersion,
    NoOpsetImport,
    MissingGraph,
    EmptyValueName {
        kind: &'static str,
        index: usize,
    },
    DuplicateValue {
        kind: &'static str,
        name: String,
    },
    MissingValueType {
        name: String,
    },
    UndefinedElemType {
        name: String,
    },
    NegativeDim {
        name: String,
        dim: i64,
    },
    UnnamedInitializer {
        index: usize,
    },
    DuplicateInitializer {
        name: String,
    },
    UndefinedTensorType {
        name: String,
    },
    TensorDataMismatch {
        name: String,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    EmptyOpType {
        node: String,
    },
    EmptyAttributeName {
        node: String,
    },
    MalformedConstant {
        node: String,
        reason: String,
    },
    DuplicateOutput {
        name: String,
        node: String,
    },
    OutputShadowsGraphValue {
        name: String,
        node: String,
    },
    DanglingInput {
        node: String,
        input: String,
    },
    NotTopologicallySorted {
        node: String,
        input: String,
    },
    Cycle {
        nodes: Vec<String>,
    },
    UndefinedGraphOutput {
        name: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ValidationError::*;
        match self {
            MissingIrVersion => write!(f, "model has no ir_version set"),
            NoOpsetImport => write!(f, "model declares no opset_import"),
            MissingGraph => write!(f, "model has no graph"),
            EmptyValueName { kind, index } => write!(f, "graph {} #{} has no name", kind, index),
            DuplicateValue { kind, name } => write!(f, "graph {} '{}' is declared twice", kind, name),
            MissingValueType { name } => write!(f, "value '{}' has no type", name),
            UndefinedElemType { name } => {
                write!(f, "value '{}' has an undefined element type", name)
            }
            NegativeDim { name, dim } => write!(f, "'{}' has negative dimension {}", name, dim),
            UnnamedInitializer { index } => write!(f, "initializer #{} has no name", index),
            DuplicateInitializer { name } => write!(f, "initializer '{}' is declared twice", name),
            UndefinedTensorType { name } => {
                write!(f, "tensor '{}' has an undefined data type", name)
            }
            TensorDataMismatch {
                name,
                field,
                expected,
                actual,
            } => write!(
                f,
                "tensor '{}' holds {} items in {}, shape requires {}",
                name, actual, field, expected
            ),
            EmptyOpType { node } => write!(f, "node {} has no op_type", node),
            EmptyAttributeName { node } => write!(f, "node {} has an unnamed attribute", node),
            MalformedConstant { node, reason } => {
                write!(f, "Constant node {} is malformed: {}", node, reason)
            }
            DuplicateOutput { name, node } => write!(
                f,
                "value '{}' produced by node {} already has a producer",
                name, node
            ),
            OutputShadowsGraphValue { name, node } => write!(
                f,
                "node {} output '{}' shadows a graph input or initializer",
                node, name
            ),
            DanglingInput { node, input } => {
                write!(f, "node {} input '{}' is not defined anywhere", node, input)
            }
            NotTopologicallySorted { node, input } => write!(
                f,
                "node {} uses '{}' before the node producing it",
                node, input
            ),
            Cycle { nodes } => write!(f, "graph has a cycle through [{}]", nodes.join(", ")),
            UndefinedGraphOutput { name } => write!(f, "graph output '{}' is never produced", name),
        }
    }
}

impl std::error::Error for ValidationError {}

type Checked = Result<(), ValidationError>;

/// Validate model-level fields and then the main graph
pub fn validate_model(model: &ModelProto) -> Checked {
    match model.ir_version {
        Some(v) if v > 0 => {}
        _ => return Err(ValidationError::MissingIrVersion),
    }
    if model.opset_import.is_empty() {
        return Err(ValidationError::NoOpsetImport);
    }
    let graph = model.graph.as_ref().ok_or(ValidationError::MissingGraph)?;
    validate_graph(graph)
}

pub fn validate_graph(graph: &GraphProto) -> Checked {
    check_values("input", &graph.input)?;
    check_values("output", &graph.output)?;

    // names visible to every node: graph inputs and initializers
    let mut graph_scope: HashSet<&str> = graph.input.iter().map(value_name).collect();

    let mut initializer_names = HashSet::with_capacity(graph.initializer.len());
    for (index, tensor) in graph.initializer.iter().enumerate() {
        let name = tensor_name(tensor);
        if name.is_empty() {
            return Err(ValidationError::UnnamedInitializer { index });
        }
        if !initializer_names.insert(name) {
            return Err(ValidationError::DuplicateInitializer {
                name: name.to_string(),
            });
        }
        check_tensor(tensor, name)?;
        graph_scope.insert(name);
    }

    let producers = collect_producers(&graph.node, &graph_scope)?;

    let mut available = graph_scope;
    for (idx, node) in graph.node.iter().enumerate() {
        let label = node_label(node, idx);
        check_node(node, &label)?;

        for input in node.input.iter().filter(|i| !i.is_empty()) {
            if available.contains(input.as_str()) {
                continue;
            }
            if !producers.contains_key(input.as_str()) {
                return Err(ValidationError::DanglingInput {
                    node: label,
                    input: input.clone(),
                });
            }
            return Err(match unordered_nodes(&graph.node, &producers) {
                Some(nodes) => ValidationError::Cycle { nodes },
                None => ValidationError::NotTopologicallySorted {
                    node: label,
                    input: input.clone(),
                },
            });
        }

        available.extend(node.output.iter().filter(|o| !o.is_empty()).map(String::as_str));
    }

    for output in &graph.output {
        let name = value_name(output);
        if !available.contains(name) {
            return Err(ValidationError::UndefinedGraphOutput {
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

fn node_label(node: &NodeProto, idx: usize) -> String {
    match node.name.as_deref() {
        Some(name) if !name.is_empty() => format!("'{}'", name),
        _ => format!("#{}", idx),
    }
}

fn check_values(kind: &'static str, values: &[ValueInfoProto]) -> Checked {
    let mut seen = HashSet::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        let name = value_name(value);
        if name.is_empty() {
            return Err(ValidationError::EmptyValueName { kind, index });
        }
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateValue {
                kind,
                name: name.to_string(),
            });
        }
        if value.r#type.as_ref().and_then(|t| t.value.as_ref()).is_none() {
            return Err(ValidationError::MissingValueType {
                name: name.to_string(),
            });
        }

        // sequence, map and optional types are accepted as declared
        let Some(tensor_type) = value_tensor_type(value) else {
            continue;
        };
        if DataType::from_onnx_type(tensor_type.elem_type.unwrap_or(0)) == DataType::Undefined {
            return Err(ValidationError::UndefinedElemType {
                name: name.to_string(),
            });
        }
        if let Some(dim) = value_static_dims(tensor_type)
            .into_iter()
            .flatten()
            .find(|&d| d < 0)
        {
            return Err(ValidationError::NegativeDim {
                name: name.to_string(),
                dim,
            });
        }
    }
    Ok(())
}

fn check_tensor(tensor: &TensorProto, label: &str) -> Checked {
    let data_type = tensor_data_type(tensor);
    if data_type == DataType::Undefined {
        return Err(ValidationError::UndefinedTensorType {
            name: label.to_string(),
        });
    }
    if let Some(&dim) = tensor.dims.iter().find(|&&d| d < 0) {
        return Err(ValidationError::NegativeDim {
            name: label.to_string(),
            dim,
        });
    }

    let elements = element_count(&tensor.dims).unwrap_or(usize::MAX);
    let data = tensor_data(tensor);
    data_matches_shape(&data, data_type, elements).map_err(|(expected, actual)| {
        ValidationError::TensorDataMismatch {
            name: label.to_string(),
            field: data.field_name(),
            expected,
            actual,
        }
    })
}

fn check_node(node: &NodeProto, label: &str) -> Checked {
    if node.op_type.as_deref().unwrap_or("").is_empty() {
        return Err(ValidationError::EmptyOpType {
            node: label.to_string(),
        });
    }

    if is_constant(node) {
        let malformed = |reason: String| ValidationError::MalformedConstant {
            node: label.to_string(),
            reason,
        };
        if !node.input.is_empty() {
            return Err(malformed(format!("has {} inputs", node.input.len())));
        }
        if node.output.len() != 1 {
            return Err(malformed(format!("has {} outputs", node.output.len())));
        }
        let payloads = node
            .attribute
            .iter()
            .filter(|attr| carries_tensor_payload(attr))
            .count();
        if payloads > 1 {
            return Err(malformed(format!("has {} tensor payloads", payloads)));
        }
    }

    for attr in &node.attribute {
        let name = attribute_name(attr);
        if name.is_empty() {
            return Err(ValidationError::EmptyAttributeName {
                node: label.to_string(),
            });
        }
        for tensor in attribute_tensors(attr) {
            let tensor_label = match tensor_name(tensor) {
                "" => format!("{}.{}", label, name),
                named => named.to_string(),
            };
            check_tensor(tensor, &tensor_label)?;
        }
    }

    Ok(())
}

/// Map every node output to its producing node, enforcing a single producer
fn collect_producers<'a>(
    nodes: &'a [NodeProto],
    graph_scope: &HashSet<&str>,
) -> Result<HashMap<&'a str, usize>, ValidationError> {
    let mut producers = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        for out in node.output.iter().filter(|o| !o.is_empty()) {
            if graph_scope.contains(out.as_str()) {
                return Err(ValidationError::OutputShadowsGraphValue {
                    name: out.clone(),
                    node: node_label(node, idx),
                });
            }
            if producers.insert(out.as_str(), idx).is_some() {
                return Err(ValidationError::DuplicateOutput {
                    name: out.clone(),
                    node: node_label(node, idx),
                });
            }
        }
    }
    Ok(producers)
}

/// Kahn's algorithm over node-to-node edges.
///
/// Returns the labels of nodes that can never be scheduled (members of a
/// cycle and anything downstream of one), or `None` when the graph is
/// acyclic.
fn unordered_nodes(nodes: &[NodeProto], producers: &HashMap<&str, usize>) -> Option<Vec<String>> {
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut indegree: Vec<usize> = vec![0; nodes.len()];

    for (idx, node) in nodes.iter().enumerate() {
        for input in node.input.iter().filter(|i| !i.is_empty()) {
            if let Some(&producer) = producers.get(input.as_str()) {
                consumers[producer].push(idx);
                indegree[idx] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut scheduled = 0usize;
    while let Some(idx) = queue.pop_front() {
        scheduled += 1;
        for &consumer in &consumers[idx] {
            indegree[consumer] -= 1;
            if indegree[consumer] == 0 {
                queue.push_back(consumer);
            }
        }
    }

    if scheduled == nodes.len() {
        return None;
    }

    Some(
        indegree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d > 0)
            .map(|(idx, _)| node_label(&nodes[idx], idx))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AttributeProto, OperatorSetIdProto, TypeProto, attribute_proto, type_proto,
    };
    use prost::bytes::Bytes;

    fn value(name: &str) -> ValueInfoProto {
        ValueInfoProto {
            name: Some(name.to_string()),
            r#type: Some(TypeProto {
                value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                    elem_type: Some(DataType::Float32.to_onnx_type()),
                    shape: None,
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn node(name: &str, op: &str, inputs: &[&str], outputs: &[&str]) -> NodeProto {
        NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: outputs.iter().map(|s| s.to_string()).collect(),
            name: Some(name.to_string()),
            op_type: Some(op.to_string()),
            ..Default::default()
        }
    }

    fn model(graph: GraphProto) -> ModelProto {
        ModelProto {
            ir_version: Some(8),
            opset_import: vec![OperatorSetIdProto {
                domain: Some(String::new()),
                version: Some(13),
            }],
            graph: Some(graph),
            ..Default::default()
        }
    }

    fn chain() -> GraphProto {
        GraphProto {
            name: Some("g".to_string()),
            node: vec![
                node("a", "Relu", &["x"], &["h"]),
                node("b", "Add", &["h", "bias"], &["y"]),
            ],
            initializer: vec![TensorProto {
                name: Some("bias".to_string()),
                dims: vec![1],
                data_type: Some(DataType::Float32.to_onnx_type()),
                float_data: vec![1.0],
                ..Default::default()
            }],
            input: vec![value("x")],
            output: vec![value("y")],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_well_formed_chain() {
        assert_eq!(validate_model(&model(chain())), Ok(()));
    }

    #[test]
    fn model_level_fields() {
        let mut m = model(chain());
        m.opset_import.clear();
        assert_eq!(validate_model(&m), Err(ValidationError::NoOpsetImport));

        let mut m = model(chain());
        m.ir_version = None;
        assert_eq!(validate_model(&m), Err(ValidationError::MissingIrVersion));

        let mut m = model(chain());
        m.graph = None;
        assert_eq!(validate_model(&m), Err(ValidationError::MissingGraph));
    }

    #[test]
    fn dangling_input() {
        let mut g = chain();
        g.node[1].input[1] = "nope".to_string();
        assert_eq!(
            validate_graph(&g),
            Err(ValidationError::DanglingInput {
                node: "'b'".to_string(),
                input: "nope".to_string(),
            })
        );
    }

    #[test]
    fn optional_empty_inputs_are_skipped() {
        let mut g = chain();
        g.node[0].input.push(String::new());
        assert_eq!(validate_graph(&g), Ok(()));
    }

    #[test]
    fn out_of_order_vs_cycle() {
        let mut g = chain();
        g.node.swap(0, 1);
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::NotTopologicallySorted { .. })
        ));

        let mut g = chain();
        g.node[0].input = vec!["y".to_string()];
        match validate_graph(&g) {
            Err(ValidationError::Cycle { nodes }) => {
                assert_eq!(nodes, vec!["'a'".to_string(), "'b'".to_string()])
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn single_producer() {
        let mut g = chain();
        g.node.push(node("c", "Relu", &["x"], &["h"]));
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::DuplicateOutput { ref name, .. }) if name == "h"
        ));

        let mut g = chain();
        g.node[0].output = vec!["bias".to_string()];
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::OutputShadowsGraphValue { .. })
        ));
    }

    #[test]
    fn tensor_payload_must_match_shape() {
        let mut g = chain();
        g.initializer[0].dims = vec![2];
        assert_eq!(
            validate_graph(&g),
            Err(ValidationError::TensorDataMismatch {
                name: "bias".to_string(),
                field: "float_data",
                expected: 2,
                actual: 1,
            })
        );

        let mut g = chain();
        g.initializer[0].float_data.clear();
        g.initializer[0].raw_data = Some(Bytes::from(vec![0u8; 3]));
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::TensorDataMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn initializer_names() {
        let mut g = chain();
        g.initializer.push(g.initializer[0].clone());
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::DuplicateInitializer { .. })
        ));

        let mut g = chain();
        g.initializer[0].name = None;
        assert_eq!(
            validate_graph(&g),
            Err(ValidationError::UnnamedInitializer { index: 0 })
        );
    }

    #[test]
    fn constant_node_shape() {
        let tensor_attr = AttributeProto {
            name: Some("value".to_string()),
            r#type: Some(attribute_proto::AttributeType::Tensor as i32),
            t: Some(TensorProto {
                dims: vec![1],
                data_type: Some(DataType::Int64.to_onnx_type()),
                int64_data: vec![3],
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut g = chain();
        let mut c = node("c", "Constant", &[], &["k"]);
        c.attribute.push(tensor_attr.clone());
        g.node.insert(0, c.clone());
        assert_eq!(validate_graph(&g), Ok(()));

        let mut g = chain();
        let mut bad = c.clone();
        bad.attribute.push(tensor_attr.clone());
        g.node.insert(0, bad);
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::MalformedConstant { .. })
        ));

        // scalar attributes alongside the tensor are fine
        let mut g = chain();
        let mut mixed = node("c", "Constant", &[], &["k"]);
        mixed.attribute.push(AttributeProto {
            name: Some("value_int".to_string()),
            r#type: Some(attribute_proto::AttributeType::Int as i32),
            i: Some(3),
            ..Default::default()
        });
        mixed.attribute.push(tensor_attr.clone());
        g.node.insert(0, mixed);
        assert_eq!(validate_graph(&g), Ok(()));

        let mut g = chain();
        let mut bad = c;
        bad.input.push("x".to_string());
        g.node.insert(0, bad);
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::MalformedConstant { .. })
        ));
    }

    #[test]
    fn graph_outputs_must_be_produced() {
        let mut g = chain();
        g.output.push(value("ghost"));
        assert_eq!(
            validate_graph(&g),
            Err(ValidationError::UndefinedGraphOutput {
                name: "ghost".to_string()
            })
        );
    }

    #[test]
    fn io_descriptors() {
        let mut g = chain();
        g.input[0].r#type = None;
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::MissingValueType { .. })
        ));

        let mut g = chain();
        g.input.push(value("x"));
        assert!(matches!(
            validate_graph(&g),
            Err(ValidationError::DuplicateValue { kind: "input", .. })
        ));
    }
}
