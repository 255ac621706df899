use crate::tensor::TensorData;
use crate::{
    AttributeProto, DataType, NodeProto, TensorProto, ValueInfoProto, attribute_proto,
    tensor_proto, type_proto,
};
use prost::bytes::Bytes;

// Centralised adapter functions over the generated protobuf types. Keep all
// direct proto-field usage here so future changes to `onnx.proto` need only
// update this file.

/// op_type of the materialize-constant operator
pub const CONSTANT_OP: &str = "Constant";

/// Attribute name the Constant operator uses for a dense tensor payload
pub const CONSTANT_VALUE_ATTR: &str = "value";

pub(crate) fn tensor_name(tensor: &TensorProto) -> &str {
    tensor.name.as_deref().unwrap_or("")
}

pub(crate) fn tensor_data_type(tensor: &TensorProto) -> DataType {
    DataType::from_onnx_type(tensor.data_type.unwrap_or(0))
}

pub(crate) fn is_external(tensor: &TensorProto) -> bool {
    tensor.data_location == Some(tensor_proto::DataLocation::External as i32)
}

/// Locate the storage holding a tensor's elements
pub(crate) fn tensor_data(tensor: &TensorProto) -> TensorData<'_> {
    if is_external(tensor) {
        return TensorData::External;
    }

    if let Some(raw) = &tensor.raw_data
        && !raw.is_empty()
    {
        return TensorData::Raw(raw.as_ref());
    }

    macro_rules! typed {
        ($field:expr, $variant:ident) => {
            if $field.is_empty() {
                TensorData::Empty
            } else {
                TensorData::$variant($field.as_slice())
            }
        };
    }

    match tensor_data_type(tensor) {
        DataType::Float32 | DataType::Complex64 => typed!(tensor.float_data, Float),
        DataType::Float64 | DataType::Complex128 => typed!(tensor.double_data, Double),
        DataType::Int32
        | DataType::Int16
        | DataType::Int8
        | DataType::Int4
        | DataType::Uint16
        | DataType::Uint8
        | DataType::Uint4
        | DataType::Bool
        | DataType::Float16
        | DataType::BFloat16
        | DataType::Float8E4M3Fn
        | DataType::Float8E4M3Fnuz
        | DataType::Float8E5M2
        | DataType::Float8E5M2Fnuz
        | DataType::Float8E8M0
        | DataType::Float4E2M1 => typed!(tensor.int32_data, Int32),
        DataType::Int64 => typed!(tensor.int64_data, Int64),
        DataType::Uint32 | DataType::Uint64 => typed!(tensor.uint64_data, Uint64),
        DataType::String => typed!(tensor.string_data, Strings),
        DataType::Undefined | DataType::Unknown(_) => TensorData::Empty,
    }
}

/// Build a fresh tensor from narrowed little-endian bytes.
///
/// Only name, dims, data type and raw_data are set; the source tensor's
/// doc string and metadata are not carried over.
pub(crate) fn narrowed_tensor(
    name: Option<String>,
    dims: Vec<i64>,
    data_type: DataType,
    raw: Vec<u8>,
) -> TensorProto {
    TensorProto {
        name,
        dims,
        data_type: Some(data_type.to_onnx_type()),
        raw_data: Some(Bytes::from(raw)),
        ..Default::default()
    }
}

pub(crate) fn is_constant(node: &NodeProto) -> bool {
    node.op_type.as_deref() == Some(CONSTANT_OP)
}

/// Tensor carried by the first attribute of a Constant node.
///
/// Later attribute positions are never looked at.
pub(crate) fn first_attribute_tensor(node: &NodeProto) -> Option<&TensorProto> {
    node.attribute.first()?.t.as_ref()
}

/// Build a replacement Constant node around `tensor`.
///
/// Keeps the source node's name and outputs; inputs are cleared and the
/// tensor becomes the sole `value` attribute.
pub(crate) fn constant_node(source: &NodeProto, tensor: TensorProto) -> NodeProto {
    NodeProto {
        input: Vec::new(),
        output: source.output.clone(),
        name: source.name.clone(),
        op_type: Some(CONSTANT_OP.to_string()),
        attribute: vec![AttributeProto {
            name: Some(CONSTANT_VALUE_ATTR.to_string()),
            r#type: Some(attribute_proto::AttributeType::Tensor as i32),
            t: Some(tensor),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub(crate) fn attribute_name(attr: &AttributeProto) -> &str {
    attr.name.as_deref().unwrap_or("")
}

/// Whether an attribute holds a single dense or sparse tensor value
pub(crate) fn carries_tensor_payload(attr: &AttributeProto) -> bool {
    attr.t.is_some() || attr.sparse_tensor.is_some()
}

/// Every tensor an attribute carries, single or repeated
pub(crate) fn attribute_tensors(attr: &AttributeProto) -> impl Iterator<Item = &TensorProto> {
    attr.t.iter().chain(attr.tensors.iter())
}

pub(crate) fn value_name(value: &ValueInfoProto) -> &str {
    value.name.as_deref().unwrap_or("")
}

/// Tensor type of a value descriptor, if it declares one
pub(crate) fn value_tensor_type(value: &ValueInfoProto) -> Option<&type_proto::Tensor> {
    match value.r#type.as_ref()?.value.as_ref()? {
        type_proto::Value::TensorType(tensor_type) => Some(tensor_type),
        _ => None,
    }
}

/// Static dims of a tensor-typed value; symbolic or missing dims are `None`
pub(crate) fn value_static_dims(tensor_type: &type_proto::Tensor) -> Vec<Option<i64>> {
    use crate::tensor_shape_proto::dimension::Value;

    tensor_type
        .shape
        .as_ref()
        .map(|shape| {
            shape
                .dim
                .iter()
                .map(|d| match &d.value {
                    Some(Value::DimValue(v)) => Some(*v),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Retag a tensor-typed value descriptor; returns false when it is not one
pub(crate) fn set_value_elem_type(value: &mut ValueInfoProto, data_type: DataType) -> bool {
    let tensor_type = value
        .r#type
        .as_mut()
        .and_then(|t| t.value.as_mut())
        .and_then(|v| match v {
            type_proto::Value::TensorType(tensor_type) => Some(tensor_type),
            _ => None,
        });

    match tensor_type {
        Some(tensor_type) => {
            tensor_type.elem_type = Some(data_type.to_onnx_type());
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int64_tensor(name: &str, values: &[i64]) -> TensorProto {
        TensorProto {
            name: Some(name.to_string()),
            dims: vec![values.len() as i64],
            data_type: Some(DataType::Int64.to_onnx_type()),
            int64_data: values.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn raw_data_wins_over_typed_fields() {
        let mut tensor = int64_tensor("w", &[1, 2]);
        tensor.raw_data = Some(Bytes::from(vec![0u8; 16]));
        assert!(matches!(tensor_data(&tensor), TensorData::Raw(b) if b.len() == 16));

        tensor.raw_data = Some(Bytes::new());
        assert!(matches!(tensor_data(&tensor), TensorData::Int64(v) if v == [1, 2]));
    }

    #[test]
    fn external_location_is_reported() {
        let mut tensor = int64_tensor("w", &[]);
        tensor.data_location = Some(tensor_proto::DataLocation::External as i32);
        assert!(matches!(tensor_data(&tensor), TensorData::External));
    }

    #[test]
    fn constant_node_keeps_identity() {
        let source = NodeProto {
            input: vec!["ignored".to_string()],
            output: vec!["c0".to_string()],
            name: Some("const_0".to_string()),
            op_type: Some(CONSTANT_OP.to_string()),
            domain: Some(String::new()),
            doc_string: Some("shape constant".to_string()),
            ..Default::default()
        };
        let node = constant_node(&source, int64_tensor("", &[4]));
        assert!(node.input.is_empty());
        assert_eq!(node.output, source.output);
        assert_eq!(node.name, source.name);
        assert!(node.doc_string.is_none());
        assert_eq!(node.attribute.len(), 1);
        assert_eq!(attribute_name(&node.attribute[0]), CONSTANT_VALUE_ATTR);
        assert_eq!(
            node.attribute[0].r#type,
            Some(attribute_proto::AttributeType::Tensor as i32)
        );
    }
}
