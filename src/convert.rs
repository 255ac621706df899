//! INT64 downcasting of initializers and Constant nodes.
//!
//! Both passes build fresh protos for rewritten entries and clone everything
//! else, so the source graph is only ever read.

use log::debug;

use crate::catalog::TensorCatalog;
use crate::precision::ConvertOptions;
use crate::proto_adapter::{
    constant_node, first_attribute_tensor, is_constant, narrowed_tensor, tensor_data,
    tensor_data_type,
};
use crate::{DataType, NodeProto, Result, TensorProto};

/// Output of a rewrite pass
#[derive(Debug, Clone, Default)]
pub struct Converted<T> {
    /// Every entry, rewritten or passed through, in source order
    pub values: Vec<T>,
    /// Value names whose element type changed
    pub rewritten: Vec<String>,
}

/// Narrow every INT64 initializer in the catalog
///
/// Other element types pass through unchanged. Output order follows the
/// catalog.
pub fn downcast_initializers(
    catalog: &TensorCatalog<'_>,
    options: &ConvertOptions,
) -> Result<Converted<TensorProto>> {
    let mut out = Converted {
        values: Vec::with_capacity(catalog.len()),
        rewritten: Vec::new(),
    };

    for (name, tensor) in catalog.iter() {
        if tensor_data_type(tensor) != DataType::Int64 {
            out.values.push(tensor.clone());
            continue;
        }

        let narrowed = narrow_tensor(tensor, name, tensor.name.clone(), options)?;
        debug!(
            "initializer '{}' {:?}: int64 -> {}",
            name, tensor.dims, options.precision
        );
        out.values.push(narrowed);
        out.rewritten.push(name.to_string());
    }

    Ok(out)
}

/// Replace Constant nodes whose first attribute holds an INT64 tensor
///
/// Node order and every other node are preserved. The embedded tensor of a
/// replacement node carries no name of its own.
pub fn rewrite_constant_nodes(
    nodes: &[NodeProto],
    options: &ConvertOptions,
) -> Result<Converted<NodeProto>> {
    let mut out = Converted {
        values: Vec::with_capacity(nodes.len()),
        rewritten: Vec::new(),
    };

    for node in nodes {
        let tensor = match first_attribute_tensor(node) {
            Some(t) if is_constant(node) && tensor_data_type(t) == DataType::Int64 => t,
            _ => {
                out.values.push(node.clone());
                continue;
            }
        };

        let label = node
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| node.output.first().map(String::as_str))
            .unwrap_or("<constant>");

        let narrowed = narrow_tensor(tensor, label, None, options)?;
        debug!(
            "constant node '{}' {:?}: int64 -> {}",
            label, tensor.dims, options.precision
        );
        out.rewritten.extend(node.output.iter().cloned());
        out.values.push(constant_node(node, narrowed));
    }

    Ok(out)
}

fn narrow_tensor(
    tensor: &TensorProto,
    label: &str,
    name: Option<String>,
    options: &ConvertOptions,
) -> Result<TensorProto> {
    let values = tensor_data(tensor).decode_i64(label)?;
    let raw = options
        .precision
        .narrow_to_bytes(label, &values, options.overflow)?;
    Ok(narrowed_tensor(
        name,
        tensor.dims.clone(),
        options.precision.data_type(),
        raw,
    ))
}
