//! The conversion pipeline.
//!
//! Stages run strictly in order and a failure at any stage aborts the whole
//! conversion; nothing is written unless the rebuilt model validates.
//!
//! Narrowing wraps silently by default: an INT64 value outside the target
//! range keeps only its low bits (300 becomes 44 in int8). Callers that need
//! range safety should select [`OverflowPolicy::Strict`](crate::OverflowPolicy).

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::catalog::TensorCatalog;
use crate::convert::{downcast_initializers, rewrite_constant_nodes};
use crate::error::ValidationStage;
use crate::model::{ModelSummary, load_model, save_model};
use crate::precision::{ConvertOptions, Precision};
use crate::proto_adapter::value_name;
use crate::rebuild::{rebuild_graph, rebuild_model};
use crate::validator::validate_model;
use crate::{Error, ModelProto, Result};

/// Pipeline stages, in the only order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    PreValidated,
    Cataloged,
    Downcast,
    Rewritten,
    Rebuilt,
    PostValidated,
    Saved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::PreValidated => "validated (pre)",
            Stage::Cataloged => "cataloged",
            Stage::Downcast => "downcast",
            Stage::Rewritten => "rewritten",
            Stage::Rebuilt => "rebuilt",
            Stage::PostValidated => "validated (post)",
            Stage::Saved => "saved",
        };
        f.write_str(name)
    }
}

/// What a conversion changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub precision: Precision,
    pub initializers_converted: usize,
    pub constants_converted: usize,
    /// Furthest stage reached
    pub stage: Stage,
}

/// A converted model together with its report
#[derive(Debug, Clone)]
pub struct Conversion {
    pub model: ModelProto,
    pub report: ConversionReport,
}

struct Tracker {
    stage: Stage,
}

impl Tracker {
    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage {} after {}", next, self.stage);
        debug!("stage: {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Convert an in-memory model. The source is only borrowed.
pub fn convert_model(source: &ModelProto, options: &ConvertOptions) -> Result<Conversion> {
    let mut tracker = Tracker {
        stage: Stage::Loaded,
    };

    validate_model(source).map_err(|source| Error::StructuralValidation {
        stage: ValidationStage::Pre,
        source,
    })?;
    tracker.advance(Stage::PreValidated);

    let graph = source
        .graph
        .as_ref()
        .ok_or_else(|| Error::MissingField("graph".to_string()))?;

    let catalog = TensorCatalog::from_initializers(&graph.initializer);
    tracker.advance(Stage::Cataloged);

    info!(
        "Converting int64 model params to {}...",
        options.precision
    );
    let initializers = downcast_initializers(&catalog, options)?;
    tracker.advance(Stage::Downcast);

    let input_names: HashSet<&str> = graph.input.iter().map(value_name).collect();
    for name in initializers
        .rewritten
        .iter()
        .filter(|n| input_names.contains(n.as_str()))
    {
        warn!(
            "initializer '{}' is also a graph input; its declared input type stays int64",
            name
        );
    }

    info!(
        "Converting int64 constant nodes to {}...",
        options.precision
    );
    let nodes = rewrite_constant_nodes(&graph.node, options)?;
    tracker.advance(Stage::Rewritten);

    let mut rewritten = initializers.rewritten.clone();
    rewritten.extend(nodes.rewritten.iter().cloned());

    info!("Creating new graph...");
    let new_graph = rebuild_graph(
        graph,
        nodes.values,
        initializers.values,
        &rewritten,
        options,
    );
    let model = rebuild_model(source, new_graph);
    tracker.advance(Stage::Rebuilt);

    validate_model(&model).map_err(|source| Error::StructuralValidation {
        stage: ValidationStage::Post,
        source,
    })?;
    tracker.advance(Stage::PostValidated);

    let report = ConversionReport {
        precision: options.precision,
        initializers_converted: initializers.rewritten.len(),
        constants_converted: nodes.rewritten.len(),
        stage: tracker.stage,
    };
    info!(
        "Converted {} initializers and {} constant outputs to {}",
        report.initializers_converted, report.constants_converted, report.precision
    );

    Ok(Conversion { model, report })
}

/// Load, convert and save a model file.
///
/// The output is only written once the converted model has validated.
pub fn convert_file(
    model_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let model_path = model_path.as_ref();
    let out_path = out_path.as_ref();

    info!("ONNX INT64 --> {} Converter", options.precision.label().to_uppercase());
    info!("Loading Model: {}", model_path.display());
    let source = load_model(model_path)?;
    ModelSummary::of(&source).log("source");

    let Conversion { model, mut report } = convert_model(&source, options)?;
    ModelSummary::of(&model).log("converted");

    info!("Saving converted model as: {}", out_path.display());
    save_model(&model, out_path)?;
    debug!("stage: {} -> {}", report.stage, Stage::Saved);
    report.stage = Stage::Saved;

    Ok(report)
}

/// [`convert_file`] taking the precision as a raw bit count.
///
/// An unsupported width fails before any file is opened.
pub fn convert_file_with_bits(
    model_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    bits: u32,
) -> Result<ConversionReport> {
    let precision = Precision::try_from(bits)?;
    convert_file(model_path, out_path, &ConvertOptions::new(precision))
}
